use std::collections::BTreeMap;
use std::fmt;

use base64::{engine::general_purpose, Engine as _};
use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A share-tree node: a leaf carrying bytes, an internal node carrying a
/// dense-by-index mapping of children, or the empty node produced where
/// neither shape is known yet.
///
/// `Empty` has no counterpart in a finished master or successor tree — those
/// are always one of `Leaf`/`Internal` — but it is the natural starting state
/// of the integration accumulator before any share has touched a position,
/// and it is also what [`crate::tree::project`] returns for a branch that
/// carries nothing for a given successor. On the wire `Empty` and an
/// `Internal` node with no children are indistinguishable (both encode to
/// `{}`), which mirrors the original protocol's `omitempty` JSON tags.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Node {
    #[default]
    Empty,
    Leaf(Vec<u8>),
    Internal(BTreeMap<usize, Node>),
}

impl Node {
    pub fn is_empty(&self) -> bool {
        matches!(self, Node::Empty) || matches!(self, Node::Internal(m) if m.is_empty())
    }

    pub fn data(&self) -> Option<&[u8]> {
        match self {
            Node::Leaf(d) => Some(d),
            _ => None,
        }
    }

    pub fn children(&self) -> Option<&BTreeMap<usize, Node>> {
        match self {
            Node::Internal(m) => Some(m),
            _ => None,
        }
    }
}

impl Serialize for Node {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Node::Leaf(data) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("d", &general_purpose::STANDARD.encode(data))?;
                map.end()
            }
            Node::Internal(children) if !children.is_empty() => {
                let mut map = serializer.serialize_map(Some(1))?;
                let s: BTreeMap<String, &Node> =
                    children.iter().map(|(k, v)| (k.to_string(), v)).collect();
                map.serialize_entry("s", &s)?;
                map.end()
            }
            _ => {
                let map = serializer.serialize_map(Some(0))?;
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for Node {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct NodeVisitor;

        impl<'de> Visitor<'de> for NodeVisitor {
            type Value = Node;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(r#"an object with at most one of "d" or "s""#)
            }

            fn visit_map<A>(self, mut map: A) -> Result<Node, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut data: Option<String> = None;
                let mut sub: Option<BTreeMap<String, Node>> = None;
                while let Some(key) = map.next_key::<String>()? {
                    match key.as_str() {
                        "d" => data = Some(map.next_value()?),
                        "s" => sub = Some(map.next_value()?),
                        _ => {
                            let _ = map.next_value::<serde::de::IgnoredAny>()?;
                        }
                    }
                }
                match (data, sub) {
                    (Some(_), Some(_)) => Err(de::Error::custom(
                        "node has both \"d\" and \"s\" set; they are mutually exclusive",
                    )),
                    (Some(b64), None) => {
                        let bytes = general_purpose::STANDARD
                            .decode(b64.as_bytes())
                            .map_err(de::Error::custom)?;
                        Ok(Node::Leaf(bytes))
                    }
                    (None, Some(raw)) => {
                        if raw.is_empty() {
                            Ok(Node::Empty)
                        } else {
                            let mut children = BTreeMap::new();
                            for (k, v) in raw {
                                let idx: usize = k.parse().map_err(de::Error::custom)?;
                                children.insert(idx, v);
                            }
                            Ok(Node::Internal(children))
                        }
                    }
                    (None, None) => Ok(Node::Empty),
                }
            }
        }

        deserializer.deserialize_map(NodeVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaf_round_trips_through_canonical_json() {
        let node = Node::Leaf(vec![1, 2, 3, 4, 5]);
        let json = serde_json::to_string(&node).unwrap();
        assert_eq!(json, r#"{"d":"AQIDBAU="}"#);
        let back: Node = serde_json::from_str(&json).unwrap();
        assert_eq!(back, node);
    }

    #[test]
    fn internal_round_trips_through_canonical_json() {
        let mut children = BTreeMap::new();
        children.insert(0, Node::Leaf(vec![9]));
        children.insert(2, Node::Leaf(vec![8, 7]));
        let node = Node::Internal(children);
        let json = serde_json::to_string(&node).unwrap();
        let back: Node = serde_json::from_str(&json).unwrap();
        assert_eq!(back, node);
    }

    #[test]
    fn empty_node_serializes_to_empty_object() {
        assert_eq!(serde_json::to_string(&Node::Empty).unwrap(), "{}");
        let back: Node = serde_json::from_str("{}").unwrap();
        assert_eq!(back, Node::Empty);
    }

    #[test]
    fn both_fields_present_is_rejected() {
        let raw = r#"{"d":"AQ==","s":{"0":{"d":"Ag=="}}}"#;
        let result: Result<Node, _> = serde_json::from_str(raw);
        assert!(result.is_err());
    }
}
