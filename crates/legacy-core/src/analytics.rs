//! Parameter validation and partial-knowledge reporting.
//!
//! Grounded on `original_source/secrets/secrets.go`'s `knownParts`: before
//! committing to a seed size and threshold, report how much of the seed a
//! coalition smaller than the quorum can reconstruct, and refuse parameters
//! that would give any successor fewer than five usable seed bytes.

use crate::error::{LegacyError, Result};

pub const MIN_BYTES_PER_LEAF: usize = 5;

/// `n · (n-1) · … · k`, the number of leaves in the fully-expanded master
/// tree's deepest rank once every branch has bottomed out.
pub fn leaf_count(n: usize, k: usize) -> usize {
    (k..=n).product::<usize>().max(1)
}

/// Knowledge a coalition of `j` successors (`j < k`) can piece together,
/// expressed as `(percent_known, missing_bytes)`. Implements the recurrence
/// from `knownParts`: starting from zero, fold in each quorum size from `n`
/// down to `k`, weighting by `j / x`.
pub fn partial_knowledge(n: usize, k: usize, seed_size: usize, j: usize) -> (u32, usize) {
    let mut known = 0.0f64;
    let mut x = n;
    while x >= k {
        known += (1.0 - known) * (j as f64) / (x as f64);
        if x == 0 {
            break;
        }
        x -= 1;
    }
    let percent = (100.0 * known).round() as u32;
    let missing = ((1.0 - known) * seed_size as f64).floor() as usize;
    (percent, missing)
}

/// One line of the `knownParts` report: how much of the seed a coalition of
/// a given size can reconstruct.
#[derive(Debug, Clone)]
pub struct KnowledgeReport {
    pub coalition_size: usize,
    pub percent_known: u32,
    pub missing_bytes: usize,
}

/// Full analytics report: the per-leaf byte budget (a hard gate) plus the
/// knowledge curve for coalitions of size `1..=k`.
#[derive(Debug, Clone)]
pub struct AnalyticsReport {
    pub leaf_count: usize,
    pub bytes_per_leaf: usize,
    pub knowledge: Vec<KnowledgeReport>,
}

/// Runs the full `knownParts` analysis, failing if the resulting per-leaf
/// byte budget falls below [`MIN_BYTES_PER_LEAF`].
pub fn analyze(n: usize, k: usize, seed_size: usize) -> Result<AnalyticsReport> {
    if k == 0 || k > n {
        return Err(LegacyError::ParameterInvalid(format!(
            "required_to_decrypt must be between 1 and the successor count ({n}), got {k}"
        )));
    }
    let leaves = leaf_count(n, k);
    let bytes_per_leaf = seed_size / leaves;
    if bytes_per_leaf < MIN_BYTES_PER_LEAF {
        return Err(LegacyError::ParameterInvalid(format!(
            "minimum required bytes per leaf is {MIN_BYTES_PER_LEAF}, got {bytes_per_leaf}; use a longer seed"
        )));
    }
    let knowledge = (1..=k)
        .map(|j| {
            let (percent_known, missing_bytes) = partial_knowledge(n, k, seed_size, j);
            KnowledgeReport {
                coalition_size: j,
                percent_known,
                missing_bytes,
            }
        })
        .collect();
    Ok(AnalyticsReport {
        leaf_count: leaves,
        bytes_per_leaf,
        knowledge,
    })
}
