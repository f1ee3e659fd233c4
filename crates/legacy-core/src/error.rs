use thiserror::Error;

/// Failure taxonomy for the generation and integration phases.
///
/// Only per-card failures (`UnrecognizedCard`, `DuplicateCard`) are meant to be
/// recovered by the caller; every other variant aborts the current phase.
#[derive(Debug, Error)]
pub enum LegacyError {
    #[error("parameter invalid: {0}")]
    ParameterInvalid(String),

    #[error("cryptographic operation failed: {0}")]
    Crypto(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("insufficient quorum: {present} of {required} successors present, {missing_bytes} seed bytes still missing")]
    Quorum {
        present: usize,
        required: usize,
        missing_bytes: usize,
    },

    #[error("card does not match any known successor")]
    UnrecognizedCard,

    #[error("share for this successor was already applied")]
    DuplicateCard,
}

pub type Result<T> = std::result::Result<T, LegacyError>;
