//! Error type for parsing and validating the shared types.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypesError {
    #[error("invalid hash: {0}")]
    InvalidHash(String),

    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    #[error("difficulty {0} exceeds the 64 hex digits of a SHA-256 hash")]
    DifficultyOutOfRange(u32),

    #[error("unknown payload kind: {0}")]
    UnknownPayloadKind(String),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}
