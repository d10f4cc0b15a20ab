use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    /// Envelope malformed or authentication failed; the vote is unverifiable.
    #[error("integrity check failed: {0}")]
    Integrity(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("OS randomness unavailable: {0}")]
    Randomness(String),

    #[error("encryption failed")]
    Encryption,
}

impl From<getrandom::Error> for CryptoError {
    fn from(e: getrandom::Error) -> Self {
        CryptoError::Randomness(e.to_string())
    }
}
