//! Symmetric vote-encryption key.

use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::CryptoError;

/// Key length in bytes (AES-256).
pub const KEY_LEN: usize = 32;

/// A 256-bit AES key. Wiped from memory on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct VoteKey([u8; KEY_LEN]);

impl VoteKey {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Draw a fresh key from the OS CSPRNG.
    pub fn generate() -> Result<Self, CryptoError> {
        let mut bytes = [0u8; KEY_LEN];
        getrandom::getrandom(&mut bytes)?;
        Ok(Self(bytes))
    }

    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let mut decoded =
            hex::decode(s.trim()).map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        if decoded.len() != KEY_LEN {
            let len = decoded.len();
            decoded.zeroize();
            return Err(CryptoError::InvalidKey(format!(
                "expected {KEY_LEN} bytes, got {len}"
            )));
        }
        let mut bytes = [0u8; KEY_LEN];
        bytes.copy_from_slice(&decoded);
        decoded.zeroize();
        Ok(Self(bytes))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for VoteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("VoteKey(<redacted>)")
    }
}
