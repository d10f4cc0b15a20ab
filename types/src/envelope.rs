//! Authenticated-encryption envelope carried inside `VoteCast` blocks.
//!
//! Text form is `hex(iv):hex(ciphertext):hex(tag)`. The `:` separator is
//! outside the hex alphabet so the three segments can always be split apart.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::TypesError;

/// IV (GCM nonce) length in bytes.
pub const IV_LEN: usize = 16;
/// Authentication tag length in bytes.
pub const TAG_LEN: usize = 16;

const SEPARATOR: char = ':';

/// The `(iv, ciphertext, tag)` triple produced by one encryption call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncryptedEnvelope {
    pub iv: [u8; IV_LEN],
    pub ciphertext: Vec<u8>,
    pub tag: [u8; TAG_LEN],
}

impl fmt::Display for EncryptedEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{SEPARATOR}{}{SEPARATOR}{}",
            hex::encode(self.iv),
            hex::encode(&self.ciphertext),
            hex::encode(self.tag)
        )
    }
}

impl FromStr for EncryptedEnvelope {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(SEPARATOR).collect();
        if parts.len() != 3 {
            return Err(TypesError::MalformedEnvelope(format!(
                "expected 3 segments, got {}",
                parts.len()
            )));
        }

        let iv = decode_fixed::<IV_LEN>(parts[0], "iv")?;
        let ciphertext = hex::decode(parts[1])
            .map_err(|e| TypesError::MalformedEnvelope(format!("ciphertext: {e}")))?;
        let tag = decode_fixed::<TAG_LEN>(parts[2], "tag")?;

        Ok(Self {
            iv,
            ciphertext,
            tag,
        })
    }
}

fn decode_fixed<const N: usize>(segment: &str, name: &str) -> Result<[u8; N], TypesError> {
    let bytes = hex::decode(segment)
        .map_err(|e| TypesError::MalformedEnvelope(format!("{name}: {e}")))?;
    bytes.try_into().map_err(|v: Vec<u8>| {
        TypesError::MalformedEnvelope(format!("{name}: expected {N} bytes, got {}", v.len()))
    })
}

impl Serialize for EncryptedEnvelope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EncryptedEnvelope {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
