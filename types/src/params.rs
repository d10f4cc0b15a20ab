//! Proof-of-work difficulty.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::TypesError;

/// Required number of leading zero hex digits in a sealed block hash.
///
/// Each extra digit multiplies the expected sealing work by 16. The default
/// of 4 needs about 65k hash attempts per block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Difficulty(u32);

impl Difficulty {
    pub const DEFAULT: Self = Self(4);
    pub const MAX: u32 = 64;

    pub fn new(digits: u32) -> Result<Self, TypesError> {
        if digits > Self::MAX {
            return Err(TypesError::DifficultyOutOfRange(digits));
        }
        Ok(Self(digits))
    }

    pub fn digits(&self) -> u32 {
        self.0
    }

    /// The hex prefix every sealed hash must start with, e.g. `"0000"`.
    pub fn target(&self) -> String {
        "0".repeat(self.0 as usize)
    }
}

impl Default for Difficulty {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<u32> for Difficulty {
    type Error = TypesError;

    fn try_from(digits: u32) -> Result<Self, Self::Error> {
        Self::new(digits)
    }
}

impl From<Difficulty> for u32 {
    fn from(d: Difficulty) -> Self {
        d.0
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
