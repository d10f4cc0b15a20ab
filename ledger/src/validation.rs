//! Whole-chain validation with a precise first-failure diagnostic.

use std::fmt;

use serde::Serialize;

use vox_crypto::block_hash;
use vox_types::{Block, Difficulty};
use vox_work::meets_difficulty;

use crate::genesis::is_well_formed_genesis;

/// Which invariant a block broke.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidReason {
    /// `index` is not the block's position in the chain.
    IndexMismatch,
    /// Stored hash differs from the hash recomputed from the block's fields.
    HashMismatch,
    /// `previous_hash` is not the preceding block's hash.
    BrokenLink,
    /// Hash has fewer leading zero digits than the difficulty requires.
    InsufficientWork,
    /// Block 0 is missing or is not a genesis block.
    BadGenesis,
}

impl InvalidReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IndexMismatch => "index mismatch",
            Self::HashMismatch => "hash mismatch",
            Self::BrokenLink => "broken link",
            Self::InsufficientWork => "insufficient work",
            Self::BadGenesis => "bad genesis",
        }
    }
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ValidationResult {
    Valid,
    Invalid { index: u64, reason: InvalidReason },
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }
}

/// Validate a chain, stopping at the first violation.
///
/// Every block must hash to its stored `hash`. Genesis must also be
/// well-formed; later blocks must sit at their position, link to their
/// predecessor and carry enough work. An empty chain has no genesis.
pub fn validate_chain(blocks: &[Block], difficulty: Difficulty) -> ValidationResult {
    let Some(genesis) = blocks.first() else {
        return ValidationResult::Invalid {
            index: 0,
            reason: InvalidReason::BadGenesis,
        };
    };

    if !is_well_formed_genesis(genesis) {
        return ValidationResult::Invalid {
            index: 0,
            reason: InvalidReason::BadGenesis,
        };
    }
    if block_hash(genesis) != genesis.hash {
        return ValidationResult::Invalid {
            index: 0,
            reason: InvalidReason::HashMismatch,
        };
    }

    for (position, pair) in blocks.windows(2).enumerate() {
        let (previous, block) = (&pair[0], &pair[1]);
        let position = position as u64 + 1;
        let reason = if block.index != position {
            Some(InvalidReason::IndexMismatch)
        } else if block_hash(block) != block.hash {
            Some(InvalidReason::HashMismatch)
        } else if block.previous_hash != previous.hash {
            Some(InvalidReason::BrokenLink)
        } else if !meets_difficulty(&block.hash, difficulty) {
            Some(InvalidReason::InsufficientWork)
        } else {
            None
        };
        if let Some(reason) = reason {
            return ValidationResult::Invalid {
                index: position,
                reason,
            };
        }
    }

    ValidationResult::Valid
}
