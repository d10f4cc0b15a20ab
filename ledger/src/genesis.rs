//! The genesis block: index 0, fixed message, previous hash `"0"`.

use vox_types::{Block, BlockHash, BlockPayload, Timestamp};

/// Unsealed genesis block stamped with `timestamp`.
pub fn genesis_candidate(timestamp: Timestamp) -> Block {
    Block::candidate(0, timestamp, BlockPayload::genesis(), BlockHash::ZERO)
}

/// Structural genesis checks (hash and work are checked separately).
pub(crate) fn is_well_formed_genesis(block: &Block) -> bool {
    block.index == 0
        && block.previous_hash.is_zero()
        && matches!(block.payload, BlockPayload::Genesis { .. })
}
