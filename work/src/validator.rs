//! PoW validation.

use vox_types::{Block, BlockHash, Difficulty};

/// Whether `hash` has at least `difficulty` leading zero hex digits.
pub fn meets_difficulty(hash: &BlockHash, difficulty: Difficulty) -> bool {
    hash.leading_zero_digits() >= difficulty.digits()
}

/// Recompute the block hash and check it is both correct and sufficient.
pub fn validate_work(block: &Block, difficulty: Difficulty) -> bool {
    let recomputed = vox_crypto::block_hash(block);
    recomputed == block.hash && meets_difficulty(&recomputed, difficulty)
}
