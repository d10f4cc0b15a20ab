//! Block storage trait.

use crate::StoreError;
use vox_types::Block;

/// Durable, append-only block storage.
pub trait BlockStore {
    /// Load every stored block, ordered by index.
    fn load_blocks(&self) -> Result<Vec<Block>, StoreError>;

    /// Durably store a sealed block. Fails with `Duplicate` if its index is taken.
    fn put_block(&self, block: &Block) -> Result<(), StoreError>;

    /// Total number of blocks in the store.
    fn block_count(&self) -> Result<u64, StoreError>;

    /// Flush buffered writes to disk (called on shutdown).
    fn flush(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
