use vox_store::{BlockStore, StoreError};
use vox_types::Block;

use crate::environment::LmdbEnvironment;
use crate::LmdbError;

/// Blocks are keyed by big-endian index so LMDB's key order is chain order.
pub(crate) fn index_key(index: u64) -> [u8; 8] {
    index.to_be_bytes()
}

pub(crate) fn decode_index(key: &[u8]) -> Result<u64, LmdbError> {
    let bytes: [u8; 8] = key
        .try_into()
        .map_err(|_| LmdbError::Serialization(format!("bad block key length {}", key.len())))?;
    Ok(u64::from_be_bytes(bytes))
}

pub(crate) fn encode_block(block: &Block) -> Result<Vec<u8>, LmdbError> {
    Ok(serde_json::to_vec(block)?)
}

pub(crate) fn decode_block(bytes: &[u8]) -> Result<Block, LmdbError> {
    Ok(serde_json::from_slice(bytes)?)
}

impl BlockStore for LmdbEnvironment {
    fn load_blocks(&self) -> Result<Vec<Block>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let mut blocks = Vec::new();
        for entry in self.blocks_db.iter(&rtxn).map_err(LmdbError::from)? {
            let (key, value) = entry.map_err(LmdbError::from)?;
            let index = decode_index(key)?;
            let block = decode_block(value)?;
            if block.index != index {
                return Err(StoreError::Corruption(format!(
                    "block stored under index {index} claims index {}",
                    block.index
                )));
            }
            blocks.push(block);
        }
        Ok(blocks)
    }

    fn put_block(&self, block: &Block) -> Result<(), StoreError> {
        let mut batch = self.write_batch()?;
        batch.put_block(block)?;
        batch.commit()?;
        Ok(())
    }

    fn block_count(&self) -> Result<u64, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        Ok(self.blocks_db.len(&rtxn).map_err(LmdbError::from)?)
    }

    fn flush(&self) -> Result<(), StoreError> {
        self.sync()?;
        Ok(())
    }
}
