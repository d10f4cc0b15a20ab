//! Write batching: groups several store operations into a single LMDB write
//! transaction.
//!
//! ```ignore
//! let mut batch = env.write_batch()?;
//! batch.put_block(&block)?;
//! batch.put_vote(&record)?;
//! batch.commit()?;
//! ```
//!
//! If the batch is dropped without calling [`WriteBatch::commit`], all
//! operations are rolled back (the underlying LMDB transaction is aborted).

use heed::RwTxn;

use vox_store::VoteRecord;
use vox_types::Block;

use crate::block::{decode_index, encode_block, index_key};
use crate::environment::LmdbEnvironment;
use crate::LmdbError;

pub struct WriteBatch<'a> {
    txn: RwTxn<'a>,
    env: &'a LmdbEnvironment,
}

impl<'a> WriteBatch<'a> {
    pub(crate) fn new(env: &'a LmdbEnvironment) -> Result<Self, LmdbError> {
        let txn = env.env().write_txn()?;
        Ok(Self { txn, env })
    }

    /// Stage a block. Fails with `Duplicate` if its index is already stored.
    pub fn put_block(&mut self, block: &Block) -> Result<(), LmdbError> {
        let key = index_key(block.index);
        if self.env.blocks_db.get(&self.txn, &key)?.is_some() {
            return Err(LmdbError::Duplicate(format!("block index {}", block.index)));
        }
        let bytes = encode_block(block)?;
        self.env.blocks_db.put(&mut self.txn, &key, &bytes)?;
        Ok(())
    }

    /// Stage a vote record. Fails with `Duplicate` if the voter already has one
    /// for this poll.
    pub fn put_vote(&mut self, record: &VoteRecord) -> Result<(), LmdbError> {
        let key = VoteRecord::key(&record.poll_id, &record.voter_id);
        if self.env.votes_db.get(&self.txn, &key)?.is_some() {
            return Err(LmdbError::Duplicate(format!(
                "vote for voter {} in poll {}",
                record.voter_id, record.poll_id
            )));
        }
        let bytes = bincode::serialize(record)?;
        self.env.votes_db.put(&mut self.txn, &key, &bytes)?;
        Ok(())
    }

    /// Stage a raw metadata value.
    pub fn put_meta(&mut self, name: &str, value: &[u8]) -> Result<(), LmdbError> {
        self.env.meta_db.put(&mut self.txn, name.as_bytes(), value)?;
        Ok(())
    }

    /// Highest block index staged or stored so far.
    pub fn last_index(&self) -> Result<Option<u64>, LmdbError> {
        match self.env.blocks_db.last(&self.txn)? {
            Some((key, _)) => Ok(Some(decode_index(key)?)),
            None => Ok(None),
        }
    }

    /// Commit all staged writes atomically.
    pub fn commit(self) -> Result<(), LmdbError> {
        self.txn.commit()?;
        Ok(())
    }
}
