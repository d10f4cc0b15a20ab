use vox_store::{StoreError, VoteRecord, VoteStore};
use vox_types::{Block, PollId, VoterId};

use crate::environment::LmdbEnvironment;
use crate::LmdbError;

impl VoteStore for LmdbEnvironment {
    fn put_vote_block(&self, block: &Block, record: &VoteRecord) -> Result<(), StoreError> {
        let mut batch = self.write_batch()?;
        batch.put_vote(record)?;
        batch.put_block(block)?;
        batch.commit()?;
        Ok(())
    }

    fn get_vote(
        &self,
        poll_id: &PollId,
        voter_id: &VoterId,
    ) -> Result<Option<VoteRecord>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let key = VoteRecord::key(poll_id, voter_id);
        match self.votes_db.get(&rtxn, &key).map_err(LmdbError::from)? {
            Some(bytes) => {
                let record = bincode::deserialize(bytes).map_err(LmdbError::from)?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    fn vote_count(&self) -> Result<u64, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        Ok(self.votes_db.len(&rtxn).map_err(LmdbError::from)?)
    }
}
