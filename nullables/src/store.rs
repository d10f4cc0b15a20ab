//! Nullable store: thread-safe in-memory storage for testing.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use parking_lot::Mutex;
use vox_store::{BlockStore, StoreError, VoteRecord, VoteStore};
use vox_types::{Block, BlockHash, PollId, VoterId};

#[derive(Default)]
struct Faults {
    unreachable: bool,
    fail_writes: bool,
    fail_next_write: bool,
    write_delay: Option<Duration>,
}

#[derive(Default)]
struct Tables {
    blocks: BTreeMap<u64, Block>,
    votes: HashMap<Vec<u8>, VoteRecord>,
}

/// An in-memory block + vote store for testing.
///
/// Enforces the same uniqueness rules as the LMDB backend and can be told
/// to fail on demand.
#[derive(Default)]
pub struct NullStore {
    tables: Mutex<Tables>,
    faults: Mutex<Faults>,
    writes: Mutex<u64>,
}

impl NullStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with blocks already stored, as if loaded from disk.
    pub fn with_blocks(blocks: impl IntoIterator<Item = Block>) -> Self {
        let store = Self::new();
        store.tables.lock().blocks = blocks.into_iter().map(|b| (b.index, b)).collect();
        store
    }

    /// Make every call fail with `Unavailable`.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.faults.lock().unreachable = unreachable;
    }

    /// Make every write fail with `Backend` until cleared.
    pub fn set_fail_writes(&self, fail: bool) {
        self.faults.lock().fail_writes = fail;
    }

    /// Fail only the next write.
    pub fn fail_next_write(&self) {
        self.faults.lock().fail_next_write = true;
    }

    /// Block the calling thread for `delay` before every write lands.
    pub fn set_write_delay(&self, delay: Option<Duration>) {
        self.faults.lock().write_delay = delay;
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> u64 {
        *self.writes.lock()
    }

    /// Overwrite a stored block's hash, simulating on-disk tampering.
    pub fn tamper_block(&self, index: u64, hash: BlockHash) {
        if let Some(block) = self.tables.lock().blocks.get_mut(&index) {
            block.hash = hash;
        }
    }

    /// Drop every block from `index` onwards, with their vote records,
    /// simulating an operator rolling the store back to a good prefix.
    pub fn truncate(&self, index: u64) {
        let mut tables = self.tables.lock();
        tables.blocks.retain(|&stored, _| stored < index);
        tables.votes.retain(|_, record| record.block_index < index);
    }

    fn check_read(&self) -> Result<(), StoreError> {
        if self.faults.lock().unreachable {
            return Err(StoreError::Unavailable("null store is unreachable".into()));
        }
        Ok(())
    }

    fn check_write(&self) -> Result<(), StoreError> {
        let mut faults = self.faults.lock();
        if faults.unreachable {
            return Err(StoreError::Unavailable("null store is unreachable".into()));
        }
        if faults.fail_next_write {
            faults.fail_next_write = false;
            return Err(StoreError::Backend("injected write failure".into()));
        }
        if faults.fail_writes {
            return Err(StoreError::Backend("injected write failure".into()));
        }
        let delay = faults.write_delay;
        drop(faults);
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        Ok(())
    }

    fn insert_block(tables: &mut Tables, block: &Block) -> Result<(), StoreError> {
        if tables.blocks.contains_key(&block.index) {
            return Err(StoreError::Duplicate(format!("block index {}", block.index)));
        }
        tables.blocks.insert(block.index, block.clone());
        Ok(())
    }
}

impl BlockStore for NullStore {
    fn load_blocks(&self) -> Result<Vec<Block>, StoreError> {
        self.check_read()?;
        Ok(self.tables.lock().blocks.values().cloned().collect())
    }

    fn put_block(&self, block: &Block) -> Result<(), StoreError> {
        self.check_write()?;
        Self::insert_block(&mut self.tables.lock(), block)?;
        *self.writes.lock() += 1;
        Ok(())
    }

    fn block_count(&self) -> Result<u64, StoreError> {
        self.check_read()?;
        Ok(self.tables.lock().blocks.len() as u64)
    }
}

impl VoteStore for NullStore {
    fn put_vote_block(&self, block: &Block, record: &VoteRecord) -> Result<(), StoreError> {
        self.check_write()?;
        let mut tables = self.tables.lock();
        let key = VoteRecord::key(&record.poll_id, &record.voter_id);
        if tables.votes.contains_key(&key) {
            return Err(StoreError::Duplicate(format!(
                "vote for voter {} in poll {}",
                record.voter_id, record.poll_id
            )));
        }
        Self::insert_block(&mut tables, block)?;
        tables.votes.insert(key, record.clone());
        drop(tables);
        *self.writes.lock() += 1;
        Ok(())
    }

    fn get_vote(
        &self,
        poll_id: &PollId,
        voter_id: &VoterId,
    ) -> Result<Option<VoteRecord>, StoreError> {
        self.check_read()?;
        Ok(self
            .tables
            .lock()
            .votes
            .get(&VoteRecord::key(poll_id, voter_id))
            .cloned())
    }

    fn vote_count(&self) -> Result<u64, StoreError> {
        self.check_read()?;
        Ok(self.tables.lock().votes.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vox_types::{BlockPayload, Timestamp, VoteCommitment};

    fn block(index: u64) -> Block {
        Block::candidate(
            index,
            Timestamp::EPOCH,
            BlockPayload::UserRegistered {
                user_id: "u".into(),
            },
            BlockHash::ZERO,
        )
    }

    fn record(voter: &str, index: u64) -> VoteRecord {
        VoteRecord {
            poll_id: "p".into(),
            voter_id: voter.into(),
            commitment: VoteCommitment::new([0; 32]),
            block_hash: BlockHash::ZERO,
            block_index: index,
            cast_at: Timestamp::EPOCH,
        }
    }

    #[test]
    fn blocks_come_back_in_index_order() {
        let store = NullStore::new();
        store.put_block(&block(1)).unwrap();
        store.put_block(&block(0)).unwrap();
        let indices: Vec<u64> = store.load_blocks().unwrap().iter().map(|b| b.index).collect();
        assert_eq!(indices, vec![0, 1]);
        assert_eq!(store.write_count(), 2);
    }

    #[test]
    fn duplicate_vote_writes_nothing() {
        let store = NullStore::new();
        store.put_vote_block(&block(1), &record("v", 1)).unwrap();
        let err = store.put_vote_block(&block(2), &record("v", 2)).unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
        assert_eq!(store.block_count().unwrap(), 1);
    }

    #[test]
    fn index_clash_keeps_record_out() {
        let store = NullStore::new();
        store.put_block(&block(1)).unwrap();
        assert!(store.put_vote_block(&block(1), &record("v", 1)).is_err());
        assert_eq!(store.get_vote(&"p".into(), &"v".into()).unwrap(), None);
    }

    #[test]
    fn fail_next_write_is_one_shot() {
        let store = NullStore::new();
        store.fail_next_write();
        assert!(store.put_block(&block(0)).is_err());
        assert!(store.put_block(&block(0)).is_ok());
    }

    #[test]
    fn unreachable_fails_reads_and_writes() {
        let store = NullStore::new();
        store.set_unreachable(true);
        assert!(matches!(store.load_blocks(), Err(StoreError::Unavailable(_))));
        assert!(matches!(store.put_block(&block(0)), Err(StoreError::Unavailable(_))));
        store.set_unreachable(false);
        assert!(store.load_blocks().unwrap().is_empty());
    }

    #[test]
    fn truncate_drops_blocks_and_their_votes() {
        let store = NullStore::new();
        store.put_block(&block(0)).unwrap();
        store.put_vote_block(&block(1), &record("a", 1)).unwrap();
        store.put_vote_block(&block(2), &record("b", 2)).unwrap();
        store.truncate(2);
        assert_eq!(store.block_count().unwrap(), 2);
        assert!(store.get_vote(&"p".into(), &"a".into()).unwrap().is_some());
        assert!(store.get_vote(&"p".into(), &"b".into()).unwrap().is_none());
    }

    #[test]
    fn write_delay_still_lands_the_write() {
        let store = NullStore::new();
        store.set_write_delay(Some(Duration::from_millis(5)));
        let started = std::time::Instant::now();
        store.put_block(&block(0)).unwrap();
        assert!(started.elapsed() >= Duration::from_millis(5));
        assert_eq!(store.block_count().unwrap(), 1);
    }

    #[test]
    fn tamper_changes_stored_hash() {
        let store = NullStore::with_blocks([block(0)]);
        store.tamper_block(0, BlockHash::new([9; 32]));
        assert_eq!(store.load_blocks().unwrap()[0].hash, BlockHash::new([9; 32]));
    }
}
