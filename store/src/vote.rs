//! Vote record storage trait: the durable double-cast guard.

use serde::{Deserialize, Serialize};

use crate::StoreError;
use vox_types::{Block, BlockHash, BlockPayload, PollId, Timestamp, VoteCommitment, VoterId};

/// Marks `(poll_id, voter_id)` as cast and points at the block holding the vote.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRecord {
    pub poll_id: PollId,
    pub voter_id: VoterId,
    pub commitment: VoteCommitment,
    pub block_hash: BlockHash,
    pub block_index: u64,
    pub cast_at: Timestamp,
}

impl VoteRecord {
    /// The record a sealed `VoteCast` block implies; `None` for other kinds.
    pub fn for_block(block: &Block) -> Option<Self> {
        match &block.payload {
            BlockPayload::VoteCast {
                poll_id,
                voter_id,
                commitment,
                ..
            } => Some(Self {
                poll_id: poll_id.clone(),
                voter_id: voter_id.clone(),
                commitment: *commitment,
                block_hash: block.hash,
                block_index: block.index,
                cast_at: block.timestamp,
            }),
            _ => None,
        }
    }

    /// Storage key: each id as a big-endian `u32` byte length followed by
    /// its bytes. Ids are opaque, so no delimiter byte is safe to reserve.
    pub fn key(poll_id: &PollId, voter_id: &VoterId) -> Vec<u8> {
        let (poll, voter) = (poll_id.as_str().as_bytes(), voter_id.as_str().as_bytes());
        let mut key = Vec::with_capacity(poll.len() + voter.len() + 8);
        for segment in [poll, voter] {
            key.extend_from_slice(&(segment.len() as u32).to_be_bytes());
            key.extend_from_slice(segment);
        }
        key
    }
}

pub trait VoteStore {
    /// Store a `VoteCast` block and its record in one atomic write.
    ///
    /// Fails with `Duplicate` (writing nothing) if a record for the same
    /// `(poll_id, voter_id)` already exists or the block index is taken.
    fn put_vote_block(&self, block: &Block, record: &VoteRecord) -> Result<(), StoreError>;

    /// Look up the record for a voter in a poll.
    fn get_vote(&self, poll_id: &PollId, voter_id: &VoterId)
        -> Result<Option<VoteRecord>, StoreError>;

    /// Number of vote records stored.
    fn vote_count(&self) -> Result<u64, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_separates_poll_and_voter() {
        let a = VoteRecord::key(&"ab".into(), &"c".into());
        let b = VoteRecord::key(&"a".into(), &"bc".into());
        assert_ne!(a, b);
    }

    #[test]
    fn key_survives_control_bytes_in_ids() {
        let a = VoteRecord::key(&"a\0b".into(), &"c".into());
        let b = VoteRecord::key(&"a".into(), &"b\0c".into());
        assert_ne!(a, b);
        assert_eq!(&a[..4], &3u32.to_be_bytes());
    }

    #[test]
    fn record_only_for_vote_blocks() {
        let block = Block::candidate(
            0,
            Timestamp::EPOCH,
            BlockPayload::genesis(),
            BlockHash::ZERO,
        );
        assert!(VoteRecord::for_block(&block).is_none());
    }
}
