use thiserror::Error;

use crate::validation::InvalidReason;
use vox_types::{PollId, VoterId};

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("validation failed: {0}")]
    Validation(#[from] vox_types::TypesError),

    #[error("storage error: {0}")]
    Persistence(#[from] vox_store::StoreError),

    #[error("chain corrupt at block {index}: {reason}")]
    ChainCorruption { index: u64, reason: InvalidReason },

    #[error("ledger is not initialized")]
    NotInitialized,

    #[error("voter {voter_id} has already voted in poll {poll_id}")]
    DuplicateVote { poll_id: PollId, voter_id: VoterId },

    #[error("append cancelled")]
    Cancelled,

    #[error("sealing failed: {0}")]
    Work(vox_work::WorkError),
}

impl From<vox_work::WorkError> for LedgerError {
    fn from(e: vox_work::WorkError) -> Self {
        match e {
            vox_work::WorkError::Cancelled => LedgerError::Cancelled,
            other => LedgerError::Work(other),
        }
    }
}
