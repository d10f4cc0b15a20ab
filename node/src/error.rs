use std::time::Duration;

use thiserror::Error;
use vox_ledger::LedgerError;
use vox_types::{PollId, VoterId};

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("ledger error: {0}")]
    Ledger(LedgerError),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("voter {voter_id} has already voted in poll {poll_id}")]
    DuplicateVote { poll_id: PollId, voter_id: VoterId },

    #[error("append timed out after {0:?}")]
    Timeout(Duration),

    #[error("crypto error: {0}")]
    Crypto(#[from] vox_crypto::CryptoError),

    #[error("store error: {0}")]
    Store(#[from] vox_store::StoreError),

    #[error("LMDB error: {0}")]
    Lmdb(#[from] vox_store_lmdb::LmdbError),

    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("append worker failed: {0}")]
    Worker(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LedgerError> for NodeError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::DuplicateVote { poll_id, voter_id } => {
                NodeError::DuplicateVote { poll_id, voter_id }
            }
            LedgerError::Validation(e) => NodeError::Validation(e.to_string()),
            other => NodeError::Ledger(other),
        }
    }
}
