//! Abstract storage traits for VoxLedger.
//!
//! Every storage backend (LMDB, in-memory for testing) implements these
//! traits. The ledger depends only on the traits.

pub mod block;
pub mod error;
pub mod meta;
pub mod vote;

pub use block::BlockStore;
pub use error::StoreError;
pub use meta::MetaStore;
pub use vote::{VoteRecord, VoteStore};

/// Everything the ledger needs from a backend.
pub trait LedgerStore: BlockStore + VoteStore + Send + Sync {}

impl<T: BlockStore + VoteStore + Send + Sync> LedgerStore for T {}
