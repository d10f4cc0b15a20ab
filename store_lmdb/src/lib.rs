//! LMDB storage backend for VoxLedger.
//!
//! Implements the storage traits from `vox-store` using the `heed` LMDB bindings.
//! Each logical store maps to one LMDB database within a single environment:
//!
//! | database | key | value |
//! |---|---|---|
//! | `blocks` | block index (u64 big-endian) | block as canonical JSON |
//! | `votes`  | `poll_id \0 voter_id` | bincode `VoteRecord` |
//! | `meta`   | name | raw bytes |

pub mod block;
pub mod environment;
pub mod error;
pub mod integrity;
pub mod meta;
pub mod migration;
pub mod vote;
pub mod write_batch;

pub use environment::LmdbEnvironment;
pub use error::LmdbError;
pub use integrity::{check_data_dir, IntegrityReport};
pub use write_batch::WriteBatch;
