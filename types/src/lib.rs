//! Fundamental types for the VoxLedger vote ledger.
//!
//! This crate defines the core types shared across every other crate in the workspace:
//! blocks and their payloads, hashes and commitments, identifiers, timestamps,
//! encrypted vote envelopes and the proof-of-work difficulty.

pub mod block;
pub mod envelope;
pub mod error;
pub mod hash;
pub mod ids;
pub mod params;
pub mod time;

pub use block::{Block, BlockPayload, PayloadKind, GENESIS_MESSAGE};
pub use envelope::EncryptedEnvelope;
pub use error::TypesError;
pub use hash::{BlockHash, VoteCommitment};
pub use ids::{OptionId, PollId, UserId, VoterId};
pub use params::Difficulty;
pub use time::{Clock, SystemClock, Timestamp};
