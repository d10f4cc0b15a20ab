//! Append-only, hash-chained vote ledger.
//!
//! Blocks are sealed by proof-of-work, persisted before they become visible,
//! and published to readers as immutable snapshots. A single writer lock
//! orders appends; sealing happens outside it.

pub mod error;
pub mod genesis;
pub mod ledger;
pub mod snapshot;
pub mod validation;

pub use error::LedgerError;
pub use genesis::genesis_candidate;
pub use ledger::{Ledger, LedgerHealth, LedgerStats};
pub use snapshot::ChainSnapshot;
pub use validation::{validate_chain, InvalidReason, ValidationResult};
