//! VoxLedger service.
//!
//! Owns the ledger and its store and serializes every append through the
//! [`AppendCoordinator`]:
//! - Encrypts ballots and commits them as `VoteCast` blocks
//! - Guarantees at most one vote per voter per poll, even under concurrency
//! - Records poll and user lifecycle events
//! - Bounds every append with a timeout that cancels the seal
//! - Reports metrics and ledger events to observers

pub mod config;
pub mod coordinator;
pub mod error;
pub mod ledger_event;
pub mod logging;
pub mod metrics;
pub mod service;

pub use config::NodeConfig;
pub use coordinator::{AppendCoordinator, VoteReceipt, VoteSubmission, VoteVerification};
pub use error::NodeError;
pub use ledger_event::{EventBus, LedgerEvent};
pub use logging::{init_logging, LogFormat};
pub use metrics::LedgerMetrics;
pub use service::VoteLedgerService;
