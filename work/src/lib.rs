//! Proof-of-work sealing.
//!
//! A block is sealed once its SHA-256 hash starts with `difficulty` zero hex
//! digits. Sealing is CPU-bound and spread across cores; it never persists
//! anything and can be cancelled between batches.

pub mod cancel;
pub mod error;
pub mod generator;
pub mod validator;

pub use cancel::CancelFlag;
pub use error::WorkError;
pub use generator::BlockSealer;
pub use validator::{meets_difficulty, validate_work};
pub use vox_types::Difficulty;
