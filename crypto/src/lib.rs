//! Cryptographic primitives for VoxLedger.
//!
//! - **SHA-256** for block hashes and vote commitments
//! - **AES-256-GCM** (128-bit IV, 128-bit tag) for vote envelopes
//! - OS randomness for keys and IVs

pub mod cipher;
pub mod error;
pub mod hash;
pub mod key;

pub use cipher::{decrypt, decrypt_str, encrypt};
pub use error::CryptoError;
pub use hash::{block_hash, hash_block_fields, sha256, sha256_hex, vote_commitment, SealingHasher};
pub use key::VoteKey;
