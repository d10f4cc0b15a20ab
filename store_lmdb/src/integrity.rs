//! Offline store integrity checks.
//!
//! Walks every stored record and reports what could not be decoded or does
//! not line up. Chain validity (hashes, links, work) is the ledger's job;
//! this only looks at storage-level shape.

use std::path::Path;

use vox_store::VoteRecord;
use vox_types::{Block, BlockPayload};

use crate::block::{decode_block, decode_index};
use crate::environment::LmdbEnvironment;
use crate::LmdbError;

/// Summary of an integrity check run.
#[derive(Debug, Default)]
pub struct IntegrityReport {
    pub blocks_checked: u64,
    pub votes_checked: u64,
    pub errors: Vec<String>,
}

impl IntegrityReport {
    pub fn is_healthy(&self) -> bool {
        self.errors.is_empty()
    }
}

impl LmdbEnvironment {
    /// Check that block keys are contiguous from 0, every record decodes,
    /// and every vote record points at a matching `VoteCast` block.
    ///
    /// Read failures land in the report; only failing to start the read
    /// transaction is a hard error.
    pub fn check_integrity(&self) -> Result<IntegrityReport, LmdbError> {
        let mut report = IntegrityReport::default();
        let rtxn = self.env.read_txn()?;

        let mut blocks: Vec<Option<Block>> = Vec::new();
        for entry in self.blocks_db.iter(&rtxn)? {
            report.blocks_checked += 1;
            let (key, value) = match entry {
                Ok(kv) => kv,
                Err(e) => {
                    report.errors.push(format!("failed to read block entry: {e}"));
                    continue;
                }
            };
            let index = match decode_index(key) {
                Ok(index) => index,
                Err(e) => {
                    report.errors.push(e.to_string());
                    continue;
                }
            };
            if index != blocks.len() as u64 {
                report
                    .errors
                    .push(format!("block index gap: expected {}, found {index}", blocks.len()));
            }
            match decode_block(value) {
                Ok(block) if block.index == index => blocks.push(Some(block)),
                Ok(block) => {
                    report.errors.push(format!(
                        "block stored under index {index} claims index {}",
                        block.index
                    ));
                    blocks.push(None);
                }
                Err(e) => {
                    report.errors.push(format!("block {index} does not decode: {e}"));
                    blocks.push(None);
                }
            }
        }

        for entry in self.votes_db.iter(&rtxn)? {
            report.votes_checked += 1;
            let record: VoteRecord = match entry
                .map_err(LmdbError::from)
                .and_then(|(_, v)| bincode::deserialize(v).map_err(LmdbError::from))
            {
                Ok(record) => record,
                Err(e) => {
                    report.errors.push(format!("vote record does not decode: {e}"));
                    continue;
                }
            };
            let matches = blocks
                .get(record.block_index as usize)
                .and_then(Option::as_ref)
                .is_some_and(|block| match &block.payload {
                    BlockPayload::VoteCast {
                        poll_id, voter_id, ..
                    } => {
                        block.hash == record.block_hash
                            && *poll_id == record.poll_id
                            && *voter_id == record.voter_id
                    }
                    _ => false,
                });
            if !matches {
                report.errors.push(format!(
                    "vote record for voter {} in poll {} has no matching block at index {}",
                    record.voter_id, record.poll_id, record.block_index
                ));
            }
        }

        if report.is_healthy() {
            tracing::debug!(
                blocks = report.blocks_checked,
                votes = report.votes_checked,
                "store integrity check passed"
            );
        } else {
            tracing::warn!(errors = report.errors.len(), "store integrity check failed");
        }
        Ok(report)
    }
}

/// Check that an LMDB data directory looks usable before opening it.
///
/// A missing or empty directory is a fresh start. A non-empty directory
/// without `data.mdb` suggests the wrong path or a damaged store.
pub fn check_data_dir(path: &Path) -> Result<(), String> {
    if !path.exists() {
        return Ok(());
    }
    let empty = std::fs::read_dir(path)
        .map_err(|e| format!("cannot read {}: {e}", path.display()))?
        .next()
        .is_none();
    if !empty && !path.join("data.mdb").exists() {
        return Err(format!(
            "directory exists but data.mdb is missing at {}",
            path.display()
        ));
    }
    Ok(())
}
