//! The ledger: snapshot reads, single-writer appends.
//!
//! Appends seal against the tip they observed, then take the writer lock,
//! confirm the tip is unchanged, persist, and only then publish the block
//! to readers. If another append won the race the block is resealed against
//! the new tip. Readers never take the writer lock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use vox_store::{BlockStore, LedgerStore, StoreError, VoteRecord, VoteStore};
use vox_types::{
    Block, BlockHash, BlockPayload, Clock, Difficulty, PayloadKind, PollId, SystemClock,
    TypesError, VoterId,
};
use vox_work::{BlockSealer, CancelFlag};

use crate::genesis::genesis_candidate;
use crate::snapshot::ChainSnapshot;
use crate::validation::{validate_chain, InvalidReason, ValidationResult};
use crate::LedgerError;

/// Whether the ledger accepts appends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LedgerHealth {
    /// `initialize` has not completed.
    Uninitialized,
    Healthy,
    /// Validation found a broken chain. Appends are refused until an
    /// operator repairs the store and calls [`Ledger::reset_health`].
    Degraded { index: u64, reason: InvalidReason },
}

#[derive(Clone, Debug, Serialize)]
pub struct LedgerStats {
    pub block_count: u64,
    pub is_valid: bool,
    pub difficulty: Difficulty,
    pub genesis_block: Block,
    pub latest_block: Block,
}

pub struct Ledger {
    store: Arc<dyn LedgerStore>,
    difficulty: Difficulty,
    sealer: BlockSealer,
    clock: Arc<dyn Clock>,
    chain: RwLock<Arc<ChainSnapshot>>,
    health: RwLock<LedgerHealth>,
    /// Bumped whenever the chain is reloaded from the store. Validation of a
    /// snapshot taken in an older epoch must not overwrite the health the
    /// reload recorded.
    epoch: AtomicU64,
    writer: Mutex<()>,
}

impl Ledger {
    pub fn new(store: Arc<dyn LedgerStore>, difficulty: Difficulty) -> Self {
        Self {
            store,
            difficulty,
            sealer: BlockSealer::new(),
            clock: Arc::new(SystemClock),
            chain: RwLock::new(Arc::new(ChainSnapshot::default())),
            health: RwLock::new(LedgerHealth::Uninitialized),
            epoch: AtomicU64::new(0),
            writer: Mutex::new(()),
        }
    }

    pub fn with_sealer(mut self, sealer: BlockSealer) -> Self {
        self.sealer = sealer;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    pub fn health(&self) -> LedgerHealth {
        *self.health.read()
    }

    /// Load the persisted chain, or seal and persist genesis if the store is
    /// empty. The loaded chain is validated; a broken one leaves the ledger
    /// readable but degraded.
    ///
    /// A store error leaves the ledger uninitialized. Calling this again
    /// after success is a no-op.
    pub fn initialize(&self) -> Result<(), LedgerError> {
        let _writer = self.writer.lock();
        if self.health() != LedgerHealth::Uninitialized {
            return Ok(());
        }

        let mut blocks = match self.store.load_blocks() {
            Ok(blocks) => blocks,
            Err(e) => {
                tracing::error!(error = %e, "failed to load chain from store");
                return Err(e.into());
            }
        };

        if blocks.is_empty() {
            let candidate = genesis_candidate(self.clock.now());
            let genesis = self
                .sealer
                .seal(candidate, self.difficulty, &CancelFlag::new())?;
            if let Err(e) = self.store.put_block(&genesis) {
                tracing::error!(error = %e, "failed to persist genesis block");
                return Err(e.into());
            }
            tracing::info!(hash = %genesis.hash, nonce = genesis.nonce, "created genesis block");
            blocks.push(genesis);
        } else {
            tracing::info!(blocks = blocks.len(), "loaded chain from store");
        }

        let result = validate_chain(&blocks, self.difficulty);
        let epoch = self.reload(blocks);
        self.record_validation(result, epoch, true);
        Ok(())
    }

    /// Seal, persist and publish a block carrying `payload`.
    ///
    /// `VoteCast` payloads are written together with their [`VoteRecord`],
    /// so a second vote by the same voter in the same poll fails with
    /// [`LedgerError::DuplicateVote`] and writes nothing.
    pub fn append(&self, payload: BlockPayload, cancel: &CancelFlag) -> Result<Block, LedgerError> {
        payload.validate()?;
        if payload.kind() == PayloadKind::Genesis {
            return Err(TypesError::InvalidPayload(
                "genesis payload is only valid at index 0".into(),
            )
            .into());
        }
        self.ensure_writable()?;

        let mut attempt = 0u32;
        loop {
            let tip = self.latest()?;
            let timestamp = self.clock.now().max(tip.timestamp);
            let candidate = Block::candidate(tip.index + 1, timestamp, payload.clone(), tip.hash);
            let sealed = self.sealer.seal(candidate, self.difficulty, cancel)?;

            let _writer = self.writer.lock();
            self.ensure_writable()?;
            let current_tip = self.chain.read().tip().map(|block| block.hash);
            if current_tip != Some(sealed.previous_hash) {
                attempt += 1;
                tracing::warn!(
                    attempt,
                    index = sealed.index,
                    "chain tip moved while sealing, resealing"
                );
                continue;
            }
            if cancel.is_cancelled() {
                return Err(LedgerError::Cancelled);
            }

            self.persist(&sealed)?;
            self.publish(sealed.clone());
            tracing::info!(
                index = sealed.index,
                hash = %sealed.hash,
                kind = %sealed.kind(),
                nonce = sealed.nonce,
                "appended block"
            );
            return Ok(sealed);
        }
    }

    /// [`append`](Self::append) restricted to `VoteCast` payloads, returning
    /// the vote record written alongside the block.
    pub fn append_vote(
        &self,
        payload: BlockPayload,
        cancel: &CancelFlag,
    ) -> Result<(Block, VoteRecord), LedgerError> {
        if payload.kind() != PayloadKind::VoteCast {
            return Err(TypesError::InvalidPayload(format!(
                "expected a vote_cast payload, got {}",
                payload.kind()
            ))
            .into());
        }
        let block = self.append(payload, cancel)?;
        let record = VoteRecord::for_block(&block).ok_or_else(|| {
            TypesError::InvalidPayload("sealed block is not a vote".into())
        })?;
        Ok((block, record))
    }

    /// Validate the published chain. A failure degrades the ledger; success
    /// does not clear an earlier failure (see [`reset_health`](Self::reset_health)).
    pub fn validate(&self) -> Result<ValidationResult, LedgerError> {
        let epoch = self.epoch.load(Ordering::SeqCst);
        let snapshot = self.snapshot()?;
        let result = validate_chain(snapshot.blocks(), self.difficulty);
        self.record_validation(result, epoch, false);
        Ok(result)
    }

    /// Reload the chain from the store, validate it, and clear the degraded
    /// state if it is now valid.
    pub fn reset_health(&self) -> Result<ValidationResult, LedgerError> {
        let _writer = self.writer.lock();
        if self.health() == LedgerHealth::Uninitialized {
            return Err(LedgerError::NotInitialized);
        }
        let blocks = self.store.load_blocks()?;
        let result = validate_chain(&blocks, self.difficulty);
        let epoch = self.reload(blocks);
        self.record_validation(result, epoch, true);
        if result.is_valid() {
            tracing::info!("ledger health reset");
        }
        Ok(result)
    }

    /// The current published chain.
    pub fn snapshot(&self) -> Result<Arc<ChainSnapshot>, LedgerError> {
        if self.health() == LedgerHealth::Uninitialized {
            return Err(LedgerError::NotInitialized);
        }
        Ok(Arc::clone(&self.chain.read()))
    }

    pub fn len(&self) -> usize {
        self.chain.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get_by_hash(&self, hash: &BlockHash) -> Result<Option<Block>, LedgerError> {
        Ok(self.snapshot()?.get_by_hash(hash).cloned())
    }

    pub fn get_by_type(&self, kind: PayloadKind) -> Result<Vec<Block>, LedgerError> {
        Ok(self.snapshot()?.by_kind(kind).cloned().collect())
    }

    pub fn votes_for_poll(&self, poll_id: &PollId) -> Result<Vec<Block>, LedgerError> {
        Ok(self.snapshot()?.votes_for_poll(poll_id).cloned().collect())
    }

    pub fn blocks(&self) -> Result<Vec<Block>, LedgerError> {
        Ok(self.snapshot()?.blocks().to_vec())
    }

    pub fn latest(&self) -> Result<Block, LedgerError> {
        self.snapshot()?
            .tip()
            .cloned()
            .ok_or(LedgerError::NotInitialized)
    }

    pub fn genesis(&self) -> Result<Block, LedgerError> {
        self.snapshot()?
            .genesis()
            .cloned()
            .ok_or(LedgerError::NotInitialized)
    }

    /// Durable vote record for a voter in a poll.
    pub fn vote_record(
        &self,
        poll_id: &PollId,
        voter_id: &VoterId,
    ) -> Result<Option<VoteRecord>, LedgerError> {
        if self.health() == LedgerHealth::Uninitialized {
            return Err(LedgerError::NotInitialized);
        }
        Ok(self.store.get_vote(poll_id, voter_id)?)
    }

    pub fn stats(&self) -> Result<LedgerStats, LedgerError> {
        let epoch = self.epoch.load(Ordering::SeqCst);
        let snapshot = self.snapshot()?;
        let result = validate_chain(snapshot.blocks(), self.difficulty);
        self.record_validation(result, epoch, false);
        let (Some(genesis), Some(latest)) = (snapshot.genesis(), snapshot.tip()) else {
            return Err(LedgerError::NotInitialized);
        };
        Ok(LedgerStats {
            block_count: snapshot.len() as u64,
            is_valid: result.is_valid(),
            difficulty: self.difficulty,
            genesis_block: genesis.clone(),
            latest_block: latest.clone(),
        })
    }

    /// Flush the store.
    pub fn flush(&self) -> Result<(), LedgerError> {
        let _writer = self.writer.lock();
        Ok(self.store.flush()?)
    }

    fn ensure_writable(&self) -> Result<(), LedgerError> {
        match self.health() {
            LedgerHealth::Healthy => Ok(()),
            LedgerHealth::Uninitialized => Err(LedgerError::NotInitialized),
            LedgerHealth::Degraded { index, reason } => {
                Err(LedgerError::ChainCorruption { index, reason })
            }
        }
    }

    /// Replace the published chain with blocks read from the store and start
    /// a new epoch. Caller holds the writer lock.
    fn reload(&self, blocks: Vec<Block>) -> u64 {
        *self.chain.write() = Arc::new(ChainSnapshot::from_blocks(blocks));
        self.epoch.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Record a validation of a snapshot taken during `epoch`. Results from
    /// an epoch that has since been reloaded are dropped.
    fn record_validation(&self, result: ValidationResult, epoch: u64, clear: bool) {
        let mut health = self.health.write();
        if self.epoch.load(Ordering::SeqCst) != epoch {
            tracing::debug!(epoch, "chain reloaded during validation, result discarded");
            return;
        }
        match result {
            ValidationResult::Invalid { index, reason } => {
                if *health != (LedgerHealth::Degraded { index, reason }) {
                    tracing::error!(index, %reason, "chain validation failed, refusing appends");
                }
                *health = LedgerHealth::Degraded { index, reason };
            }
            ValidationResult::Valid if clear => *health = LedgerHealth::Healthy,
            ValidationResult::Valid => {}
        }
    }

    fn persist(&self, block: &Block) -> Result<(), LedgerError> {
        let result = match VoteRecord::for_block(block) {
            Some(record) => self.store.put_vote_block(block, &record),
            None => self.store.put_block(block),
        };
        match result {
            Ok(()) => Ok(()),
            Err(StoreError::Duplicate(detail)) => {
                if let BlockPayload::VoteCast {
                    poll_id, voter_id, ..
                } = &block.payload
                {
                    if self.store.get_vote(poll_id, voter_id)?.is_some() {
                        tracing::warn!(%poll_id, %voter_id, "rejected duplicate vote");
                        return Err(LedgerError::DuplicateVote {
                            poll_id: poll_id.clone(),
                            voter_id: voter_id.clone(),
                        });
                    }
                }
                tracing::error!(index = block.index, %detail, "block index already taken in store");
                Err(StoreError::Duplicate(detail).into())
            }
            Err(e) => {
                tracing::error!(index = block.index, error = %e, "failed to persist block");
                Err(e.into())
            }
        }
    }

    fn publish(&self, block: Block) {
        let mut chain = self.chain.write();
        Arc::make_mut(&mut *chain).push(block);
    }
}
