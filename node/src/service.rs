//! The process-scoped vote ledger service.
//!
//! `open` → use → `shutdown`. The service owns the store, the ledger and the
//! coordinator; nothing is global.

use std::sync::Arc;

use vox_ledger::{Ledger, LedgerHealth, LedgerStats, ValidationResult};
use vox_store::LedgerStore;
use vox_store_lmdb::{check_data_dir, LmdbEnvironment};
use vox_types::{Block, BlockHash, PayloadKind};
use vox_work::BlockSealer;

use crate::coordinator::{AppendCoordinator, VoteReceipt, VoteSubmission};
use crate::ledger_event::EventBus;
use crate::metrics::LedgerMetrics;
use crate::{NodeConfig, NodeError};

pub struct VoteLedgerService {
    config: NodeConfig,
    ledger: Arc<Ledger>,
    coordinator: AppendCoordinator,
    metrics: Arc<LedgerMetrics>,
    events: Arc<EventBus>,
}

impl VoteLedgerService {
    /// Open the LMDB store under `config.data_dir` and initialize the ledger.
    pub fn open(config: NodeConfig) -> Result<Self, NodeError> {
        check_data_dir(&config.data_dir).map_err(NodeError::Config)?;
        let env = LmdbEnvironment::open(&config.data_dir, config.map_size_bytes())?;
        Self::with_store(config, Arc::new(env))
    }

    /// Initialize the ledger over an already-open store.
    ///
    /// A missing `vote_key` is refused before the store is touched unless
    /// `ephemeral_key` is set. A store error here is fatal: the service never runs on an empty or
    /// unconfirmed chain. A chain that loads but fails validation starts in
    /// the degraded state and refuses appends.
    pub fn with_store(config: NodeConfig, store: Arc<dyn LedgerStore>) -> Result<Self, NodeError> {
        let key = config.resolve_vote_key()?;
        let sealer = BlockSealer::with_threads(config.seal_threads)
            .map_err(|e| NodeError::Config(e.to_string()))?;
        let ledger = Arc::new(Ledger::new(store, config.difficulty).with_sealer(sealer));
        ledger.initialize()?;

        match ledger.health() {
            LedgerHealth::Degraded { index, reason } => {
                tracing::warn!(index, %reason, "ledger opened degraded, appends are refused");
            }
            _ => tracing::info!(
                blocks = ledger.len(),
                difficulty = config.difficulty.digits(),
                "ledger ready"
            ),
        }

        let metrics = Arc::new(LedgerMetrics::new()?);
        let events = Arc::new(EventBus::new());
        let coordinator = AppendCoordinator::new(
            Arc::clone(&ledger),
            key,
            config.append_timeout(),
            Arc::clone(&metrics),
            Arc::clone(&events),
        )?;

        Ok(Self {
            config,
            ledger,
            coordinator,
            metrics,
            events,
        })
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    pub fn coordinator(&self) -> &AppendCoordinator {
        &self.coordinator
    }

    pub fn metrics(&self) -> &LedgerMetrics {
        &self.metrics
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn health(&self) -> LedgerHealth {
        self.ledger.health()
    }

    pub async fn submit_vote(&self, submission: VoteSubmission) -> Result<VoteReceipt, NodeError> {
        self.coordinator.submit_vote(submission).await
    }

    pub fn validate_ledger(&self) -> Result<ValidationResult, NodeError> {
        Ok(self.ledger.validate()?)
    }

    pub fn get_block(&self, hash: &BlockHash) -> Result<Block, NodeError> {
        self.ledger
            .get_by_hash(hash)?
            .ok_or_else(|| NodeError::NotFound(format!("block {hash}")))
    }

    pub fn get_blocks_by_type(&self, kind: PayloadKind) -> Result<Vec<Block>, NodeError> {
        Ok(self.ledger.get_by_type(kind)?)
    }

    pub fn stats(&self) -> Result<LedgerStats, NodeError> {
        Ok(self.ledger.stats()?)
    }

    /// Re-validate after an operator repaired the store, and re-derive the
    /// cast index from the reloaded chain.
    pub fn reset_health(&self) -> Result<ValidationResult, NodeError> {
        let result = self.ledger.reset_health()?;
        self.coordinator.rebuild_cast_index()?;
        Ok(result)
    }

    /// Flush the store and release it.
    pub fn shutdown(self) -> Result<(), NodeError> {
        self.ledger.flush()?;
        tracing::info!(blocks = self.ledger.len(), "ledger service stopped");
        Ok(())
    }
}
