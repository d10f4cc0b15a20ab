//! Events emitted as the ledger changes, for in-process subscribers.

use std::sync::Arc;

use parking_lot::RwLock;
use vox_types::{BlockHash, PayloadKind, PollId, VoterId};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LedgerEvent {
    /// A block was persisted and published.
    BlockAppended {
        index: u64,
        hash: BlockHash,
        kind: PayloadKind,
    },
    /// A ballot was committed.
    VoteRecorded {
        poll_id: PollId,
        block_hash: BlockHash,
    },
    /// A second ballot from the same voter was turned away.
    DuplicateRejected { poll_id: PollId, voter_id: VoterId },
}

type Listener = Arc<dyn Fn(&LedgerEvent) + Send + Sync>;

/// Synchronous fan-out event bus.
///
/// Listeners run inline on the emitting task; keep handlers fast to avoid
/// stalling appends. The listener list is copied before dispatch, so a
/// handler may subscribe or emit without deadlocking. A listener added
/// during an emit first sees the next event.
#[derive(Default)]
pub struct EventBus {
    listeners: RwLock<Vec<Listener>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: impl Fn(&LedgerEvent) + Send + Sync + 'static) {
        self.listeners.write().push(Arc::new(listener));
    }

    pub fn emit(&self, event: &LedgerEvent) {
        let listeners = self.listeners.read().clone();
        for listener in &listeners {
            listener(event);
        }
    }
}
