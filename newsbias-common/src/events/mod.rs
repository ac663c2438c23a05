//! Event types for the NewsBias event system
//!
//! Provides shared event definitions and the EventBus used by the ledger
//! service and anything observing it (SSE clients, tests).

mod target_types;

pub use target_types::TargetKind;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Ledger notifications
///
/// Notifications are observable, not queryable: they are broadcast via
/// [`EventBus`] and serialized for SSE transmission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LedgerEvent {
    /// A principal was granted authorization
    PrincipalAuthorized {
        principal: String,
        granted_by: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// An article was submitted and stored as Pending
    ArticleSubmitted {
        article_id: u64,
        /// Submission time recorded on the article
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Decryption of an article's features was requested
    AnalysisRequested {
        article_id: u64,
        request_id: u64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// An article's analysis was committed
    AnalysisCompleted {
        article_id: u64,
        bias_score: String,
        comparison_result: String,
        media_outlet: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A bias category was seen for the first time
    CategoryCreated {
        category: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Decryption of a category counter was requested
    CategoryDecryptionRequested {
        category: String,
        request_id: u64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A category counter was decrypted
    CategoryCountDecrypted {
        category: String,
        request_id: u64,
        count: u32,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A decryption callback was refused with no state change
    CallbackRejected {
        request_id: u64,
        /// Target kind, if the request id was known
        target: Option<TargetKind>,
        reason: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl LedgerEvent {
    /// Event type name, used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            LedgerEvent::PrincipalAuthorized { .. } => "PrincipalAuthorized",
            LedgerEvent::ArticleSubmitted { .. } => "ArticleSubmitted",
            LedgerEvent::AnalysisRequested { .. } => "AnalysisRequested",
            LedgerEvent::AnalysisCompleted { .. } => "AnalysisCompleted",
            LedgerEvent::CategoryCreated { .. } => "CategoryCreated",
            LedgerEvent::CategoryDecryptionRequested { .. } => "CategoryDecryptionRequested",
            LedgerEvent::CategoryCountDecrypted { .. } => "CategoryCountDecrypted",
            LedgerEvent::CallbackRejected { .. } => "CallbackRejected",
        }
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Broadcast bus for [`LedgerEvent`]s
///
/// Wraps `tokio::sync::broadcast`: every subscriber receives every event emitted
/// after it subscribed. Slow subscribers lose the oldest events once `capacity`
/// is exceeded.
pub struct EventBus {
    tx: broadcast::Sender<LedgerEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: LedgerEvent,
    ) -> Result<usize, broadcast::error::SendError<LedgerEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: LedgerEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
