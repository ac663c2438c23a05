//! Request correlator
//!
//! Maps opaque decryption-request ids to the entity the eventual callback
//! resolves. Ids are random, non-zero and never issued twice in the process
//! lifetime. `resolve` removes the mapping before returning it, so a request
//! id is honored at most once.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use newsbias_common::events::TargetKind;
use rand::Rng;
use serde::Serialize;
use tracing::debug;

use crate::articles::ArticleId;
use crate::error::{LedgerError, Result};

/// Opaque decryption-request identifier
pub type RequestId = u64;

/// Entity resolved by a decryption callback
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "ref")]
pub enum Target {
    Article(ArticleId),
    Category(String),
}

impl Target {
    pub fn kind(&self) -> TargetKind {
        match self {
            Target::Article(_) => TargetKind::Article,
            Target::Category(_) => TargetKind::Category,
        }
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Target::Article(id) => write!(f, "article {}", id),
            Target::Category(label) => write!(f, "category '{}'", label),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    pub target: Target,
    pub registered_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct RequestCorrelator {
    pending: HashMap<RequestId, PendingRequest>,
    /// Every id ever handed out, including resolved ones
    issued: HashSet<RequestId>,
}

impl RequestCorrelator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh id for `target`
    pub fn register(&mut self, target: Target, registered_at: DateTime<Utc>) -> RequestId {
        let mut rng = rand::thread_rng();
        let request_id = loop {
            let candidate: RequestId = rng.gen();
            if candidate != 0 && self.issued.insert(candidate) {
                break candidate;
            }
        };

        debug!("Registered request {} for {}", request_id, target);
        self.pending.insert(
            request_id,
            PendingRequest {
                target,
                registered_at,
            },
        );
        request_id
    }

    /// Look up a pending request without consuming it
    pub fn peek(&self, request_id: RequestId) -> Result<&PendingRequest> {
        self.pending
            .get(&request_id)
            .ok_or(LedgerError::InvalidRequest(request_id))
    }

    /// Consume a pending request, returning its target
    pub fn resolve(&mut self, request_id: RequestId) -> Result<Target> {
        let pending = self
            .pending
            .remove(&request_id)
            .ok_or(LedgerError::InvalidRequest(request_id))?;
        debug!("Resolved request {} for {}", request_id, pending.target);
        Ok(pending.target)
    }

    /// Withdraw a request the decryption service refused
    ///
    /// The id stays in the issued set and is never reused.
    pub fn cancel(&mut self, request_id: RequestId) -> Option<Target> {
        self.pending.remove(&request_id).map(|pending| pending.target)
    }

    /// Number of requests awaiting a callback
    pub fn outstanding(&self) -> usize {
        self.pending.len()
    }
}
