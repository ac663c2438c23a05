//! Ledger facade
//!
//! Owns all core state behind a single `RwLock`. Each public mutating
//! operation takes the write lock once and commits as one indivisible unit, so
//! concurrent callers (two submissions, a submission racing a callback, a
//! duplicated callback) observe a sequentially consistent ledger.
//!
//! Decryption round trips never block here: requesting analysis registers the
//! pending request, hands it to the crypto service and returns. The result
//! arrives later through [`Ledger::on_decrypted`].

use std::sync::Arc;

use newsbias_common::events::{EventBus, LedgerEvent, TargetKind};
use newsbias_common::time;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::articles::{Article, ArticleId, ArticleState, ArticleStore, BiasAnalysis, EncryptedFeatures};
use crate::authorization::{AuthorizationRegistry, Principal};
use crate::callback::{self, CallbackOutcome};
use crate::correlator::{RequestCorrelator, RequestId, Target};
use crate::crypto::{CipherHandle, DecryptionRequest, FheService};
use crate::error::Result;
use crate::tally::{CategoryCounter, CategoryHash, CategoryTallyLedger, DecryptedCount};

/// Core state guarded by the ledger lock
#[derive(Debug)]
pub struct LedgerState {
    pub(crate) authorization: AuthorizationRegistry,
    pub(crate) articles: ArticleStore,
    pub(crate) correlator: RequestCorrelator,
    pub(crate) tally: CategoryTallyLedger,
}

impl LedgerState {
    pub fn new(deployer: Principal) -> Self {
        Self {
            authorization: AuthorizationRegistry::with_deployer(deployer),
            articles: ArticleStore::new(),
            correlator: RequestCorrelator::new(),
            tally: CategoryTallyLedger::new(),
        }
    }
}

/// Aggregate counters for monitoring
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerStats {
    pub articles: usize,
    /// Highest article id assigned so far
    pub last_article_id: ArticleId,
    pub pending: usize,
    pub analysis_requested: usize,
    pub analyzed: usize,
    pub outstanding_requests: usize,
    pub categories: usize,
    pub principals: usize,
}

pub struct Ledger {
    state: RwLock<LedgerState>,
    crypto: Arc<dyn FheService>,
    events: Arc<EventBus>,
}

impl Ledger {
    /// Create a ledger with `deployer` as the only authorized principal
    pub fn new(deployer: Principal, crypto: Arc<dyn FheService>, events: Arc<EventBus>) -> Self {
        info!("Ledger initialized with deployer {}", deployer);
        Self {
            state: RwLock::new(LedgerState::new(deployer)),
            crypto,
            events,
        }
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    // ========================================
    // Administrative boundary
    // ========================================

    /// Grant `target` authorization; returns `true` if the grant is new
    pub async fn authorize(&self, caller: &Principal, target: Principal) -> Result<bool> {
        let mut state = self.state.write().await;
        let granted = state.authorization.authorize(caller, target.clone())?;
        if granted {
            self.events.emit_lossy(LedgerEvent::PrincipalAuthorized {
                principal: target.to_string(),
                granted_by: caller.to_string(),
                timestamp: time::now(),
            });
        }
        Ok(granted)
    }

    pub async fn is_authorized(&self, principal: &Principal) -> bool {
        self.state.read().await.authorization.is_authorized(principal)
    }

    pub async fn principals(&self) -> Vec<Principal> {
        self.state.read().await.authorization.principals().to_vec()
    }

    // ========================================
    // Article lifecycle
    // ========================================

    /// Store a new article; fails with `Unauthorized` before any state change
    pub async fn submit_article(
        &self,
        caller: &Principal,
        features: EncryptedFeatures,
    ) -> Result<ArticleId> {
        let mut state = self.state.write().await;
        state.authorization.ensure_authorized(caller)?;

        let submitted_at = time::now();
        let article_id = state.articles.submit(caller.clone(), features, submitted_at);
        self.events.emit_lossy(LedgerEvent::ArticleSubmitted {
            article_id,
            timestamp: submitted_at,
        });
        Ok(article_id)
    }

    /// Ask the crypto service to decrypt an article's features
    ///
    /// Returns as soon as the request is registered and handed off.
    pub async fn request_analysis(&self, caller: &Principal, article_id: ArticleId) -> Result<RequestId> {
        let mut state = self.state.write().await;
        state.authorization.ensure_authorized(caller)?;
        let handles = state.articles.ensure_requestable(article_id)?.features.handles();

        let now = time::now();
        let request_id = state.correlator.register(Target::Article(article_id), now);
        let request = DecryptionRequest {
            request_id,
            handles,
            callback: TargetKind::Article,
        };
        if let Err(e) = self.crypto.request_decryption(request) {
            state.correlator.cancel(request_id);
            warn!("Decryption request for article {} refused: {}", article_id, e);
            return Err(e.into());
        }

        state.articles.mark_requested(article_id, request_id)?;
        self.events.emit_lossy(LedgerEvent::AnalysisRequested {
            article_id,
            request_id,
            timestamp: now,
        });
        Ok(request_id)
    }

    /// Ask the crypto service to decrypt a category's running count
    pub async fn request_count_decryption(&self, caller: &Principal, category: &str) -> Result<RequestId> {
        let mut state = self.state.write().await;
        state.authorization.ensure_authorized(caller)?;
        let handle = state.tally.ensure_decryptable(category)?.handle;

        let now = time::now();
        let request_id = state
            .correlator
            .register(Target::Category(category.to_string()), now);
        let request = DecryptionRequest {
            request_id,
            handles: vec![handle],
            callback: TargetKind::Category,
        };
        if let Err(e) = self.crypto.request_decryption(request) {
            state.correlator.cancel(request_id);
            warn!("Decryption request for category '{}' refused: {}", category, e);
            return Err(e.into());
        }

        state.tally.mark_decryption_requested(category, request_id)?;
        self.events.emit_lossy(LedgerEvent::CategoryDecryptionRequested {
            category: category.to_string(),
            request_id,
            timestamp: now,
        });
        Ok(request_id)
    }

    // ========================================
    // Callback boundary
    // ========================================

    /// Apply a decryption result delivered by the crypto service
    pub async fn on_decrypted(
        &self,
        request_id: RequestId,
        cleartexts: &[u8],
        proof: &[u8],
    ) -> Result<CallbackOutcome> {
        let mut state = self.state.write().await;
        let now = time::now();

        let outcome = match callback::handle_decryption(
            &mut state,
            self.crypto.as_ref(),
            request_id,
            cleartexts,
            proof,
            now,
        ) {
            Ok(outcome) => outcome,
            Err(e) => {
                let target = state
                    .correlator
                    .peek(request_id)
                    .ok()
                    .map(|pending| pending.target.kind());
                warn!("Rejected decryption callback {}: {}", request_id, e);
                self.events.emit_lossy(LedgerEvent::CallbackRejected {
                    request_id,
                    target,
                    reason: e.to_string(),
                    timestamp: now,
                });
                return Err(e);
            }
        };

        match &outcome {
            CallbackOutcome::ArticleAnalyzed {
                article_id,
                analysis,
                category_created,
            } => {
                if *category_created {
                    self.events.emit_lossy(LedgerEvent::CategoryCreated {
                        category: analysis.bias_score.clone(),
                        timestamp: now,
                    });
                }
                self.events.emit_lossy(LedgerEvent::AnalysisCompleted {
                    article_id: *article_id,
                    bias_score: analysis.bias_score.clone(),
                    comparison_result: analysis.comparison_result.clone(),
                    media_outlet: analysis.media_outlet.clone(),
                    timestamp: now,
                });
            }
            CallbackOutcome::CountDecrypted { category, count } => {
                self.events.emit_lossy(LedgerEvent::CategoryCountDecrypted {
                    category: category.clone(),
                    request_id,
                    count: *count,
                    timestamp: now,
                });
            }
        }
        Ok(outcome)
    }

    // ========================================
    // Query boundary
    // ========================================

    pub async fn article(&self, article_id: ArticleId) -> Result<Article> {
        self.state.read().await.articles.get(article_id).cloned()
    }

    pub async fn analysis(&self, article_id: ArticleId) -> Result<BiasAnalysis> {
        self.state
            .read()
            .await
            .articles
            .get_analysis(article_id)
            .cloned()
    }

    /// Raw encrypted counter handle for `category`
    pub async fn encrypted_count(&self, category: &str) -> Result<CipherHandle> {
        self.state.read().await.tally.encrypted_count(category)
    }

    pub async fn category_counter(&self, category: &str) -> Result<CategoryCounter> {
        self.state.read().await.tally.counter(category).cloned()
    }

    pub async fn category_for_hash(&self, hash: &CategoryHash) -> Result<String> {
        self.state
            .read()
            .await
            .tally
            .category_for_hash(hash)
            .map(str::to_string)
    }

    /// Known categories in discovery order
    pub async fn categories(&self) -> Vec<String> {
        self.state.read().await.tally.categories().to_vec()
    }

    pub async fn decrypted_counts(&self, category: &str) -> Result<Vec<DecryptedCount>> {
        self.state.read().await.tally.decrypted_counts(category)
    }

    pub async fn stats(&self) -> LedgerStats {
        let state = self.state.read().await;
        LedgerStats {
            articles: state.articles.len(),
            last_article_id: state.articles.last_id(),
            pending: state.articles.count_in_state(ArticleState::Pending),
            analysis_requested: state.articles.count_in_state(ArticleState::AnalysisRequested),
            analyzed: state.articles.count_in_state(ArticleState::Analyzed),
            outstanding_requests: state.correlator.outstanding(),
            categories: state.tally.categories().len(),
            principals: state.authorization.principals().len(),
        }
    }
}
