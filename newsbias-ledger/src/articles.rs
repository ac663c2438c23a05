//! Article store
//!
//! One record per submitted article: encrypted feature handles, submission
//! metadata and lifecycle state, plus the bias analysis populated once the
//! decrypted features come back.
//!
//! Lifecycle: `Pending` → `AnalysisRequested` → `Analyzed` (terminal).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::authorization::Principal;
use crate::classifier::Classification;
use crate::correlator::RequestId;
use crate::crypto::CipherHandle;
use crate::error::{LedgerError, Result};

/// Sequential article id; 0 is never assigned
pub type ArticleId = u64;

/// Sentinel for "no such article"
pub const NO_ARTICLE: ArticleId = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArticleState {
    Pending,
    AnalysisRequested,
    Analyzed,
}

/// Ciphertext handles for one article's features
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedFeatures {
    pub content: CipherHandle,
    pub sentiment: CipherHandle,
    pub keywords: CipherHandle,
}

impl EncryptedFeatures {
    /// Handles in decryption payload order: content, sentiment, keywords
    pub fn handles(&self) -> Vec<CipherHandle> {
        vec![self.content, self.sentiment, self.keywords]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Article {
    pub id: ArticleId,
    pub features: EncryptedFeatures,
    pub submitted_by: Principal,
    pub submitted_at: DateTime<Utc>,
    pub state: ArticleState,
    /// Outstanding decryption request while `AnalysisRequested`
    pub pending_request: Option<RequestId>,
}

/// Classification result for an article
///
/// Empty until the analysis is committed; immutable afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BiasAnalysis {
    pub bias_score: String,
    pub comparison_result: String,
    pub media_outlet: String,
    pub is_analyzed: bool,
    pub analyzed_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
struct ArticleRecord {
    article: Article,
    analysis: BiasAnalysis,
}

#[derive(Debug)]
pub struct ArticleStore {
    records: BTreeMap<ArticleId, ArticleRecord>,
    next_id: ArticleId,
}

impl Default for ArticleStore {
    fn default() -> Self {
        Self {
            records: BTreeMap::new(),
            next_id: NO_ARTICLE + 1,
        }
    }
}

impl ArticleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a new Pending article with an empty analysis
    ///
    /// Authorization is checked by the caller before the store is touched.
    pub fn submit(
        &mut self,
        submitted_by: Principal,
        features: EncryptedFeatures,
        submitted_at: DateTime<Utc>,
    ) -> ArticleId {
        let id = self.next_id;
        self.next_id += 1;

        self.records.insert(
            id,
            ArticleRecord {
                article: Article {
                    id,
                    features,
                    submitted_by,
                    submitted_at,
                    state: ArticleState::Pending,
                    pending_request: None,
                },
                analysis: BiasAnalysis::default(),
            },
        );
        info!("Article {} submitted", id);
        id
    }

    /// Check that an analysis request may be issued for `id`
    pub fn ensure_requestable(&self, id: ArticleId) -> Result<&Article> {
        let article = self.get(id)?;
        match article.state {
            ArticleState::Pending => Ok(article),
            ArticleState::Analyzed => Err(LedgerError::AlreadyAnalyzed(id)),
            ArticleState::AnalysisRequested => Err(LedgerError::RequestOutstanding {
                entity: format!("article {}", id),
                request_id: article.pending_request.unwrap_or_default(),
            }),
        }
    }

    /// `Pending` → `AnalysisRequested`
    pub fn mark_requested(&mut self, id: ArticleId, request_id: RequestId) -> Result<()> {
        self.ensure_requestable(id)?;
        let record = self.record_mut(id)?;
        record.article.state = ArticleState::AnalysisRequested;
        record.article.pending_request = Some(request_id);
        info!("Article {} analysis requested (request {})", id, request_id);
        Ok(())
    }

    /// Check that an analysis may still be committed for `id`
    pub fn ensure_committable(&self, id: ArticleId) -> Result<()> {
        let record = self.record(id)?;
        if record.analysis.is_analyzed {
            return Err(LedgerError::AlreadyAnalyzed(id));
        }
        Ok(())
    }

    /// Write the analysis and move the article to `Analyzed`
    ///
    /// A second commit for the same id fails with `AlreadyAnalyzed` and leaves the
    /// first analysis untouched.
    pub fn commit_analysis(
        &mut self,
        id: ArticleId,
        classification: Classification,
        analyzed_at: DateTime<Utc>,
    ) -> Result<&BiasAnalysis> {
        self.ensure_committable(id)?;
        let record = self.record_mut(id)?;

        record.analysis = BiasAnalysis {
            bias_score: classification.tier.as_str().to_string(),
            comparison_result: classification.deviation.as_str().to_string(),
            media_outlet: classification.outlet.as_str().to_string(),
            is_analyzed: true,
            analyzed_at: Some(analyzed_at),
        };
        record.article.state = ArticleState::Analyzed;
        record.article.pending_request = None;

        info!(
            "Article {} analyzed: {} / {} / {}",
            id,
            record.analysis.bias_score,
            record.analysis.comparison_result,
            record.analysis.media_outlet
        );
        Ok(&record.analysis)
    }

    pub fn get(&self, id: ArticleId) -> Result<&Article> {
        self.record(id).map(|record| &record.article)
    }

    pub fn get_analysis(&self, id: ArticleId) -> Result<&BiasAnalysis> {
        self.record(id).map(|record| &record.analysis)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Highest id assigned so far (`NO_ARTICLE` if none)
    pub fn last_id(&self) -> ArticleId {
        self.next_id - 1
    }

    pub fn count_in_state(&self, state: ArticleState) -> usize {
        self.records
            .values()
            .filter(|record| record.article.state == state)
            .count()
    }

    fn record(&self, id: ArticleId) -> Result<&ArticleRecord> {
        self.records.get(&id).ok_or(LedgerError::NotFound(id))
    }

    fn record_mut(&mut self, id: ArticleId) -> Result<&mut ArticleRecord> {
        self.records.get_mut(&id).ok_or(LedgerError::NotFound(id))
    }
}
