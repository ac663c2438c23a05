//! Decryption callback handler
//!
//! The only path by which externally supplied values reach ledger state. Every
//! input is treated as adversarial: the proof is verified, the request id must
//! be outstanding, and the payload must match the target's shape. All checks
//! and fallible crypto calls happen before the request is consumed, so a
//! rejected callback leaves no trace and the request stays outstanding.

use chrono::{DateTime, Utc};
use newsbias_common::events::TargetKind;
use serde::Serialize;

use crate::articles::{ArticleId, BiasAnalysis};
use crate::classifier::{self, Features};
use crate::codec;
use crate::correlator::{RequestId, Target};
use crate::crypto::{CryptoError, FheService};
use crate::error::{LedgerError, Result};
use crate::ledger::LedgerState;

/// Effect of an accepted callback
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome")]
pub enum CallbackOutcome {
    ArticleAnalyzed {
        article_id: ArticleId,
        analysis: BiasAnalysis,
        /// The article's tier was seen for the first time
        category_created: bool,
    },
    CountDecrypted {
        category: String,
        count: u32,
    },
}

pub(crate) fn handle_decryption(
    state: &mut LedgerState,
    crypto: &dyn FheService,
    request_id: RequestId,
    cleartexts: &[u8],
    proof: &[u8],
    now: DateTime<Utc>,
) -> Result<CallbackOutcome> {
    crypto
        .verify(request_id, cleartexts, proof)
        .map_err(|e| match e {
            CryptoError::VerificationFailed(reason) => LedgerError::InvalidProof(reason),
            other => LedgerError::Crypto(other),
        })?;

    let target = state.correlator.peek(request_id)?.target.clone();

    match target {
        Target::Article(article_id) => {
            let words = codec::decode_words(cleartexts, TargetKind::Article.expected_arity())?;
            let classification = classifier::classify(Features {
                content_score: words[0],
                sentiment: words[1],
                keyword_signature: words[2],
            });

            state.articles.ensure_committable(article_id)?;
            let prepared = state
                .tally
                .prepare_increment(classification.tier.as_str(), crypto)?;

            // No fallible step past this point
            state.correlator.resolve(request_id)?;
            let analysis = state
                .articles
                .commit_analysis(article_id, classification, now)?
                .clone();
            let category_created = state.tally.apply_increment(prepared, now);

            Ok(CallbackOutcome::ArticleAnalyzed {
                article_id,
                analysis,
                category_created,
            })
        }
        Target::Category(label) => {
            let words = codec::decode_words(cleartexts, TargetKind::Category.expected_arity())?;
            state.tally.counter(&label)?;

            state.correlator.resolve(request_id)?;
            let count = state
                .tally
                .resolve_decrypted_count(request_id, &label, words[0], now)?
                .count;

            Ok(CallbackOutcome::CountDecrypted {
                category: label,
                count,
            })
        }
    }
}
