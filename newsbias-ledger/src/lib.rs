//! newsbias-ledger library - encrypted news-bias ledger
//!
//! Tracks articles submitted as encrypted feature vectors through
//! decryption and classification, correlates asynchronous decryption
//! callbacks with the entity they resolve, and keeps an encrypted running
//! tally per bias category.

use std::sync::Arc;

use axum::Router;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod articles;
pub mod authorization;
pub mod callback;
pub mod classifier;
pub mod codec;
pub mod correlator;
pub mod crypto;
pub mod error;
pub mod ledger;
pub mod relayer;
pub mod tally;

pub use error::{LedgerError, Result};
pub use ledger::Ledger;

use crypto::LocalFheService;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<Ledger>,
    /// Local crypto service, when the ledger runs against one
    pub local_crypto: Option<Arc<LocalFheService>>,
}

impl AppState {
    pub fn new(ledger: Arc<Ledger>, local_crypto: Option<Arc<LocalFheService>>) -> Self {
        Self {
            ledger,
            local_crypto,
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post};

    Router::new()
        // Administrative boundary
        .route("/api/principals", get(api::list_principals).post(api::authorize_principal))
        .route("/api/principals/:principal", get(api::get_principal))
        // Article lifecycle
        .route("/api/articles", post(api::submit_article))
        .route("/api/articles/:id", get(api::get_article))
        .route("/api/articles/:id/analysis", get(api::get_analysis))
        .route("/api/articles/:id/analysis-request", post(api::request_analysis))
        // Category tally
        .route("/api/categories", get(api::list_categories))
        .route("/api/categories/:label/count", get(api::get_encrypted_count))
        .route(
            "/api/categories/:label/decryption-request",
            post(api::request_count_decryption),
        )
        .route("/api/categories/:label/decrypted", get(api::get_decrypted_counts))
        .route("/api/category-hashes/:hash", get(api::get_category_by_hash))
        // Callback boundary
        .route("/api/callbacks/decryption", post(api::decryption_callback))
        // Local crypto service
        .route("/api/dev/ciphertexts", post(api::encrypt_value))
        // Monitoring
        .route("/api/stats", get(api::get_stats))
        .route("/events", get(api::event_stream))
        .merge(api::health_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
