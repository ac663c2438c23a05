//! HTTP API handlers for newsbias-ledger

pub mod articles;
pub mod callbacks;
pub mod caller;
pub mod categories;
pub mod error;
pub mod health;
pub mod principals;
pub mod sse;

pub use articles::{get_analysis, get_article, request_analysis, submit_article};
pub use callbacks::{decryption_callback, encrypt_value};
pub use caller::{Caller, CALLER_HEADER};
pub use categories::{
    get_category_by_hash, get_decrypted_counts, get_encrypted_count, list_categories,
    request_count_decryption,
};
pub use error::ApiError;
pub use health::{get_stats, health_routes};
pub use principals::{authorize_principal, get_principal, list_principals};
pub use sse::event_stream;
