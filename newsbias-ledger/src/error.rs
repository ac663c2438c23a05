//! Error types for the ledger core
//!
//! Every variant is a typed outcome reported to the caller. An operation that
//! returns an error has committed no state change.

use thiserror::Error;

use crate::articles::ArticleId;
use crate::codec::CodecError;
use crate::correlator::RequestId;
use crate::crypto::CryptoError;

/// Main error type for ledger operations
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Caller lacks the required grant
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Reference to a nonexistent article
    #[error("Article not found: {0}")]
    NotFound(ArticleId),

    /// Analysis already committed for this article
    #[error("Article {0} is already analyzed")]
    AlreadyAnalyzed(ArticleId),

    /// A decryption request for this entity is still in flight
    #[error("Request {request_id} is still outstanding for {entity}")]
    RequestOutstanding { entity: String, request_id: RequestId },

    /// Unknown or already-consumed correlation id
    #[error("Invalid request id: {0}")]
    InvalidRequest(RequestId),

    /// Decryption proof did not verify
    #[error("Invalid proof: {0}")]
    InvalidProof(String),

    /// Decoded cleartext does not match the target's expected shape
    #[error("Malformed payload: {0}")]
    MalformedPayload(#[from] CodecError),

    /// Category label (or label hash) never created
    #[error("Category not found: {0}")]
    CategoryNotFound(String),

    /// Two labels share a hash; the new label is refused
    #[error("Category hash collision between '{existing}' and '{label}'")]
    CategoryHashCollision { existing: String, label: String },

    /// Cryptographic service failure
    #[error("Crypto service error: {0}")]
    Crypto(#[from] CryptoError),
}

impl LedgerError {
    /// Stable machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::Unauthorized(_) => "UNAUTHORIZED",
            LedgerError::NotFound(_) => "NOT_FOUND",
            LedgerError::AlreadyAnalyzed(_) => "ALREADY_ANALYZED",
            LedgerError::RequestOutstanding { .. } => "REQUEST_OUTSTANDING",
            LedgerError::InvalidRequest(_) => "INVALID_REQUEST",
            LedgerError::InvalidProof(_) => "INVALID_PROOF",
            LedgerError::MalformedPayload(_) => "MALFORMED_PAYLOAD",
            LedgerError::CategoryNotFound(_) => "CATEGORY_NOT_FOUND",
            LedgerError::CategoryHashCollision { .. } => "CATEGORY_HASH_COLLISION",
            LedgerError::Crypto(_) => "CRYPTO_ERROR",
        }
    }
}

/// Convenience Result type using LedgerError
pub type Result<T> = std::result::Result<T, LedgerError>;
