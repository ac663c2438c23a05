//! Category tally endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use crate::api::caller::Caller;
use crate::api::error::{ApiError, ApiResult};
use crate::correlator::RequestId;
use crate::crypto::CipherHandle;
use crate::tally::{CategoryHash, DecryptedCount};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct CategorySummary {
    pub label: String,
    /// Hex SHA-256 of the label
    pub hash: String,
}

#[derive(Debug, Serialize)]
pub struct EncryptedCountResponse {
    pub label: String,
    pub handle: CipherHandle,
    pub pending_request: Option<RequestId>,
}

#[derive(Debug, Serialize)]
pub struct CountDecryptionResponse {
    pub label: String,
    pub request_id: RequestId,
}

/// GET /api/categories
///
/// Categories in discovery order.
pub async fn list_categories(State(state): State<AppState>) -> Json<Vec<CategorySummary>> {
    let categories = state
        .ledger
        .categories()
        .await
        .into_iter()
        .map(|label| CategorySummary {
            hash: CategoryHash::of(&label).to_hex(),
            label,
        })
        .collect();
    Json(categories)
}

/// GET /api/categories/:label/count
///
/// Raw, still-encrypted counter handle.
pub async fn get_encrypted_count(
    State(state): State<AppState>,
    Path(label): Path<String>,
) -> ApiResult<Json<EncryptedCountResponse>> {
    let counter = state.ledger.category_counter(&label).await?;
    Ok(Json(EncryptedCountResponse {
        label: counter.label,
        handle: counter.handle,
        pending_request: counter.pending_request,
    }))
}

/// POST /api/categories/:label/decryption-request
pub async fn request_count_decryption(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(label): Path<String>,
) -> ApiResult<(StatusCode, Json<CountDecryptionResponse>)> {
    let request_id = state.ledger.request_count_decryption(&caller, &label).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(CountDecryptionResponse { label, request_id }),
    ))
}

/// GET /api/categories/:label/decrypted
pub async fn get_decrypted_counts(
    State(state): State<AppState>,
    Path(label): Path<String>,
) -> ApiResult<Json<Vec<DecryptedCount>>> {
    Ok(Json(state.ledger.decrypted_counts(&label).await?))
}

/// GET /api/category-hashes/:hash
pub async fn get_category_by_hash(
    State(state): State<AppState>,
    Path(hash): Path<String>,
) -> ApiResult<Json<CategorySummary>> {
    let parsed = CategoryHash::from_hex(&hash)
        .ok_or_else(|| ApiError::BadRequest(format!("invalid category hash: {}", hash)))?;
    let label = state.ledger.category_for_hash(&parsed).await?;
    Ok(Json(CategorySummary {
        label,
        hash: parsed.to_hex(),
    }))
}
