//! Callback boundary and local crypto service endpoints
//!
//! Decryption results arrive as JSON with base64-encoded cleartexts and proof.

use axum::{extract::State, http::StatusCode, Json};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::error::{ApiError, ApiResult};
use crate::callback::CallbackOutcome;
use crate::correlator::RequestId;
use crate::crypto::CipherHandle;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct DecryptionCallback {
    pub request_id: RequestId,
    /// Base64 of the 32-byte-word cleartext payload
    pub cleartexts: String,
    /// Base64 of the decryption proof
    pub proof: String,
}

#[derive(Debug, Deserialize)]
pub struct EncryptRequest {
    pub value: u32,
}

#[derive(Debug, Serialize)]
pub struct EncryptResponse {
    pub handle: CipherHandle,
}

/// POST /api/callbacks/decryption
///
/// No caller identity: the proof is the only credential.
pub async fn decryption_callback(
    State(state): State<AppState>,
    Json(callback): Json<DecryptionCallback>,
) -> ApiResult<Json<CallbackOutcome>> {
    let cleartexts = STANDARD
        .decode(callback.cleartexts.as_bytes())
        .map_err(|e| ApiError::BadRequest(format!("cleartexts is not valid base64: {}", e)))?;
    let proof = STANDARD
        .decode(callback.proof.as_bytes())
        .map_err(|e| ApiError::BadRequest(format!("proof is not valid base64: {}", e)))?;

    debug!(
        "Decryption callback for request {} ({} bytes)",
        callback.request_id,
        cleartexts.len()
    );
    let outcome = state
        .ledger
        .on_decrypted(callback.request_id, &cleartexts, &proof)
        .await?;
    Ok(Json(outcome))
}

/// POST /api/dev/ciphertexts
///
/// Encrypts a value with the local crypto service. Only available when the
/// ledger runs against one.
pub async fn encrypt_value(
    State(state): State<AppState>,
    Json(request): Json<EncryptRequest>,
) -> ApiResult<(StatusCode, Json<EncryptResponse>)> {
    let service = state
        .local_crypto
        .as_ref()
        .ok_or_else(|| ApiError::NotFound("local crypto service".to_string()))?;
    let handle = service
        .encrypt(request.value)
        .map_err(|e| ApiError::Ledger(e.into()))?;
    Ok((StatusCode::CREATED, Json(EncryptResponse { handle })))
}
