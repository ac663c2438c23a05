//! Administrative endpoints: principal authorization

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::api::caller::Caller;
use crate::api::error::{ApiError, ApiResult};
use crate::authorization::Principal;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct AuthorizeRequest {
    pub principal: String,
}

#[derive(Debug, Serialize)]
pub struct AuthorizeResponse {
    pub principal: Principal,
    /// False if the principal was already authorized
    pub newly_granted: bool,
}

#[derive(Debug, Serialize)]
pub struct PrincipalStatus {
    pub principal: Principal,
    pub authorized: bool,
}

/// POST /api/principals
pub async fn authorize_principal(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Json(request): Json<AuthorizeRequest>,
) -> ApiResult<Json<AuthorizeResponse>> {
    let target = request.principal.trim();
    if target.is_empty() {
        return Err(ApiError::BadRequest("principal must not be empty".to_string()));
    }

    let principal = Principal::new(target);
    let newly_granted = state.ledger.authorize(&caller, principal.clone()).await?;
    Ok(Json(AuthorizeResponse {
        principal,
        newly_granted,
    }))
}

/// GET /api/principals
pub async fn list_principals(State(state): State<AppState>) -> Json<Vec<Principal>> {
    Json(state.ledger.principals().await)
}

/// GET /api/principals/:principal
pub async fn get_principal(
    State(state): State<AppState>,
    Path(principal): Path<String>,
) -> Json<PrincipalStatus> {
    let principal = Principal::new(principal);
    let authorized = state.ledger.is_authorized(&principal).await;
    Json(PrincipalStatus {
        principal,
        authorized,
    })
}
