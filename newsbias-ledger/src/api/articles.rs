//! Article submission, analysis requests and article queries

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::api::caller::Caller;
use crate::api::error::ApiResult;
use crate::articles::{Article, ArticleId, BiasAnalysis, EncryptedFeatures};
use crate::correlator::RequestId;
use crate::crypto::CipherHandle;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SubmitArticleRequest {
    pub content: CipherHandle,
    pub sentiment: CipherHandle,
    pub keywords: CipherHandle,
}

#[derive(Debug, Serialize)]
pub struct SubmitArticleResponse {
    pub article_id: ArticleId,
}

#[derive(Debug, Serialize)]
pub struct AnalysisRequestResponse {
    pub article_id: ArticleId,
    pub request_id: RequestId,
}

/// POST /api/articles
pub async fn submit_article(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Json(request): Json<SubmitArticleRequest>,
) -> ApiResult<(StatusCode, Json<SubmitArticleResponse>)> {
    let features = EncryptedFeatures {
        content: request.content,
        sentiment: request.sentiment,
        keywords: request.keywords,
    };
    let article_id = state.ledger.submit_article(&caller, features).await?;
    Ok((StatusCode::CREATED, Json(SubmitArticleResponse { article_id })))
}

/// POST /api/articles/:id/analysis-request
///
/// Returns 202: the analysis completes when the decryption callback arrives.
pub async fn request_analysis(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(article_id): Path<ArticleId>,
) -> ApiResult<(StatusCode, Json<AnalysisRequestResponse>)> {
    let request_id = state.ledger.request_analysis(&caller, article_id).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(AnalysisRequestResponse {
            article_id,
            request_id,
        }),
    ))
}

/// GET /api/articles/:id
pub async fn get_article(
    State(state): State<AppState>,
    Path(article_id): Path<ArticleId>,
) -> ApiResult<Json<Article>> {
    Ok(Json(state.ledger.article(article_id).await?))
}

/// GET /api/articles/:id/analysis
pub async fn get_analysis(
    State(state): State<AppState>,
    Path(article_id): Path<ArticleId>,
) -> ApiResult<Json<BiasAnalysis>> {
    Ok(Json(state.ledger.analysis(article_id).await?))
}
