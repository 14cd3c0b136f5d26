//! API request handlers

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::analysis::{AnalysisResult, CompositeAnalyzer, CompositeResult};
use crate::utils::normalize_domain;

/// Shared application state
pub struct AppState {
    pub analyzer: CompositeAnalyzer,
}

/// Body of every check endpoint
#[derive(Debug, Deserialize)]
pub struct CheckRequest {
    pub domain: String,
    /// DKIM selector; ignored by the other protocols
    #[serde(default)]
    pub selector: Option<String>,
}

/// API error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
}

impl ApiError {
    pub fn new(msg: &str) -> Self {
        Self {
            error: msg.to_string(),
        }
    }
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

fn domain_of(req: &CheckRequest) -> Result<String, (StatusCode, Json<ApiError>)> {
    normalize_domain(&req.domain).map_err(|e| {
        warn!("Rejected domain {:?}: {}", req.domain, e);
        (StatusCode::BAD_REQUEST, Json(ApiError::new(&e.to_string())))
    })
}

/// GET /health
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// POST /api/check/dmarc
pub async fn check_dmarc(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CheckRequest>,
) -> ApiResult<AnalysisResult> {
    let domain = domain_of(&req)?;
    info!("DMARC check requested for {}", domain);
    Ok(Json(state.analyzer.dmarc().analyze(&domain).await))
}

/// POST /api/check/spf
pub async fn check_spf(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CheckRequest>,
) -> ApiResult<AnalysisResult> {
    let domain = domain_of(&req)?;
    info!("SPF check requested for {}", domain);
    Ok(Json(state.analyzer.spf().analyze(&domain).await))
}

/// POST /api/check/dkim
pub async fn check_dkim(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CheckRequest>,
) -> ApiResult<AnalysisResult> {
    let domain = domain_of(&req)?;
    info!("DKIM check requested for {}", domain);
    Ok(Json(
        state
            .analyzer
            .dkim()
            .analyze(&domain, req.selector.as_deref())
            .await,
    ))
}

/// POST /api/check/mx
pub async fn check_mx(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CheckRequest>,
) -> ApiResult<AnalysisResult> {
    let domain = domain_of(&req)?;
    info!("MX check requested for {}", domain);
    Ok(Json(state.analyzer.mx().analyze(&domain).await))
}

/// POST /api/check/all
pub async fn check_all(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CheckRequest>,
) -> ApiResult<CompositeResult> {
    let domain = domain_of(&req)?;
    info!("Full check requested for {}", domain);
    Ok(Json(
        state
            .analyzer
            .analyze(&domain, req.selector.as_deref())
            .await,
    ))
}
