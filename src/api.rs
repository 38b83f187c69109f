//! HTTP API
//!
//! Thin axum layer over the ingestion facade, the verifier and the record
//! store. Responses use a `{ "status": ..., "data" | "message": ... }`
//! envelope.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::error::LedgerError;
use crate::ledger::{IntegrityVerifier, LogIngestor};
use crate::logs::{LogQuery, LogStore, LogType, NewLogRecord, Severity, TimeRange};

#[derive(Clone)]
pub struct AppState {
    pub ingestor: LogIngestor,
    pub verifier: IntegrityVerifier,
    pub records: LogStore,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/logs", get(list_logs).post(create_log))
        .route("/logs/anomalies", get(list_anomalies))
        .route("/logs/:id", get(get_log))
        .route("/logs/:id/verify", get(verify_log))
        .route("/ledger/status", get(ledger_status))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .into_inner(),
        )
        .with_state(state)
}

/// Error surfaced to HTTP clients
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    Ledger(LedgerError),
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        Self::Ledger(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound(message) => (StatusCode::NOT_FOUND, message),
            Self::Ledger(err @ LedgerError::Validation(_)) => (StatusCode::BAD_REQUEST, err.to_string()),
            Self::Ledger(err) => {
                error!("Request failed: {}", err);
                let status = if err.is_retryable() {
                    StatusCode::SERVICE_UNAVAILABLE
                } else {
                    StatusCode::INTERNAL_SERVER_ERROR
                };
                (status, err.to_string())
            }
        };

        (status, Json(json!({ "status": "error", "message": message }))).into_response()
    }
}

fn success(data: impl serde::Serialize) -> Json<serde_json::Value> {
    Json(json!({ "status": "success", "data": data }))
}

#[derive(Debug, Default, Deserialize)]
pub struct LogListParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    #[serde(rename = "type")]
    pub log_type: Option<LogType>,
    pub severity: Option<Severity>,
    #[serde(rename = "startDate", alias = "start_date")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(rename = "endDate", alias = "end_date")]
    pub end_date: Option<DateTime<Utc>>,
}

impl LogListParams {
    pub fn to_query(&self) -> LogQuery {
        let defaults = LogQuery::default();
        LogQuery {
            log_type: self.log_type,
            severity: self.severity,
            range: TimeRange {
                from: self.start_date,
                to: self.end_date,
            },
            anomalies_only: false,
            page: self.page.unwrap_or(defaults.page),
            limit: self.limit.unwrap_or(defaults.limit),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "service": "log-ledger",
        "timestamp": Utc::now()
    }))
}

async fn create_log(
    State(state): State<AppState>,
    Json(new): Json<NewLogRecord>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let record = state.ingestor.submit_log(new).await?;
    Ok((StatusCode::CREATED, success(record)))
}

async fn list_logs(
    State(state): State<AppState>,
    Query(params): Query<LogListParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let page = state.records.query(&params.to_query()).await?;
    Ok(success(page))
}

async fn list_anomalies(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let defaults = LogQuery::default();
    let page = state
        .records
        .anomalies(params.page.unwrap_or(defaults.page), params.limit.unwrap_or(defaults.limit))
        .await?;
    Ok(success(page))
}

async fn get_log(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    match state.records.get(&id).await? {
        Some(record) => Ok(success(record)),
        None => Err(ApiError::NotFound(format!("Log {} not found", id))),
    }
}

async fn verify_log(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let verified = state.verifier.verify_log_integrity(&id).await?;
    Ok(success(json!({ "id": id, "verified": verified })))
}

async fn ledger_status(State(state): State<AppState>) -> Json<serde_json::Value> {
    success(state.verifier.get_status().await)
}
