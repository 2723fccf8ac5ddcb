//! HTTP Boundary
//!
//! Thin axum wrapper over the ledger facade. Handlers validate nothing
//! themselves; they forward to `AuditLedger` and map its errors to
//! status codes.

use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::error::LedgerError;
use crate::ledger::event::RawEvent;
use crate::ledger::AuditLedger;

pub fn build_router(ledger: Arc<AuditLedger>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/events", post(submit_event))
        .route("/verify", get(verify))
        .route("/stats", get(get_stats))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).into_inner())
        .with_state(ledger)
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "audit-ledger",
        "timestamp": chrono::Utc::now()
    }))
}

async fn submit_event(
    State(ledger): State<Arc<AuditLedger>>,
    Json(raw): Json<RawEvent>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    let event_id = ledger.submit_event(raw).await.map_err(into_response)?;
    Ok(Json(serde_json::json!({ "event_id": event_id })))
}

async fn verify(
    State(ledger): State<Arc<AuditLedger>>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    let result = ledger.verify().await.map_err(into_response)?;
    let body = serde_json::to_value(result)
        .map_err(|e| into_response(LedgerError::from(e)))?;
    Ok(Json(body))
}

async fn get_stats(
    State(ledger): State<Arc<AuditLedger>>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    let stats = ledger.get_stats().await.map_err(into_response)?;
    let body = serde_json::to_value(stats)
        .map_err(|e| into_response(LedgerError::from(e)))?;
    Ok(Json(body))
}

fn into_response(err: LedgerError) -> (StatusCode, Json<serde_json::Value>) {
    let status = match &err {
        LedgerError::Validation { .. } => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(serde_json::json!({ "error": err.to_string() })))
}
