use axum::{
    extract::{rejection::JsonRejection, Multipart, State},
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

use crate::crawler::ScrapeSummary;
use crate::enrichment::read_targets;
use crate::server::errors::ApiError;
use crate::server::state::AppState;

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "up",
        "message": "Service is running"
    }))
}

pub async fn start_scrape(State(state): State<Arc<AppState>>) -> Json<ScrapeSummary> {
    Json(state.run_scrape().await)
}

/// Forward a target list to the metrics API in one request
pub async fn fetch_url_metrics(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let missing = || ApiError::bad_request("'targets' key is missing in the request");

    let Json(payload) = payload.map_err(|_| missing())?;
    let targets = payload.get("targets").ok_or_else(missing)?;
    let targets: Vec<String> = serde_json::from_value(targets.clone())
        .map_err(|_| ApiError::bad_request("'targets' must be a list of strings"))?;

    info!("Fetching metrics for {} targets", targets.len());
    let response = state.metrics.fetch_raw(&targets).await?;

    Ok(Json(response))
}

/// Read targets from an uploaded CSV/XLSX file and enrich them chunk by chunk
pub async fn fetch_url_metrics_file(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<Vec<Value>>, ApiError> {
    let mut upload = None;

    while let Some(field) = multipart.next_field().await
        .map_err(|e| ApiError::bad_request(format!("Malformed upload: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await
            .map_err(|e| ApiError::bad_request(format!("Malformed upload: {}", e)))?;
        upload = Some((file_name, bytes));
        break;
    }

    let (file_name, bytes) = upload.ok_or_else(|| ApiError::bad_request("No file uploaded"))?;
    let targets = read_targets(&file_name, &bytes).map_err(|e| {
        warn!("Rejected upload {}: {}", file_name, e);
        ApiError::from(e)
    })?;

    info!("Enriching {} targets from {}", targets.len(), file_name);
    let report = state.metrics.enrich(&targets, state.chunk_size).await?;

    Ok(Json(report.responses))
}
