use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::crawler::pacing::Pacer;
use crate::enrichment::api::{ApiReply, MetricsApi};
use crate::enrichment::record::parse_results;
use crate::storage::MetricsSink;

/// Why an enrichment run stopped early
#[derive(Debug, Error)]
pub enum EnrichError {
    #[error("chunk size must be at least 1")]
    InvalidChunkSize,

    #[error("Failed to fetch data. Status code: {status}")]
    Upstream { chunk: usize, status: u16, body: String },

    #[error("metrics request for chunk {chunk} failed: {reason}")]
    Transport { chunk: usize, reason: String },

    #[error("metrics response for chunk {chunk} was unreadable: {reason}")]
    MalformedResponse { chunk: usize, reason: String },

    #[error("failed to persist chunk {chunk}: {reason}")]
    Sink { chunk: usize, reason: String },
}

impl EnrichError {
    /// Text returned to callers next to the error line
    pub fn detail(&self) -> String {
        match self {
            EnrichError::Upstream { body, .. } => body.clone(),
            other => other.to_string(),
        }
    }
}

/// Result of a completed enrichment run
#[derive(Debug, Default)]
pub struct EnrichReport {
    /// Raw response payload of every chunk, in chunk order
    pub responses: Vec<serde_json::Value>,
    pub chunks: usize,
    pub records: usize,
}

/// Split `identifiers` into contiguous chunks of at most `chunk_size`
pub fn partition(identifiers: &[String], chunk_size: usize) -> Result<Vec<&[String]>, EnrichError> {
    if chunk_size == 0 {
        return Err(EnrichError::InvalidChunkSize);
    }
    Ok(identifiers.chunks(chunk_size).collect())
}

/// Sends identifiers to the metrics API chunk by chunk, persisting each chunk's
/// records before the next request goes out. The first failing chunk ends the run.
pub struct BatchMetricsClient {
    api: Arc<dyn MetricsApi>,
    sink: Arc<dyn MetricsSink>,
    pacer: Arc<dyn Pacer>,
}

impl BatchMetricsClient {
    pub fn new(api: Arc<dyn MetricsApi>, sink: Arc<dyn MetricsSink>, pacer: Arc<dyn Pacer>) -> Self {
        Self { api, sink, pacer }
    }

    /// One request with all `targets`, nothing persisted
    pub async fn fetch_raw(&self, targets: &[String]) -> Result<serde_json::Value, EnrichError> {
        let reply = self.request(0, targets).await?;
        serde_json::from_str(&reply.body)
            .map_err(|e| EnrichError::MalformedResponse { chunk: 0, reason: e.to_string() })
    }

    pub async fn enrich(&self, identifiers: &[String], chunk_size: usize) -> Result<EnrichReport, EnrichError> {
        let chunks = partition(identifiers, chunk_size)?;
        let total = chunks.len();
        let mut report = EnrichReport::default();

        for (index, chunk) in chunks.into_iter().enumerate() {
            info!("Requesting metrics for chunk {}/{} ({} targets)", index + 1, total, chunk.len());

            let reply = self.request(index, chunk).await?;
            let (payload, records) = parse_results(&reply.body)
                .map_err(|reason| EnrichError::MalformedResponse { chunk: index, reason })?;

            self.sink.append_metrics(&records).await
                .map_err(|e| EnrichError::Sink { chunk: index, reason: format!("{:#}", e) })?;

            report.records += records.len();
            report.chunks += 1;
            report.responses.push(payload);
            info!("Persisted {} records for chunk {}/{}", records.len(), index + 1, total);
        }

        Ok(report)
    }

    /// Issue one request, pause, then judge the reply
    async fn request(&self, chunk: usize, targets: &[String]) -> Result<ApiReply, EnrichError> {
        let reply = self.api.url_metrics(targets).await;
        self.pacer.pause().await;

        let reply = reply.map_err(|e| EnrichError::Transport { chunk, reason: format!("{:#}", e) })?;
        if !reply.is_ok() {
            warn!("Metrics API rejected chunk {} with status {}", chunk, reply.status);
            return Err(EnrichError::Upstream {
                chunk,
                status: reply.status,
                body: reply.body,
            });
        }

        Ok(reply)
    }
}
