pub mod api;
pub mod client;
pub mod intake;
pub mod record;

// Re-export common types
pub use api::{ApiReply, MetricsApi, MozClient};
pub use client::{BatchMetricsClient, EnrichError, EnrichReport};
pub use intake::{read_targets, read_targets_from_path, IntakeError};
pub use record::MetricsRecord;
