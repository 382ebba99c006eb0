pub mod postgres;
pub mod sheets;
pub mod sink;

// Re-export common types
pub use postgres::PostgresStore;
pub use sheets::SheetsClient;
pub use sink::{ListingSink, MetricsSink};
