pub mod controller;
pub mod pacing;
pub mod task;
pub mod walker;

#[cfg(test)]
pub mod testing;

// Re-export common types
pub use controller::ScrapeSession;
pub use pacing::{FixedDelay, Pacer};
pub use task::{DomainListing, PageBatch, ScrapeStatus, ScrapeSummary, Termination};
pub use walker::{PaginationWalker, Step, WalkError};
