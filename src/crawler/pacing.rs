use async_trait::async_trait;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

/// Pause inserted between page loads and between metrics API calls
#[async_trait]
pub trait Pacer: Send + Sync {
    async fn pause(&self);
}

/// Static, non-adaptive delay
#[derive(Debug, Clone)]
pub struct FixedDelay {
    delay: Duration,
}

impl FixedDelay {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn from_secs(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs))
    }
}

#[async_trait]
impl Pacer for FixedDelay {
    async fn pause(&self) {
        if self.delay.is_zero() {
            return;
        }
        debug!("Pausing for {:?}", self.delay);
        sleep(self.delay).await;
    }
}

/// Pacer that only counts how often it was asked to wait
#[cfg(test)]
#[derive(Debug, Default)]
pub struct CountingPacer {
    pauses: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl CountingPacer {
    pub fn count(&self) -> usize {
        self.pauses.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
#[async_trait]
impl Pacer for CountingPacer {
    async fn pause(&self) {
        self.pauses.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }
}
