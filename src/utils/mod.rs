use std::time::{Duration, Instant};
use tracing::info;

/// Logs when a scheduled task starts and how long it took when dropped.
pub struct Timer {
    label: String,
    start: Instant,
}

impl Timer {
    pub fn start(label: impl Into<String>) -> Self {
        let label = label.into();
        info!("⏱  Starting: {}", label);
        Self {
            label,
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        info!(task = %self.label, elapsed = ?self.elapsed(), "⏱  Finished");
    }
}
