use media_sync_models::FacetKey;
use std::time::Instant;
use tracing::{info, warn};

/// Progress of the remote batches of one facet.
/// Logs periodic progress and a final summary instead of one line per batch.
pub struct BatchProgress {
    key: FacetKey,
    operation: &'static str,
    total: usize,
    done: usize,
    applied: usize,
    skipped: usize,
    failed: usize,
    start_time: Instant,
    progress_interval: usize,
}

impl BatchProgress {
    pub fn new(key: FacetKey, operation: &'static str, total: usize) -> Self {
        if total > 0 {
            info!(operation, facet = %key, batches = total, "Applying remote batches");
        }
        Self {
            key,
            operation,
            total,
            done: 0,
            applied: 0,
            skipped: 0,
            failed: 0,
            start_time: Instant::now(),
            progress_interval: 10,
        }
    }

    pub fn record_applied(&mut self, items: usize, skipped: usize) {
        self.applied += items;
        self.skipped += skipped;
        self.advance();
    }

    pub fn record_failed(&mut self, items: usize) {
        self.failed += items;
        self.advance();
    }

    fn advance(&mut self) {
        self.done += 1;
        if self.done % self.progress_interval == 0 && self.done < self.total {
            info!(
                "Progress {}: {}/{} batches | Applied: {} | Skipped: {} | Failed: {}",
                self.key, self.done, self.total, self.applied, self.skipped, self.failed
            );
        }
    }

    pub fn log_summary(&self) {
        if self.total == 0 {
            return;
        }
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if self.failed > 0 {
            warn!(
                "{} {} completed with failures: {}/{} batches in {:.1}s | Applied: {} | Skipped: {} | Failed: {}",
                self.operation, self.key, self.done, self.total, elapsed, self.applied, self.skipped, self.failed
            );
        } else {
            info!(
                "{} {} completed: {} batches in {:.1}s | Applied: {} | Skipped: {}",
                self.operation, self.key, self.done, elapsed, self.applied, self.skipped
            );
        }
    }
}
