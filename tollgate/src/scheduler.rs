use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::Shared;

/// Drives time for the bucket table: keeps exactly one timer outstanding
/// regardless of how many buckets exist, always armed for the earliest
/// pending refill and re-armed after each firing.
///
/// One spawned task per started throttler. A fresh [`CancellationToken`]
/// per start means a stale task from a previous run can never act on a new
/// run's buckets.
pub(crate) struct RefillScheduler {
    cancel: CancellationToken,
}

impl RefillScheduler {
    /// Spawn the refill task. Must be called within a tokio runtime.
    pub(crate) fn spawn(shared: Arc<Shared>) -> Self {
        let cancel = CancellationToken::new();
        tokio::spawn(run(shared, cancel.clone()));
        Self { cancel }
    }

    /// Cancel the refill task. A firing already in progress re-checks the
    /// token under the lock and exits without re-arming.
    pub(crate) fn stop(&self) {
        self.cancel.cancel();
    }
}

async fn run(shared: Arc<Shared>, cancel: CancellationToken) {
    loop {
        // Arm for the single earliest pending refill across all buckets.
        let deadline = {
            let inner = shared.inner.lock().unwrap();
            if !inner.started || cancel.is_cancelled() {
                return;
            }
            inner.table.earliest_refill_at()
        };
        let Some(deadline) = deadline else { return };

        tokio::select! {
            _ = cancel.cancelled() => return,
            // A deadline already in the past fires immediately.
            _ = tokio::time::sleep_until(deadline) => {}
        }

        let mut inner = shared.inner.lock().unwrap();
        if !inner.started || cancel.is_cancelled() {
            return;
        }
        let now = Instant::now();
        // A panic in the refill pass must not break the timer chain: catch
        // it at the firing boundary, log it, and re-arm on the next loop.
        match catch_unwind(AssertUnwindSafe(|| inner.table.refill_due(now))) {
            Ok(refilled) => {
                tracing::debug!(refilled, "refill pass completed");
            }
            Err(panic) => {
                let msg = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                tracing::error!(error = %msg, "refill pass failed");
            }
        }
    }
}
