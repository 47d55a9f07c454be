//! Per-key token-bucket rate limiting with a single refill timer.
//!
//! Each configured id gets an independent bucket holding a token budget.
//! Every admission check spends one token; a bucket in debt rejects until
//! its next refill resets the count to capacity. Refills happen at fixed
//! interval boundaries, driven by one timer armed for the earliest pending
//! deadline across all buckets — never one timer per id.
//!
//! ```no_run
//! use tollgate::{LimitDefinition, Throttler};
//!
//! # async fn demo() -> Result<(), tollgate::ThrottleError> {
//! let throttler = Throttler::new();
//! throttler.load_config(vec![LimitDefinition {
//!     id: "search".to_string(),
//!     interval_seconds: 5,
//!     tokens_per_interval: 10,
//! }])?;
//! throttler.start()?;
//!
//! if throttler.allow("search") {
//!     // handle the request
//! }
//!
//! throttler.stop();
//! # Ok(())
//! # }
//! ```
//!
//! `load_config` may be called again, e.g. when a configuration change is
//! detected; it stops the throttler first, and `start` must be called again
//! afterwards or every id is rejected. Until `start`, and after `stop`, all
//! checks fail closed.

mod bucket;
mod definition;
mod error;
mod scheduler;

pub use bucket::BucketTable;
pub use definition::LimitDefinition;
pub use error::ThrottleError;

use std::sync::{Arc, Mutex};

use tokio::time::Instant;

use scheduler::RefillScheduler;

pub(crate) struct Shared {
    pub(crate) inner: Mutex<Inner>,
}

pub(crate) struct Inner {
    pub(crate) table: BucketTable,
    pub(crate) started: bool,
    scheduler: Option<RefillScheduler>,
}

/// Thread-safe throttler: a [`BucketTable`] plus its refill scheduler
/// behind one shared lock.
///
/// Cloning yields another handle to the same throttler. Admission checks
/// are synchronous and never error; lifecycle operations surface
/// [`ThrottleError`] to the caller.
#[derive(Clone)]
pub struct Throttler {
    shared: Arc<Shared>,
}

impl Throttler {
    /// Create a stopped throttler with no configuration.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    table: BucketTable::new(),
                    started: false,
                    scheduler: None,
                }),
            }),
        }
    }

    /// Replace the configuration wholesale.
    ///
    /// Stops the throttler first if running — a reload must not leave a
    /// stale timer armed against the old bucket set. The throttler stays
    /// stopped afterwards; call [`start`](Self::start) again explicitly.
    pub fn load_config(&self, definitions: Vec<LimitDefinition>) -> Result<(), ThrottleError> {
        let mut inner = self.shared.inner.lock().unwrap();
        stop_locked(&mut inner);
        inner.table.load(definitions)?;
        tracing::info!(limits = inner.table.len(), "configuration loaded");
        Ok(())
    }

    /// Fill every bucket, pin all refill phases to this instant, and spawn
    /// the refill scheduler.
    ///
    /// Errors if no configuration is loaded or the throttler is already
    /// started. Must be called within a tokio runtime.
    pub fn start(&self) -> Result<(), ThrottleError> {
        let mut inner = self.shared.inner.lock().unwrap();
        if inner.started {
            return Err(ThrottleError::AlreadyStarted);
        }
        inner.table.start_at(Instant::now())?;
        inner.started = true;
        inner.scheduler = Some(RefillScheduler::spawn(self.shared.clone()));
        tracing::info!(limits = inner.table.len(), "throttler started");
        Ok(())
    }

    /// Stop the throttler and cancel the refill scheduler. Idempotent.
    ///
    /// Bucket contents are kept; a subsequent [`start`](Self::start)
    /// re-initializes them.
    pub fn stop(&self) {
        let mut inner = self.shared.inner.lock().unwrap();
        stop_locked(&mut inner);
    }

    /// Spend one token for `id` and report whether the request is allowed.
    ///
    /// Returns `false` while the throttler is stopped (fail closed) and for
    /// ids with no configured limit. Never errors, never suspends.
    pub fn allow(&self, id: &str) -> bool {
        let mut inner = self.shared.inner.lock().unwrap();
        if !inner.started {
            tracing::debug!(id, "throttler not started, rejecting");
            return false;
        }
        inner.table.consume(id)
    }
}

impl Default for Throttler {
    fn default() -> Self {
        Self::new()
    }
}

fn stop_locked(inner: &mut Inner) {
    if !inner.started {
        return;
    }
    inner.started = false;
    if let Some(scheduler) = inner.scheduler.take() {
        scheduler.stop();
    }
    tracing::info!("throttler stopped");
}
