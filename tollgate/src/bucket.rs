use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::time::Duration;

use tokio::time::Instant;

use crate::definition::LimitDefinition;
use crate::error::ThrottleError;

/// Per-identifier bucket state: remaining tokens and the next refill instant.
#[derive(Debug)]
struct Bucket {
    interval: Duration,
    capacity: i64,
    tokens: i64,
    next_refill_at: Instant,
}

impl Bucket {
    /// Reset the token count to capacity and advance the deadline by one
    /// interval.
    fn refill(&mut self) {
        self.tokens = self.capacity;
        self.next_refill_at += self.interval;
    }

    /// Decrement the token count and report whether the request fit the
    /// budget. The decrement is unconditional: an id hammered past its
    /// budget keeps falling into debt until the next refill resets it.
    fn consume(&mut self) -> bool {
        self.tokens = self.tokens.saturating_sub(1);
        self.tokens >= 0
    }
}

/// The per-identifier bucket collection, plus an ordering over buckets by
/// next refill deadline used for scheduling.
///
/// Both views are kept consistent on every mutation: [`start_at`] rebuilds
/// the deadline heap, [`refill_due`] pushes each refilled bucket's new
/// deadline back, and [`load`] clears both wholesale.
///
/// `BucketTable` is a plain data structure with no interior locking;
/// [`Throttler`](crate::Throttler) wraps it in the shared lock that also
/// covers the refill scheduler.
///
/// [`start_at`]: BucketTable::start_at
/// [`refill_due`]: BucketTable::refill_due
/// [`load`]: BucketTable::load
pub struct BucketTable {
    buckets: HashMap<String, Bucket>,
    by_deadline: BinaryHeap<Reverse<(Instant, String)>>,
}

impl BucketTable {
    /// Create an empty table. `load` it before `start_at`.
    pub fn new() -> Self {
        Self {
            buckets: HashMap::new(),
            by_deadline: BinaryHeap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// Replace the mapping entirely with one bucket per definition.
    ///
    /// Duplicate ids resolve last-write-wins, in input order. A definition
    /// with a zero interval fails the load and leaves the table empty, which
    /// a subsequent `start_at` rejects. Token counts and deadlines are
    /// placeholders until `start_at` assigns meaningful values.
    pub fn load(&mut self, definitions: Vec<LimitDefinition>) -> Result<(), ThrottleError> {
        self.buckets.clear();
        self.by_deadline.clear();
        let placeholder = Instant::now();
        for def in definitions {
            if def.interval_seconds == 0 {
                self.buckets.clear();
                return Err(ThrottleError::InvalidDefinition {
                    id: def.id,
                    reason: "intervalSeconds must be positive",
                });
            }
            self.buckets.insert(
                def.id,
                Bucket {
                    interval: Duration::from_secs(def.interval_seconds),
                    capacity: def.tokens_per_interval.min(i64::MAX as u64) as i64,
                    tokens: 0,
                    next_refill_at: placeholder,
                },
            );
        }
        Ok(())
    }

    /// Pin every bucket's refill phase to `now`: full tokens, next refill
    /// one interval out. Rebuilds the deadline heap.
    ///
    /// Two buckets with equal intervals started at the same `now` refill in
    /// lockstep from then on.
    pub fn start_at(&mut self, now: Instant) -> Result<(), ThrottleError> {
        if self.buckets.is_empty() {
            return Err(ThrottleError::NoConfiguration);
        }
        self.by_deadline.clear();
        for (id, bucket) in &mut self.buckets {
            bucket.next_refill_at = now;
            bucket.refill();
            self.by_deadline.push(Reverse((bucket.next_refill_at, id.clone())));
        }
        Ok(())
    }

    /// Spend one token for `id`. Returns `false` for unknown ids.
    pub fn consume(&mut self, id: &str) -> bool {
        match self.buckets.get_mut(id) {
            Some(bucket) => bucket.consume(),
            None => {
                tracing::warn!(id, "no limit configured for id, rejecting");
                false
            }
        }
    }

    /// Refill every bucket whose deadline has passed, in deadline order.
    /// Returns the number of buckets refilled.
    ///
    /// Stops scanning at the first bucket with a future deadline; the heap
    /// ordering guarantees nothing later is due.
    pub fn refill_due(&mut self, now: Instant) -> usize {
        let mut refilled = 0;
        loop {
            match self.by_deadline.peek() {
                Some(Reverse((deadline, _))) if *deadline <= now => {}
                _ => break,
            }
            let Some(Reverse((_, id))) = self.by_deadline.pop() else {
                break;
            };
            if let Some(bucket) = self.buckets.get_mut(&id) {
                // After a pause longer than one interval, keep advancing
                // until the deadline lands in the future again.
                while bucket.next_refill_at <= now {
                    bucket.refill();
                }
                self.by_deadline.push(Reverse((bucket.next_refill_at, id)));
                refilled += 1;
            }
        }
        refilled
    }

    /// The minimum next-refill instant across all buckets, or `None` if the
    /// table is empty. This is the single instant the scheduler arms for.
    pub fn earliest_refill_at(&self) -> Option<Instant> {
        self.by_deadline
            .peek()
            .map(|Reverse((deadline, _))| *deadline)
    }
}

impl Default for BucketTable {
    fn default() -> Self {
        Self::new()
    }
}
