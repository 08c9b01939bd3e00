//! Concurrency controls: per-(resource, filename) mutual exclusion and
//! operation deadlines.

use crate::error::{Result, ShardPipeError};
use parking_lot::lock_api::ArcMutexGuard;
use parking_lot::{Mutex, RawMutex};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A caller-supplied bound on one pipeline operation.
///
/// Storage and search port calls are the only blocking points, so the
/// deadline is checked immediately before each of them; an expired deadline
/// yields `Timeout`. An in-flight call may overshoot by at most its own
/// duration.
#[derive(Debug, Clone, Copy, Default)]
pub struct Deadline(Option<Instant>);

impl Deadline {
    /// No bound.
    pub fn none() -> Self {
        Deadline(None)
    }

    /// Expires `timeout` from now.
    pub fn within(timeout: Duration) -> Self {
        Deadline(Some(Instant::now() + timeout))
    }

    pub fn at(instant: Instant) -> Self {
        Deadline(Some(instant))
    }

    pub fn is_unbounded(&self) -> bool {
        self.0.is_none()
    }

    pub fn expired(&self) -> bool {
        matches!(self.0, Some(at) if Instant::now() >= at)
    }

    /// Fail with `Timeout` if the deadline has passed.
    pub fn check(&self, operation: &str) -> Result<()> {
        if self.expired() {
            return Err(ShardPipeError::Timeout {
                operation: operation.to_string(),
            });
        }
        Ok(())
    }
}

/// Guard held for the duration of one partition write or index build.
pub type PairGuard = ArcMutexGuard<RawMutex, ()>;

/// In-process mutual exclusion keyed by (resource, filename).
///
/// Closes the marker-check-then-act race between concurrent index builds of
/// the same pair, and serializes partition writes that target the same shard
/// file. Sufficient for a single-instance deployment; multi-instance
/// coordination is out of scope.
#[derive(Default)]
pub struct LockRegistry {
    locks: Mutex<HashMap<(String, String), Arc<Mutex<()>>>>,
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the guard for `(resource, filename)`, waiting at most `wait`.
    pub fn acquire(&self, resource: &str, filename: &str, wait: Duration) -> Result<PairGuard> {
        let lock = {
            let mut locks = self.locks.lock();
            // Entries whose guards were all released are dead weight; sweep
            // them before adding more so the map tracks live pairs only.
            locks.retain(|_, l| Arc::strong_count(l) > 1);
            locks
                .entry((resource.to_string(), filename.to_string()))
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };

        lock.try_lock_arc_for(wait)
            .ok_or_else(|| ShardPipeError::LockContention {
                resource: resource.to_string(),
                filename: filename.to_string(),
            })
    }
}
