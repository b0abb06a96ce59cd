//! Admission gate: rate-limit first, then pick a backend round-robin.
//!
//! This is the in-process half of a forwarding load balancer. Each unit of
//! work asks the gate for a decision; the gate debits one token from the
//! shared bucket and, only if that succeeds, hands out the next backend in
//! rotation. A rate-limited request never advances the rotation.
//!
//! Transport (actually forwarding bytes to the backend) is the caller's job.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::clock::{Clock, MonotonicClock};
use crate::error::GateError;
use crate::token_bucket::TokenBucket;

// =============================================================================
// RoundRobin
// =============================================================================

/// Lock-free rotation over a fixed, non-empty list.
#[derive(Debug)]
pub struct RoundRobin<T> {
    items: Vec<T>,
    cursor: AtomicUsize,
}

impl<T> RoundRobin<T> {
    pub fn new(items: Vec<T>) -> Result<Self, GateError> {
        if items.is_empty() {
            return Err(GateError::NoBackends);
        }
        Ok(Self {
            items,
            cursor: AtomicUsize::new(0),
        })
    }

    /// The next item in rotation.
    pub fn next_item(&self) -> &T {
        let idx = self.cursor.fetch_add(1, Ordering::Relaxed) % self.items.len();
        &self.items[idx]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn items(&self) -> &[T] {
        &self.items
    }
}

// =============================================================================
// AdmissionGate
// =============================================================================

/// Decision for a single unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission<'a, T> {
    /// Admitted; forward to this backend.
    Forward(&'a T),
    /// Denied by the bucket; reject without forwarding.
    RateLimited,
}

impl<T> Admission<'_, T> {
    /// Whether the request was admitted.
    #[must_use]
    pub fn is_forward(&self) -> bool {
        matches!(self, Admission::Forward(_))
    }
}

/// Token-bucket guarded round-robin dispatcher.
#[derive(Debug)]
pub struct AdmissionGate<T, C = MonotonicClock> {
    bucket: Arc<TokenBucket<C>>,
    backends: RoundRobin<T>,
    forwarded: AtomicU64,
    rate_limited: AtomicU64,
}

impl<T, C: Clock> AdmissionGate<T, C> {
    /// Create a gate over `backends`, sharing `bucket` with any other holder.
    pub fn new(bucket: Arc<TokenBucket<C>>, backends: Vec<T>) -> Result<Self, GateError> {
        Ok(Self {
            bucket,
            backends: RoundRobin::new(backends)?,
            forwarded: AtomicU64::new(0),
            rate_limited: AtomicU64::new(0),
        })
    }

    /// Decide one unit of work. Costs one token when admitted.
    pub fn admit(&self) -> Admission<'_, T> {
        if self.bucket.try_acquire_one() {
            self.forwarded.fetch_add(1, Ordering::Relaxed);
            Admission::Forward(self.backends.next_item())
        } else {
            self.rate_limited.fetch_add(1, Ordering::Relaxed);
            debug!("admission gate rejected request: rate limited");
            Admission::RateLimited
        }
    }

    pub fn bucket(&self) -> &Arc<TokenBucket<C>> {
        &self.bucket
    }

    pub fn backends(&self) -> &[T] {
        self.backends.items()
    }

    /// Snapshot of decision counters.
    pub fn stats(&self) -> GateStats {
        GateStats {
            forwarded: self.forwarded.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
        }
    }
}

/// Decision counters for an [`AdmissionGate`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateStats {
    pub forwarded: u64,
    pub rate_limited: u64,
}

/// Backend list for the gate, as read from the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateConfig {
    /// Backend addresses, e.g. `"127.0.0.1:8001"`.
    #[serde(default)]
    pub backends: Vec<String>,
}
