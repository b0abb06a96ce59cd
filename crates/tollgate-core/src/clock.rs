//! Monotonic time sources for token accounting.
//!
//! Buckets never read wall-clock time. Every clock reports the time elapsed
//! since its own origin as a [`Duration`], and that value must never move
//! backward. System clock adjustments therefore cannot make token counts
//! jump or freeze.
//!
//! - [`MonotonicClock`]: production clock backed by [`Instant`].
//! - [`ManualClock`]: deterministic clock advanced explicitly by tests and
//!   simulations.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// A non-decreasing time source.
pub trait Clock: Send + Sync {
    /// Time elapsed since this clock's origin.
    fn now(&self) -> Duration;
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> Duration {
        (**self).now()
    }
}

// =============================================================================
// MonotonicClock
// =============================================================================

/// Clock backed by the operating system's monotonic timer.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

// =============================================================================
// ManualClock
// =============================================================================

/// A clock that only moves when told to.
///
/// Stores nanoseconds in an atomic so a single instance can be shared
/// (via `Arc`) between a bucket and the code driving it.
///
/// ```ignore
/// let clock = Arc::new(ManualClock::new());
/// let bucket = TokenBucket::with_clock(10.0, 2.0, 1.0, Arc::clone(&clock))?;
/// clock.advance_secs(1.1);
/// ```
#[derive(Debug, Default)]
pub struct ManualClock {
    nanos: AtomicU64,
}

impl ManualClock {
    /// Create a clock reading zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a clock starting at `start`.
    #[must_use]
    pub fn starting_at(start: Duration) -> Self {
        Self {
            nanos: AtomicU64::new(duration_to_nanos(start)),
        }
    }

    /// Move time forward by `delta`.
    pub fn advance(&self, delta: Duration) {
        let delta = duration_to_nanos(delta);
        let mut current = self.nanos.load(Ordering::SeqCst);
        loop {
            match self.nanos.compare_exchange_weak(
                current,
                current.saturating_add(delta),
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => break,
                Err(v) => current = v,
            }
        }
    }

    /// Move time forward by a (non-negative, finite) number of seconds.
    ///
    /// Negative or non-finite inputs are ignored.
    pub fn advance_secs(&self, secs: f64) {
        if secs.is_finite() && secs > 0.0 {
            self.advance(Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX));
        }
    }

    /// Set the clock to `to`, unless that would move it backward.
    pub fn set(&self, to: Duration) {
        self.nanos.fetch_max(duration_to_nanos(to), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
    }
}

fn duration_to_nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}
