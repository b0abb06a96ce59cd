//! Token bucket admission control.
//!
//! The token bucket allows bursts of work up to the bucket capacity while
//! enforcing an average rate over time. Tokens are credited as time passes
//! and debited by each admitted unit of work.
//!
//! # Algorithm
//!
//! - Bucket holds up to `capacity` tokens and starts full.
//! - `refill_rate` tokens accrue per `refill_interval` seconds.
//! - Each request costs a (real, non-negative) number of tokens.
//! - If the bucket holds fewer tokens than requested, the request is denied
//!   immediately. Nothing ever blocks.
//!
//! # Quantized refill
//!
//! Refill is lazy: every operation first measures the time elapsed since the
//! last credited instant. Credit is granted only once at least one whole
//! `refill_interval` has elapsed, and is then proportional to the full
//! (fractional) number of intervals:
//!
//! ```text
//! intervals = (now - last_refill) / refill_interval
//! if intervals >= 1.0:
//!     tokens      = min(capacity, tokens + intervals * refill_rate)
//!     last_refill = now
//! ```
//!
//! Below one interval nothing is credited and `last_refill` stays put, so
//! sub-interval time keeps accumulating against the same baseline and is
//! never lost. The price is burst timing precision: a drained bucket admits
//! nothing until a full interval has passed, even though a continuous
//! refill would already have produced part of a token.
//!
//! # Concurrency
//!
//! All mutable state sits behind one mutex. Refill, the availability test
//! and the debit run inside the same critical section, so concurrent
//! callers can never both pass the check against a stale token count.

use std::fmt;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::clock::{Clock, MonotonicClock};
use crate::error::BucketError;

/// Refill interval used when none is given.
pub const DEFAULT_REFILL_INTERVAL_SECS: f64 = 1.0;

// =============================================================================
// TokenBucket
// =============================================================================

/// Mutable part of a bucket; only touched with the lock held.
#[derive(Debug, Clone)]
struct BucketState {
    tokens: f64,
    /// Clock reading up to which elapsed time has been credited.
    last_refill: Duration,
    total_consumed: f64,
    total_denied: u64,
}

/// A thread-safe token bucket.
///
/// Share one instance between request handlers with `Arc<TokenBucket>`.
///
/// # Example
///
/// ```ignore
/// let bucket = TokenBucket::with_interval(10.0, 2.0, 1.0)?; // 2 tokens per second
/// assert!(bucket.consume(1.0)?);
/// ```
#[derive(Debug)]
pub struct TokenBucket<C = MonotonicClock> {
    capacity: f64,
    refill_rate: f64,
    refill_interval: f64,
    clock: C,
    state: Mutex<BucketState>,
}

impl TokenBucket<MonotonicClock> {
    /// Create a bucket refilling `refill_rate` tokens per second.
    pub fn new(capacity: f64, refill_rate: f64) -> Result<Self, BucketError> {
        Self::with_interval(capacity, refill_rate, DEFAULT_REFILL_INTERVAL_SECS)
    }

    /// Create a bucket refilling `refill_rate` tokens every `refill_interval`
    /// seconds.
    pub fn with_interval(
        capacity: f64,
        refill_rate: f64,
        refill_interval: f64,
    ) -> Result<Self, BucketError> {
        Self::with_clock(capacity, refill_rate, refill_interval, MonotonicClock::new())
    }
}

impl<C: Clock> TokenBucket<C> {
    /// Create a bucket reading time from `clock`.
    ///
    /// Starts full, stamped with the clock's current reading. Each parameter
    /// must be finite and greater than zero.
    pub fn with_clock(
        capacity: f64,
        refill_rate: f64,
        refill_interval: f64,
        clock: C,
    ) -> Result<Self, BucketError> {
        validate_parameter("capacity", capacity)?;
        validate_parameter("refill_rate", refill_rate)?;
        validate_parameter("refill_interval", refill_interval)?;

        let last_refill = clock.now();
        Ok(Self {
            capacity,
            refill_rate,
            refill_interval,
            clock,
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill,
                total_consumed: 0.0,
                total_denied: 0,
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, BucketState> {
        // Every critical section leaves the state consistent between
        // statements, so a poisoned lock is still safe to reuse.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Credit elapsed whole-or-more intervals. Caller holds the lock.
    fn refill(&self, state: &mut BucketState, now: Duration) {
        let elapsed = now.saturating_sub(state.last_refill).as_secs_f64();
        let intervals = elapsed / self.refill_interval;
        if intervals >= 1.0 {
            let before = state.tokens;
            state.tokens = (state.tokens + intervals * self.refill_rate).min(self.capacity);
            state.last_refill = now;
            trace!(
                intervals,
                before,
                after = state.tokens,
                "token bucket refilled"
            );
        }
    }

    /// Try to take `requested` tokens.
    ///
    /// Returns `Ok(true)` and debits the bucket if enough tokens are
    /// available, `Ok(false)` (bucket untouched) otherwise. A request for
    /// zero tokens is always allowed and touches nothing. Negative or NaN
    /// requests fail with [`BucketError::InvalidArgument`].
    pub fn consume(&self, requested: f64) -> Result<bool, BucketError> {
        validate_request(requested)?;
        if requested == 0.0 {
            return Ok(true);
        }

        let mut state = self.lock();
        let now = self.clock.now();
        self.refill(&mut state, now);

        if state.tokens >= requested {
            state.tokens -= requested;
            state.total_consumed += requested;
            Ok(true)
        } else {
            state.total_denied += 1;
            debug!(
                requested,
                available = state.tokens,
                capacity = self.capacity,
                "token bucket denied request"
            );
            Ok(false)
        }
    }

    /// Try to take a single token.
    pub fn try_acquire_one(&self) -> bool {
        matches!(self.consume(1.0), Ok(true))
    }

    /// Tokens currently available.
    ///
    /// Not a pure read: refill is applied first, so polling this keeps the
    /// bucket's accounting current.
    pub fn get_available_tokens(&self) -> f64 {
        let mut state = self.lock();
        let now = self.clock.now();
        self.refill(&mut state, now);
        state.tokens
    }

    /// How long until `consume(requested)` could succeed, assuming no other
    /// consumers in the meantime.
    ///
    /// Accounts for quantized refill: at least one whole interval must pass
    /// from the current baseline before any credit arrives. Returns
    /// [`Duration::ZERO`] when the tokens are available now and
    /// [`Duration::MAX`] when `requested` exceeds the capacity.
    pub fn wait_time(&self, requested: f64) -> Result<Duration, BucketError> {
        validate_request(requested)?;
        if requested > self.capacity {
            return Ok(Duration::MAX);
        }

        let mut state = self.lock();
        let now = self.clock.now();
        self.refill(&mut state, now);

        let deficit = requested - state.tokens;
        if deficit <= 0.0 {
            return Ok(Duration::ZERO);
        }

        let intervals_needed = (deficit / self.refill_rate).max(1.0);
        let since_baseline = now.saturating_sub(state.last_refill).as_secs_f64();
        let secs = (intervals_needed * self.refill_interval - since_baseline).max(0.0);
        Ok(Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX))
    }

    /// Refill the bucket to capacity and restart the refill baseline.
    ///
    /// Configuration and lifetime counters are left alone.
    pub fn reset(&self) {
        let mut state = self.lock();
        let now = self.clock.now();
        state.tokens = self.capacity;
        state.last_refill = state.last_refill.max(now);
        debug!(capacity = self.capacity, "token bucket reset");
    }

    /// Maximum capacity.
    #[must_use]
    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    /// Tokens credited per refill interval.
    #[must_use]
    pub fn refill_rate(&self) -> f64 {
        self.refill_rate
    }

    /// Refill interval in seconds.
    #[must_use]
    pub fn refill_interval(&self) -> f64 {
        self.refill_interval
    }

    /// The bucket's time source.
    #[must_use]
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Total tokens debited since creation.
    #[must_use]
    pub fn total_consumed(&self) -> f64 {
        self.lock().total_consumed
    }

    /// Total non-zero requests denied since creation.
    #[must_use]
    pub fn total_denied(&self) -> u64 {
        self.lock().total_denied
    }

    /// Snapshot of configuration, level and counters (refill applied first).
    pub fn stats(&self) -> BucketStats {
        let mut state = self.lock();
        let now = self.clock.now();
        self.refill(&mut state, now);
        BucketStats {
            capacity: self.capacity,
            refill_rate: self.refill_rate,
            refill_interval_secs: self.refill_interval,
            current_tokens: state.tokens,
            total_consumed: state.total_consumed,
            total_denied: state.total_denied,
            fill_ratio: state.tokens / self.capacity,
        }
    }
}

impl<C> fmt::Display for TokenBucket<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tokens = self
            .state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .tokens;
        write!(
            f,
            "TokenBucket(capacity={}, refill_rate={}, refill_interval={}, tokens={tokens:.2})",
            self.capacity, self.refill_rate, self.refill_interval
        )
    }
}

fn validate_parameter(name: &'static str, value: f64) -> Result<(), BucketError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(BucketError::InvalidParameter { name, value })
    }
}

fn validate_request(requested: f64) -> Result<(), BucketError> {
    if requested.is_nan() || requested < 0.0 {
        Err(BucketError::InvalidArgument {
            name: "requested",
            value: requested,
        })
    } else {
        Ok(())
    }
}

// =============================================================================
// BucketStats (serializable)
// =============================================================================

/// Serializable statistics about a token bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketStats {
    /// Maximum capacity.
    pub capacity: f64,
    /// Tokens per refill interval.
    pub refill_rate: f64,
    /// Refill interval in seconds.
    pub refill_interval_secs: f64,
    /// Current available tokens.
    pub current_tokens: f64,
    /// Total tokens consumed.
    pub total_consumed: f64,
    /// Total requests denied.
    pub total_denied: u64,
    /// Fill ratio (current / capacity).
    pub fill_ratio: f64,
}

// =============================================================================
// BucketConfig (serializable configuration)
// =============================================================================

/// Serializable parameters for creating a token bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketConfig {
    /// Maximum tokens.
    pub capacity: f64,
    /// Tokens per refill interval.
    pub refill_rate: f64,
    /// Refill interval in seconds.
    #[serde(default = "default_refill_interval_secs")]
    pub refill_interval_secs: f64,
}

fn default_refill_interval_secs() -> f64 {
    DEFAULT_REFILL_INTERVAL_SECS
}

impl Default for BucketConfig {
    fn default() -> Self {
        Self {
            capacity: 10.0,
            refill_rate: 2.0,
            refill_interval_secs: DEFAULT_REFILL_INTERVAL_SECS,
        }
    }
}

impl BucketConfig {
    /// Check the parameters without building a bucket.
    pub fn validate(&self) -> Result<(), BucketError> {
        validate_parameter("capacity", self.capacity)?;
        validate_parameter("refill_rate", self.refill_rate)?;
        validate_parameter("refill_interval", self.refill_interval_secs)
    }

    /// Build a bucket on the monotonic clock.
    pub fn build(&self) -> Result<TokenBucket, BucketError> {
        TokenBucket::with_interval(self.capacity, self.refill_rate, self.refill_interval_secs)
    }

    /// Build a bucket on a caller-supplied clock.
    pub fn build_with_clock<C: Clock>(&self, clock: C) -> Result<TokenBucket<C>, BucketError> {
        TokenBucket::with_clock(
            self.capacity,
            self.refill_rate,
            self.refill_interval_secs,
            clock,
        )
    }
}

// =============================================================================
// Tests
// =============================================================================
