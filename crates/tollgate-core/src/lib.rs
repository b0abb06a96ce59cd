//! tollgate-core: token bucket admission control
//!
//! Decides, for each arriving unit of work, whether it may proceed now or
//! must be rejected, based on a bounded budget that replenishes with time.
//!
//! # Architecture
//!
//! ```text
//! request ──► AdmissionGate ──► TokenBucket::consume(1) ──► Clock::now()
//!                  │                    │
//!                  │ admitted           └─ denied ──► RateLimited
//!                  ▼
//!            RoundRobin backend
//! ```
//!
//! # Modules
//!
//! - `token_bucket`: the thread-safe bucket, its stats and build config
//! - `clock`: monotonic and manual time sources
//! - `gate`: rate-limit-then-round-robin admission gate
//! - `config`: TOML configuration loading
//! - `logging`: `tracing` subscriber setup
//! - `error`: error types
//!
//! # Safety
//!
//! This crate forbids unsafe code.

#![forbid(unsafe_code)]

pub mod clock;
pub mod config;
pub mod error;
pub mod gate;
pub mod logging;
pub mod token_bucket;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use error::{BucketError, ConfigError, Error, GateError, Result};
pub use gate::{Admission, AdmissionGate, RoundRobin};
pub use token_bucket::{BucketConfig, BucketStats, DEFAULT_REFILL_INTERVAL_SECS, TokenBucket};
