//! # rag-scheduler
//!
//! Admission control and retry for batches of independent async work
//! units. Built for callers of rate-limited remote services: external
//! APIs enforce both a concurrency ceiling and a requests-per-second
//! ceiling, and violating either gets calls rejected, so both are
//! enforced client-side before a unit ever starts.
//!
//! Two independent controls:
//! - [`RateLimits`] bounds how many units are in flight at once and how
//!   close together two units may start.
//! - [`RetryPolicy`] decides what happens when a unit fails: exponential
//!   backoff up to an attempt cap, after which the unit is reported as a
//!   terminal failure without aborting its siblings.
//!
//! The batch call resolves only once every unit is terminal; per-unit
//! results come back in submission order in a [`BatchReport`].

pub mod policy;
pub mod report;
pub mod scheduler;

pub use policy::{RateLimits, RetryPolicy};
pub use report::{BatchReport, UnitError, UnitOutcome};
pub use scheduler::{Scheduler, Unit};
