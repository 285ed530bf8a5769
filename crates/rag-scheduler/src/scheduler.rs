//! The rate-limited, retrying batch scheduler.
//!
//! Admission is two gates in series: a semaphore bounding in-flight
//! units, and a shared start-slot clock enforcing minimum spacing
//! between unit starts. Both are claimed before the first attempt; a
//! unit keeps its permit across its own retries, so backoff waits count
//! against the concurrency bound.
//!
//! Cancellation stops new unit starts only. Units already past the
//! admission gates finish or fail naturally, so partial external side
//! effects are never abandoned silently.

use std::fmt::Display;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::{Mutex, Semaphore};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use rag_types::SchedulerSettings;

use crate::policy::{self, RateLimits, RetryPolicy};
use crate::report::{BatchReport, UnitError, UnitOutcome};

/// One independently-submittable unit of work. The work closure is
/// called once per attempt, so a retried unit re-runs it from scratch.
pub struct Unit<F> {
    label: String,
    work: F,
}

impl<F> Unit<F> {
    pub fn new(label: impl Into<String>, work: F) -> Self {
        Self {
            label: label.into(),
            work,
        }
    }
}

/// Executes batches of async units under admission limits and a
/// per-unit retry policy.
#[derive(Debug, Clone)]
pub struct Scheduler {
    limits: RateLimits,
    retry: RetryPolicy,
}

impl Scheduler {
    pub fn new(limits: RateLimits, retry: RetryPolicy) -> Self {
        Self { limits, retry }
    }

    pub fn from_settings(settings: &SchedulerSettings) -> Self {
        let (limits, retry) = policy::from_settings(settings);
        Self::new(limits, retry)
    }

    /// Run a batch to completion.
    ///
    /// Units start in submission order, subject to the limits; completion
    /// order is unconstrained. Resolves once every unit is terminal and
    /// returns one [`UnitOutcome`] per unit, in submission order. An
    /// empty batch resolves immediately.
    pub async fn run<F, Fut, T, E>(
        &self,
        units: Vec<Unit<F>>,
        cancel: CancellationToken,
    ) -> BatchReport<T, E>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Display + Send + 'static,
    {
        if units.is_empty() {
            return BatchReport {
                outcomes: Vec::new(),
            };
        }

        let total = units.len();
        let semaphore = Arc::new(Semaphore::new(self.limits.max_concurrent));
        let gate = Arc::new(Mutex::new(Instant::now()));

        let mut labels = Vec::with_capacity(total);
        let mut handles = Vec::with_capacity(total);
        for unit in units {
            labels.push(unit.label.clone());
            handles.push(tokio::spawn(run_unit(
                unit,
                Arc::clone(&semaphore),
                Arc::clone(&gate),
                self.limits.min_spacing,
                self.retry.clone(),
                cancel.clone(),
            )));
        }

        let mut outcomes = Vec::with_capacity(total);
        for (label, handle) in labels.into_iter().zip(handles) {
            match handle.await {
                Ok(outcome) => outcomes.push(outcome),
                // Panics inside attempts are caught in run_unit; a join
                // error means the task itself was torn down.
                Err(e) => outcomes.push(UnitOutcome {
                    label,
                    attempts: 0,
                    failed_attempts: 0,
                    result: Err(UnitError::Panicked(e.to_string())),
                }),
            }
        }

        let report = BatchReport { outcomes };
        info!(
            total,
            succeeded = report.succeeded(),
            failed = report.failed(),
            "Batch settled"
        );
        report
    }
}

enum AttemptFailure<E> {
    Error(E),
    Panic(String),
}

async fn run_unit<F, Fut, T, E>(
    mut unit: Unit<F>,
    semaphore: Arc<Semaphore>,
    gate: Arc<Mutex<Instant>>,
    min_spacing: std::time::Duration,
    retry: RetryPolicy,
    cancel: CancellationToken,
) -> UnitOutcome<T, E>
where
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = Result<T, E>> + Send,
    E: Display,
{
    let _permit = semaphore
        .acquire_owned()
        .await
        .expect("scheduler semaphore closed");

    if cancel.is_cancelled() {
        debug!(unit = %unit.label, "Batch cancelled, unit not started");
        return UnitOutcome {
            label: unit.label,
            attempts: 0,
            failed_attempts: 0,
            result: Err(UnitError::Cancelled),
        };
    }

    // Claim the next start slot, then wait for it without holding the
    // gate, so siblings can claim their own slots meanwhile.
    let start_at = {
        let mut next = gate.lock().await;
        let now = Instant::now();
        let at = if *next > now { *next } else { now };
        *next = at + min_spacing;
        at
    };
    tokio::time::sleep_until(start_at).await;

    let mut attempts = 0u32;
    let mut failed_attempts = 0u32;
    loop {
        attempts += 1;
        // A unit that panics is treated like one that failed async.
        let failure = match AssertUnwindSafe((unit.work)()).catch_unwind().await {
            Ok(Ok(value)) => {
                debug!(unit = %unit.label, attempts, "Unit succeeded");
                return UnitOutcome {
                    label: unit.label,
                    attempts,
                    failed_attempts,
                    result: Ok(value),
                };
            }
            Ok(Err(e)) => AttemptFailure::Error(e),
            Err(payload) => AttemptFailure::Panic(panic_message(payload)),
        };

        failed_attempts += 1;
        let retries_left = retry.max_attempts.saturating_sub(attempts);
        match &failure {
            AttemptFailure::Error(e) => {
                warn!(unit = %unit.label, attempt = attempts, retries_left, error = %e, "Unit attempt failed");
            }
            AttemptFailure::Panic(msg) => {
                warn!(unit = %unit.label, attempt = attempts, retries_left, panic = %msg, "Unit attempt panicked");
            }
        }

        if attempts >= retry.max_attempts {
            let terminal = match failure {
                AttemptFailure::Error(last) => UnitError::Exhausted { attempts, last },
                AttemptFailure::Panic(msg) => UnitError::Panicked(msg),
            };
            return UnitOutcome {
                label: unit.label,
                attempts,
                failed_attempts,
                result: Err(terminal),
            };
        }

        tokio::time::sleep(retry.delay_for(failed_attempts)).await;
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "opaque panic payload".to_string()
    }
}
