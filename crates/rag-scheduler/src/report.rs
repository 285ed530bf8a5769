//! Per-unit outcomes and the settled batch report.

use thiserror::Error;

/// Terminal failure of a single unit.
#[derive(Debug, Error)]
pub enum UnitError<E> {
    /// Every attempt failed; carries the final attempt's error.
    #[error("exhausted after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: E },

    /// The last attempt panicked instead of returning an error.
    #[error("unit panicked: {0}")]
    Panicked(String),

    /// The batch was cancelled before this unit started.
    #[error("cancelled before start")]
    Cancelled,
}

/// Settled outcome of one unit: success value or terminal failure, plus
/// attempt accounting for observability.
#[derive(Debug)]
pub struct UnitOutcome<T, E> {
    /// Caller-supplied label (e.g., a record identifier)
    pub label: String,
    /// Attempts actually made (0 if cancelled before start)
    pub attempts: u32,
    /// Failed attempts recorded along the way
    pub failed_attempts: u32,
    /// Terminal result
    pub result: Result<T, UnitError<E>>,
}

impl<T, E> UnitOutcome<T, E> {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Outcome of a whole batch, one entry per submitted unit in submission
/// order. Exists only once every unit has reached a terminal state.
#[derive(Debug)]
pub struct BatchReport<T, E> {
    pub outcomes: Vec<UnitOutcome<T, E>>,
}

impl<T, E> BatchReport<T, E> {
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    /// Labels of units that ended in terminal failure.
    pub fn failed_labels(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| !o.is_success())
            .map(|o| o.label.as_str())
            .collect()
    }
}
