//! Answer request lifecycle.

use tracing::debug;

/// Phases a chat request moves through. Transitions only move forward;
/// a failure lands in `Failed` before any token was delivered and in
/// `FailedPartial` after.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestPhase {
    Received,
    EmbeddingQuery,
    Searching,
    ContextAssembled,
    Generating,
    Streaming,
    Complete,
    Failed,
    FailedPartial,
}

impl RequestPhase {
    /// Whether `self -> next` is a legal transition.
    pub fn can_transition(self, next: RequestPhase) -> bool {
        use RequestPhase::*;
        matches!(
            (self, next),
            (Received, EmbeddingQuery)
                | (EmbeddingQuery, Searching)
                | (Searching, ContextAssembled)
                | (ContextAssembled, Generating)
                | (Generating, Streaming)
                | (Streaming, Complete)
                | (Received | EmbeddingQuery | Searching | ContextAssembled, Failed)
                | (Generating | Streaming, FailedPartial)
        )
    }
}

/// Tracks the current phase of a single request.
#[derive(Debug)]
pub struct PhaseTracker {
    current: RequestPhase,
}

impl PhaseTracker {
    pub fn new() -> Self {
        Self {
            current: RequestPhase::Received,
        }
    }

    pub fn current(&self) -> RequestPhase {
        self.current
    }

    pub fn advance(&mut self, next: RequestPhase) {
        debug_assert!(
            self.current.can_transition(next),
            "illegal phase transition {:?} -> {:?}",
            self.current,
            next
        );
        debug!(from = ?self.current, to = ?next, "Request phase");
        self.current = next;
    }

    /// Move to the failure phase matching how far the request got.
    pub fn fail(&mut self) {
        let next = match self.current {
            RequestPhase::Generating | RequestPhase::Streaming => RequestPhase::FailedPartial,
            _ => RequestPhase::Failed,
        };
        debug!(from = ?self.current, to = ?next, "Request failed");
        self.current = next;
    }
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self::new()
    }
}
