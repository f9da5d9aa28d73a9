use thiserror::Error;

use crate::models::Phase;

/// Failure taxonomy for the session engine.
///
/// Violations (tab switch, window blur) are deliberately absent: forced
/// submission is designed behavior, not an error, and must never be retried
/// or suppressed.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The client could not enter fullscreen (or never acknowledged the
    /// directive). Recoverable: the caller may retry start/resume.
    #[error("fullscreen request failed: {reason}")]
    FullscreenRequestFailed { reason: String },

    /// The scoring collaborator was unreachable, returned a non-success
    /// status, or produced an unusable reply. Fatal to the current
    /// submission attempt; the whole submission must be retried.
    #[error("scoring collaborator unavailable: {reason}")]
    ScoringUnavailable { reason: String },

    /// A chat or code-execution collaborator failed. Surfaced inline per
    /// call; never affects the session phase.
    #[error("collaborator unreachable: {reason}")]
    CollaboratorUnreachable { reason: String },

    /// Elapsed time was requested before the session started.
    #[error("session has not started")]
    NotStarted,

    /// The requested operation is not allowed in the current phase.
    #[error("operation not allowed while session is {phase:?}")]
    InvalidPhase { phase: Phase },

    /// A submission is already running or has completed; at most one
    /// scoring pass executes per session.
    #[error("session submission already in progress or completed")]
    AlreadySubmitted,

    #[error("unknown session: {0}")]
    UnknownSession(String),

    #[error("unknown question: {0}")]
    UnknownQuestion(String),

    #[error("invalid question catalog: {0}")]
    InvalidCatalog(String),
}

impl SessionError {
    pub fn fullscreen(reason: impl Into<String>) -> Self {
        Self::FullscreenRequestFailed {
            reason: reason.into(),
        }
    }

    pub fn scoring(reason: impl Into<String>) -> Self {
        Self::ScoringUnavailable {
            reason: reason.into(),
        }
    }

    pub fn collaborator(reason: impl Into<String>) -> Self {
        Self::CollaboratorUnreachable {
            reason: reason.into(),
        }
    }

    /// Whether the caller can meaningfully retry the same operation.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::FullscreenRequestFailed { .. }
                | Self::ScoringUnavailable { .. }
                | Self::CollaboratorUnreachable { .. }
        )
    }
}
