//! Error types for the sync engine.

use crate::state::QuoteSyncState;
use quotesync_core::{MergeError, QuoteId};
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur while reconciling quotes.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The merge engine rejected the input.
    #[error("merge error: {0}")]
    Merge(#[from] MergeError),

    /// The quote's lifecycle does not allow the requested step.
    #[error("invalid state transition for quote {quote}: {from} on {event}")]
    InvalidStateTransition {
        /// Quote whose state was checked.
        quote: QuoteId,
        /// Current state.
        from: QuoteSyncState,
        /// Event that was refused.
        event: String,
    },

    /// Another merge or resolution of the same quote is running.
    #[error("a merge of quote {0} is already in flight")]
    MergeInFlight(QuoteId),

    /// The store holds no copy of the quote.
    #[error("quote {0} not found")]
    QuoteNotFound(QuoteId),

    /// A resolution was requested for a quote with no pending conflict.
    #[error("quote {0} has no pending conflict")]
    NoPendingConflict(QuoteId),

    /// The quote store failed.
    #[error("store error: {0}")]
    Store(String),
}

impl SyncError {
    /// Creates a store error.
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store(message.into())
    }

    /// Returns true if the caller can recover by correcting its input,
    /// for example by supplying a complete resolution or a well-formed clock.
    pub fn is_caller_fixable(&self) -> bool {
        match self {
            SyncError::Merge(e) => !e.is_configuration_error(),
            SyncError::InvalidStateTransition { .. }
            | SyncError::QuoteNotFound(_)
            | SyncError::NoPendingConflict(_) => true,
            SyncError::MergeInFlight(_) | SyncError::Store(_) => false,
        }
    }

    /// Returns true if retrying the same call later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::MergeInFlight(_) | SyncError::Store(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quotesync_core::FieldPath;

    #[test]
    fn caller_fixable_errors() {
        let incomplete = SyncError::from(MergeError::IncompleteResolution {
            missing: vec![FieldPath::scalar("status")],
            unexpected: vec![],
        });
        assert!(incomplete.is_caller_fixable());

        let gap = SyncError::from(MergeError::ClassificationGap {
            path: FieldPath::scalar("fax"),
        });
        assert!(!gap.is_caller_fixable());

        assert!(!SyncError::MergeInFlight(QuoteId::new("Q")).is_caller_fixable());
        assert!(SyncError::MergeInFlight(QuoteId::new("Q")).is_retryable());
        assert!(!SyncError::NoPendingConflict(QuoteId::new("Q")).is_retryable());
    }

    #[test]
    fn error_display() {
        let err = SyncError::InvalidStateTransition {
            quote: QuoteId::new("Q-7"),
            from: QuoteSyncState::ConflictPending,
            event: "local_edit".into(),
        };
        assert_eq!(
            err.to_string(),
            "invalid state transition for quote Q-7: conflict_pending on local_edit"
        );
        assert_eq!(
            SyncError::store("disk full").to_string(),
            "store error: disk full"
        );
    }
}
