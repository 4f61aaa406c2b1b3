//! Error types for the merge engine.

use crate::path::FieldPath;
use thiserror::Error;

/// Result type for merge engine operations.
pub type MergeResult<T> = Result<T, MergeError>;

/// Errors produced by the merge engine.
///
/// Every variant is recoverable by caller action: fix the input, fix the
/// configuration, or supply a correct resolution.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MergeError {
    /// A version clock violates its own invariants.
    #[error("malformed clock for device {device:?}: {reason}")]
    MalformedClock {
        /// Device whose counter is invalid.
        device: String,
        /// What was wrong with it.
        reason: String,
    },

    /// A resolution did not supply exactly one choice per reported entry.
    #[error(
        "incomplete resolution: {} missing, {} unexpected",
        missing.len(),
        unexpected.len()
    )]
    IncompleteResolution {
        /// Reported paths that received no choice.
        missing: Vec<FieldPath>,
        /// Chosen paths that were never reported.
        unexpected: Vec<FieldPath>,
    },

    /// A field is not covered by the classification table.
    #[error("field {path} is not classified")]
    ClassificationGap {
        /// The unclassified field.
        path: FieldPath,
    },

    /// The two records do not describe the same quote.
    #[error("quote mismatch: expected {expected}, got {actual}")]
    QuoteMismatch {
        /// Identifier the operation expected.
        expected: String,
        /// Identifier it was given.
        actual: String,
    },

    /// A choice cannot be applied to the path it was given for.
    #[error("invalid choice for {path}: {reason}")]
    InvalidChoice {
        /// The path the choice targeted.
        path: FieldPath,
        /// Why the choice does not fit.
        reason: String,
    },

    /// Canonical encoding failed.
    #[error("encoding error: {0}")]
    Encoding(String),
}

impl MergeError {
    /// Creates a malformed clock error.
    pub fn malformed_clock(device: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedClock {
            device: device.into(),
            reason: reason.into(),
        }
    }

    /// Creates an invalid choice error.
    pub fn invalid_choice(path: FieldPath, reason: impl Into<String>) -> Self {
        Self::InvalidChoice {
            path,
            reason: reason.into(),
        }
    }

    /// Returns true if the error points at engine configuration rather than
    /// the records or choices passed in.
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, MergeError::ClassificationGap { .. })
    }
}
