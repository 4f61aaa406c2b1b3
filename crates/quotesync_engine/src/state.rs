//! Per-quote sync lifecycle.
//!
//! ```text
//! Clean ──edit──▶ Dirty ──compare──▶ Comparing ──┬─▶ Clean            (causally ordered)
//!                                                ├─▶ Merged           (silent merge)
//!                                                └─▶ ConflictPending  (needs a choice)
//! ConflictPending ──resolve──▶ Resolving ──▶ Merged
//! ```
//!
//! A quote in `ConflictPending` accepts no edits and no further comparisons
//! until a resolution has been applied.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a single quote is in its sync lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteSyncState {
    /// In agreement with the last copy seen from elsewhere.
    Clean,
    /// Holds local edits not yet reconciled.
    Dirty,
    /// A comparison with a remote copy is running.
    Comparing,
    /// Holds a merged or resolved record not yet pushed.
    Merged,
    /// Waiting for a human to resolve a conflict report.
    ConflictPending,
    /// A resolution is being applied.
    Resolving,
}

impl QuoteSyncState {
    /// Returns true while a merge or resolution is running.
    pub fn is_active(&self) -> bool {
        matches!(self, QuoteSyncState::Comparing | QuoteSyncState::Resolving)
    }

    /// Returns true if a remote copy may be compared now.
    pub fn can_reconcile(&self) -> bool {
        matches!(
            self,
            QuoteSyncState::Clean | QuoteSyncState::Dirty | QuoteSyncState::Merged
        )
    }

    /// Returns true if a human choice is required.
    pub fn needs_resolution(&self) -> bool {
        matches!(self, QuoteSyncState::ConflictPending)
    }

    /// Returns the state reached by `event`, or `None` if the lifecycle does
    /// not allow it.
    pub fn next(self, event: SyncEvent) -> Option<QuoteSyncState> {
        use QuoteSyncState::*;
        use SyncEvent::*;

        match (self, event) {
            (Clean | Dirty | Merged, LocalEdit) => Some(Dirty),
            (Clean | Dirty | Merged, BeginCompare) => Some(Comparing),
            (Comparing, Adopted) => Some(Clean),
            (Comparing, AutoMerged) => Some(Merged),
            (Comparing, ConflictFound) => Some(ConflictPending),
            (ConflictPending, BeginResolve) => Some(Resolving),
            (Resolving, Resolved) => Some(Merged),
            (Resolving, ResolutionRejected) => Some(ConflictPending),
            (Dirty | Merged, Pushed) => Some(Clean),
            _ => None,
        }
    }
}

impl Default for QuoteSyncState {
    fn default() -> Self {
        QuoteSyncState::Clean
    }
}

impl fmt::Display for QuoteSyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QuoteSyncState::Clean => "clean",
            QuoteSyncState::Dirty => "dirty",
            QuoteSyncState::Comparing => "comparing",
            QuoteSyncState::Merged => "merged",
            QuoteSyncState::ConflictPending => "conflict_pending",
            QuoteSyncState::Resolving => "resolving",
        };
        f.write_str(s)
    }
}

/// Something that happened to a quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncEvent {
    /// The user edited the local copy.
    LocalEdit,
    /// A remote copy arrived and is being compared.
    BeginCompare,
    /// The clocks were ordered; one side was kept verbatim.
    Adopted,
    /// The copies were concurrent and merged silently.
    AutoMerged,
    /// The copies were concurrent and produced a conflict report.
    ConflictFound,
    /// A resolution is being applied.
    BeginResolve,
    /// The resolution succeeded.
    Resolved,
    /// The resolution was rejected; the report is still pending.
    ResolutionRejected,
    /// The local copy was accepted upstream.
    Pushed,
}

impl fmt::Display for SyncEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SyncEvent::LocalEdit => "local_edit",
            SyncEvent::BeginCompare => "begin_compare",
            SyncEvent::Adopted => "adopted",
            SyncEvent::AutoMerged => "auto_merged",
            SyncEvent::ConflictFound => "conflict_found",
            SyncEvent::BeginResolve => "begin_resolve",
            SyncEvent::Resolved => "resolved",
            SyncEvent::ResolutionRejected => "resolution_rejected",
            SyncEvent::Pushed => "pushed",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_checks() {
        assert!(QuoteSyncState::Clean.can_reconcile());
        assert!(QuoteSyncState::Dirty.can_reconcile());
        assert!(QuoteSyncState::Merged.can_reconcile());
        assert!(!QuoteSyncState::ConflictPending.can_reconcile());
        assert!(!QuoteSyncState::Comparing.can_reconcile());

        assert!(QuoteSyncState::Comparing.is_active());
        assert!(QuoteSyncState::Resolving.is_active());
        assert!(!QuoteSyncState::Clean.is_active());

        assert!(QuoteSyncState::ConflictPending.needs_resolution());
    }

    #[test]
    fn full_conflict_lifecycle() {
        let mut state = QuoteSyncState::default();
        for event in [
            SyncEvent::LocalEdit,
            SyncEvent::BeginCompare,
            SyncEvent::ConflictFound,
            SyncEvent::BeginResolve,
            SyncEvent::ResolutionRejected,
            SyncEvent::BeginResolve,
            SyncEvent::Resolved,
            SyncEvent::Pushed,
        ] {
            state = state.next(event).unwrap();
        }
        assert_eq!(state, QuoteSyncState::Clean);
    }

    #[test]
    fn pending_conflict_blocks_edits_and_compares() {
        let pending = QuoteSyncState::ConflictPending;
        assert_eq!(pending.next(SyncEvent::LocalEdit), None);
        assert_eq!(pending.next(SyncEvent::BeginCompare), None);
        assert_eq!(pending.next(SyncEvent::Pushed), None);
    }

    #[test]
    fn outcomes_only_follow_a_compare() {
        assert_eq!(QuoteSyncState::Dirty.next(SyncEvent::AutoMerged), None);
        assert_eq!(QuoteSyncState::Clean.next(SyncEvent::Resolved), None);
        assert_eq!(
            QuoteSyncState::Comparing.next(SyncEvent::Adopted),
            Some(QuoteSyncState::Clean)
        );
    }
}
