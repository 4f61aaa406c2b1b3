//! Drives compare, merge and resolve for the quotes held by one device.

use crate::error::{SyncError, SyncResult};
use crate::inflight::InFlightRegistry;
use crate::state::{QuoteSyncState, SyncEvent};
use crate::store::{PendingMerge, QuoteStore};
use parking_lot::RwLock;
use quotesync_core::{
    compare_clocks, ChoiceMap, MergeEngine, MergeError, MergeOutcome, Quote, QuoteId,
    Relationship, ResolvedQuote, Side,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

/// Statistics about reconciliations.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Remote copies compared against a local copy.
    pub reconciles: u64,
    /// Comparisons where the local copy was newer.
    pub kept_local: u64,
    /// Comparisons where the remote copy was adopted verbatim.
    pub adopted_remote: u64,
    /// Concurrent copies merged without human input.
    pub auto_merges: u64,
    /// Paths settled by last-writer-wins or job set rules.
    pub auto_merged_paths: u64,
    /// Conflict reports produced.
    pub conflicts_reported: u64,
    /// Entries across all conflict reports.
    pub conflict_entries: u64,
    /// Resolutions applied.
    pub resolutions: u64,
    /// Resolutions rejected as incomplete or invalid.
    pub rejected_resolutions: u64,
    /// Last reconcile time.
    pub last_reconcile_time: Option<Instant>,
    /// Last error message.
    pub last_error: Option<String>,
}

/// Reconciles local quotes with copies received from elsewhere.
///
/// Each quote moves through [`QuoteSyncState`]; at most one merge or
/// resolution per quote runs at a time, and a second caller gets
/// [`SyncError::MergeInFlight`].
pub struct QuoteSyncer<S: QuoteStore> {
    engine: MergeEngine,
    store: Arc<S>,
    states: RwLock<BTreeMap<QuoteId, QuoteSyncState>>,
    stats: RwLock<SyncStats>,
    in_flight: InFlightRegistry,
}

impl<S: QuoteStore> QuoteSyncer<S> {
    /// Creates a syncer.
    pub fn new(engine: MergeEngine, store: S) -> Self {
        Self {
            engine,
            store: Arc::new(store),
            states: RwLock::new(BTreeMap::new()),
            stats: RwLock::new(SyncStats::default()),
            in_flight: InFlightRegistry::new(),
        }
    }

    /// Gets the merge engine.
    pub fn engine(&self) -> &MergeEngine {
        &self.engine
    }

    /// Gets the quote store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Gets the lifecycle state of a quote, if it has one.
    pub fn state(&self, id: &QuoteId) -> Option<QuoteSyncState> {
        self.states.read().get(id).copied()
    }

    /// Gets the current stats.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Loads the local copy of a quote.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::QuoteNotFound`] if there is none.
    pub fn local(&self, id: &QuoteId) -> SyncResult<Quote> {
        self.store
            .load(id)?
            .ok_or_else(|| SyncError::QuoteNotFound(id.clone()))
    }

    /// Returns the pending merge of a quote, if any.
    pub fn pending(&self, id: &QuoteId) -> SyncResult<Option<PendingMerge>> {
        self.store.pending(id)
    }

    /// Stores a locally edited copy of a quote.
    ///
    /// The edited copy must descend from the stored one: its clock has to be
    /// strictly newer.
    ///
    /// # Errors
    ///
    /// - [`SyncError::Merge`] with [`MergeError::MalformedClock`] if the copy
    ///   does not descend from the stored one
    /// - [`SyncError::InvalidStateTransition`] while a conflict is pending
    /// - [`SyncError::MergeInFlight`] during a merge of the same quote
    pub fn record_local_edit(&self, quote: Quote) -> SyncResult<QuoteSyncState> {
        let _guard = self.in_flight.try_acquire(&quote.id)?;
        self.restore_state(&quote.id)?;

        if let Some(stored) = self.store.load(&quote.id)? {
            let relationship = compare_clocks(&stored.clock, &quote.clock);
            if relationship != Relationship::Before {
                return Err(MergeError::malformed_clock(
                    quote.modified_by.as_str(),
                    format!("edited copy is not newer than the stored copy ({relationship})"),
                )
                .into());
            }
        }

        self.check(&quote.id, SyncEvent::LocalEdit)?;
        let id = quote.id.clone();
        self.store.save(quote)?;
        self.advance(&id, SyncEvent::LocalEdit)
    }

    /// Reconciles the local copy of a quote with a remote copy.
    ///
    /// A quote seen for the first time is stored as is.
    ///
    /// # Errors
    ///
    /// Merge errors are returned unchanged and leave the local copy and its
    /// state untouched.
    pub fn reconcile(&self, remote: &Quote) -> SyncResult<MergeOutcome> {
        let id = remote.id.clone();
        let _guard = self.in_flight.try_acquire(&id)?;
        self.restore_state(&id)?;
        self.stats.write().reconciles += 1;

        let Some(local) = self.store.load(&id)? else {
            self.store.save(remote.clone())?;
            self.states.write().insert(id.clone(), QuoteSyncState::Clean);
            tracing::info!(quote = %id, "stored first copy of quote");
            return Ok(MergeOutcome::Replace(Side::Remote));
        };

        let before = self.state(&id).unwrap_or_default();
        self.advance(&id, SyncEvent::BeginCompare)?;

        let outcome = self
            .engine
            .attempt_merge(&local, remote)
            .map_err(SyncError::from)
            .and_then(|outcome| self.apply_outcome(&id, remote, outcome));

        match outcome {
            Ok(outcome) => {
                tracing::info!(quote = %id, outcome = outcome.label(), "reconciled quote");
                self.stats.write().last_reconcile_time = Some(Instant::now());
                Ok(outcome)
            }
            Err(e) => {
                self.states.write().insert(id.clone(), before);
                self.handle_error(&e);
                Err(e)
            }
        }
    }

    /// Applies choices to the pending conflict of a quote.
    ///
    /// # Errors
    ///
    /// - [`SyncError::NoPendingConflict`] if the quote has no pending merge
    /// - [`SyncError::Merge`] if the choices are incomplete or invalid; the
    ///   conflict stays pending and nothing is applied
    pub fn resolve(&self, id: &QuoteId, choices: &ChoiceMap) -> SyncResult<ResolvedQuote> {
        let _guard = self.in_flight.try_acquire(id)?;

        let Some(merge) = self.store.pending(id)? else {
            return Err(SyncError::NoPendingConflict(id.clone()));
        };
        self.restore_state(id)?;
        self.advance(id, SyncEvent::BeginResolve)?;

        let result = self
            .engine
            .resolve(&merge.pending, &merge.report, choices)
            .map_err(SyncError::from)
            .and_then(|resolved| {
                let taken = self.store.take_pending(id)?;
                if let Err(e) = self.store.save(resolved.quote.clone()) {
                    if let Some(taken) = taken {
                        self.store.save_pending(taken)?;
                    }
                    return Err(e);
                }
                Ok(resolved)
            });

        match result {
            Ok(resolved) => {
                self.advance(id, SyncEvent::Resolved)?;
                self.stats.write().resolutions += 1;
                tracing::info!(
                    quote = %id,
                    entries = merge.report.len(),
                    recompute_financials = resolved.recompute_financials,
                    "resolved conflict"
                );
                Ok(resolved)
            }
            Err(e) => {
                self.advance(id, SyncEvent::ResolutionRejected)?;
                self.stats.write().rejected_resolutions += 1;
                self.handle_error(&e);
                Err(e)
            }
        }
    }

    /// Marks the local copy of a quote as accepted upstream.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::QuoteNotFound`] for an unknown quote and
    /// [`SyncError::InvalidStateTransition`] unless the quote is dirty or
    /// merged.
    pub fn mark_pushed(&self, id: &QuoteId) -> SyncResult<QuoteSyncState> {
        let _guard = self.in_flight.try_acquire(id)?;
        self.local(id)?;
        self.restore_state(id)?;
        self.advance(id, SyncEvent::Pushed)
    }

    fn apply_outcome(
        &self,
        id: &QuoteId,
        remote: &Quote,
        outcome: MergeOutcome,
    ) -> SyncResult<MergeOutcome> {
        match &outcome {
            MergeOutcome::Replace(Side::Local) => {
                self.advance(id, SyncEvent::Adopted)?;
                self.stats.write().kept_local += 1;
            }
            MergeOutcome::Replace(Side::Remote) => {
                self.store.save(remote.clone())?;
                self.advance(id, SyncEvent::Adopted)?;
                self.stats.write().adopted_remote += 1;
            }
            MergeOutcome::Merged(merged) => {
                self.store.save(merged.quote.clone())?;
                self.advance(id, SyncEvent::AutoMerged)?;
                let mut stats = self.stats.write();
                stats.auto_merges += 1;
                stats.auto_merged_paths += merged.auto_merged.len() as u64;
            }
            MergeOutcome::NeedsResolution { pending, report } => {
                self.store.save_pending(PendingMerge {
                    pending: pending.clone(),
                    report: report.clone(),
                })?;
                self.advance(id, SyncEvent::ConflictFound)?;
                let mut stats = self.stats.write();
                stats.conflicts_reported += 1;
                stats.conflict_entries += report.len() as u64;
            }
        }
        Ok(outcome)
    }

    /// Seeds the state of a quote the syncer has not seen since it started.
    ///
    /// States live in memory while pending merges live in the store, so a
    /// stored pending merge means the quote is still in conflict.
    fn restore_state(&self, id: &QuoteId) -> SyncResult<()> {
        if self.state(id).is_some() {
            return Ok(());
        }
        if self.store.pending(id)?.is_some() {
            self.states
                .write()
                .entry(id.clone())
                .or_insert(QuoteSyncState::ConflictPending);
            tracing::debug!(quote = %id, "restored pending conflict from store");
        }
        Ok(())
    }

    /// Checks that `event` is allowed without applying it.
    fn check(&self, id: &QuoteId, event: SyncEvent) -> SyncResult<QuoteSyncState> {
        let current = self.state(id).unwrap_or_default();
        current
            .next(event)
            .ok_or_else(|| SyncError::InvalidStateTransition {
                quote: id.clone(),
                from: current,
                event: event.to_string(),
            })
    }

    /// Applies `event` to the state of a quote.
    fn advance(&self, id: &QuoteId, event: SyncEvent) -> SyncResult<QuoteSyncState> {
        let mut states = self.states.write();
        let current = states.get(id).copied().unwrap_or_default();
        let next = current
            .next(event)
            .ok_or_else(|| SyncError::InvalidStateTransition {
                quote: id.clone(),
                from: current,
                event: event.to_string(),
            })?;
        states.insert(id.clone(), next);
        tracing::debug!(quote = %id, from = %current, to = %next, %event, "state transition");
        Ok(next)
    }

    fn handle_error(&self, error: &SyncError) {
        tracing::warn!(error = %error, "sync step failed");
        self.stats.write().last_error = Some(error.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryQuoteStore;
    use quotesync_core::{Choice, FieldPath, FieldValue, MergeConfig};
    use std::sync::atomic::{AtomicBool, Ordering};

    fn syncer(device: &str) -> QuoteSyncer<MemoryQuoteStore> {
        QuoteSyncer::new(
            MergeEngine::new(MergeConfig::new(device)),
            MemoryQuoteStore::new(),
        )
    }

    fn base() -> Quote {
        let mut q = Quote::create(QuoteId::new("Q-1"), "office", 0);
        q.set_field("office", 1, "status", "draft");
        q
    }

    #[test]
    fn first_sight_stores_remote() {
        let s = syncer("tablet");
        let outcome = s.reconcile(&base()).unwrap();
        assert_eq!(outcome, MergeOutcome::Replace(Side::Remote));
        assert_eq!(s.state(&base().id), Some(QuoteSyncState::Clean));
        assert_eq!(s.local(&base().id).unwrap(), base());
    }

    #[test]
    fn edit_then_newer_local_is_kept() {
        let s = syncer("tablet");
        s.reconcile(&base()).unwrap();

        let mut edited = base();
        edited.set_field("tablet", 2, "notes", "bring ladder");
        assert_eq!(s.record_local_edit(edited).unwrap(), QuoteSyncState::Dirty);

        let outcome = s.reconcile(&base()).unwrap();
        assert_eq!(outcome, MergeOutcome::Replace(Side::Local));
        assert_eq!(s.stats().kept_local, 1);
    }

    #[test]
    fn edit_must_descend_from_stored_copy() {
        let s = syncer("tablet");
        s.reconcile(&base()).unwrap();

        let err = s.record_local_edit(base()).unwrap_err();
        assert!(matches!(
            err,
            SyncError::Merge(MergeError::MalformedClock { .. })
        ));
        assert_eq!(s.state(&base().id), Some(QuoteSyncState::Clean));
    }

    #[test]
    fn conflict_blocks_edits_until_resolved() {
        let s = syncer("tablet");
        s.reconcile(&base()).unwrap();

        let mut mine = base();
        mine.set_field("tablet", 5, "status", "sent");
        s.record_local_edit(mine.clone()).unwrap();

        let mut theirs = base();
        theirs.set_field("office", 6, "status", "accepted");
        let outcome = s.reconcile(&theirs).unwrap();
        assert!(outcome.needs_resolution());
        assert_eq!(s.state(&mine.id), Some(QuoteSyncState::ConflictPending));

        let mut again = mine.clone();
        again.set_field("tablet", 7, "notes", "x");
        assert!(matches!(
            s.record_local_edit(again),
            Err(SyncError::InvalidStateTransition { .. })
        ));

        let rejected = s.resolve(&mine.id, &ChoiceMap::new()).unwrap_err();
        assert!(rejected.is_caller_fixable());
        assert_eq!(s.state(&mine.id), Some(QuoteSyncState::ConflictPending));

        let mut choices = ChoiceMap::new();
        choices.insert(FieldPath::scalar("status"), Choice::AdoptRemote);
        let resolved = s.resolve(&mine.id, &choices).unwrap();
        assert_eq!(resolved.quote.fields["status"], FieldValue::text("accepted"));
        assert_eq!(s.state(&mine.id), Some(QuoteSyncState::Merged));
        assert!(s.pending(&mine.id).unwrap().is_none());
        assert_eq!(s.local(&mine.id).unwrap(), resolved.quote);

        let stats = s.stats();
        assert_eq!(stats.conflicts_reported, 1);
        assert_eq!(stats.resolutions, 1);
        assert_eq!(stats.rejected_resolutions, 1);
        assert!(stats.last_error.is_some());

        assert_eq!(s.mark_pushed(&mine.id).unwrap(), QuoteSyncState::Clean);
    }

    #[test]
    fn resolve_without_conflict() {
        let s = syncer("tablet");
        s.reconcile(&base()).unwrap();
        assert!(matches!(
            s.resolve(&base().id, &ChoiceMap::new()),
            Err(SyncError::NoPendingConflict(_))
        ));
    }

    #[test]
    fn failed_merge_restores_state() {
        let s = syncer("tablet");
        s.reconcile(&base()).unwrap();
        let mut mine = base();
        mine.set_field("tablet", 2, "notes", "x");
        s.record_local_edit(mine).unwrap();

        let mut forged = base();
        forged.clock.observe("tablet", 9);
        let err = s.reconcile(&forged).unwrap_err();
        assert!(matches!(err, SyncError::Merge(MergeError::MalformedClock { .. })));
        assert_eq!(s.state(&base().id), Some(QuoteSyncState::Dirty));
    }

    /// Memory store whose `save` can be switched to fail.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryQuoteStore,
        fail_saves: AtomicBool,
    }

    impl QuoteStore for FlakyStore {
        fn load(&self, id: &QuoteId) -> SyncResult<Option<Quote>> {
            self.inner.load(id)
        }

        fn save(&self, quote: Quote) -> SyncResult<()> {
            if self.fail_saves.load(Ordering::SeqCst) {
                return Err(SyncError::store("disk full"));
            }
            self.inner.save(quote)
        }

        fn save_pending(&self, merge: PendingMerge) -> SyncResult<()> {
            self.inner.save_pending(merge)
        }

        fn pending(&self, id: &QuoteId) -> SyncResult<Option<PendingMerge>> {
            self.inner.pending(id)
        }

        fn take_pending(&self, id: &QuoteId) -> SyncResult<Option<PendingMerge>> {
            self.inner.take_pending(id)
        }
    }

    #[test]
    fn failed_save_keeps_conflict_pending() {
        let s = QuoteSyncer::new(
            MergeEngine::new(MergeConfig::new("tablet")),
            FlakyStore::default(),
        );
        s.reconcile(&base()).unwrap();
        let mut mine = base();
        mine.set_field("tablet", 5, "status", "sent");
        s.record_local_edit(mine.clone()).unwrap();
        let mut theirs = base();
        theirs.set_field("office", 6, "status", "accepted");
        assert!(s.reconcile(&theirs).unwrap().needs_resolution());

        let mut choices = ChoiceMap::new();
        choices.insert(FieldPath::scalar("status"), Choice::AdoptRemote);

        s.store().fail_saves.store(true, Ordering::SeqCst);
        let err = s.resolve(&mine.id, &choices).unwrap_err();
        assert!(matches!(err, SyncError::Store(_)));
        assert!(s.pending(&mine.id).unwrap().is_some());
        assert_eq!(s.local(&mine.id).unwrap(), mine);
        assert_eq!(s.state(&mine.id), Some(QuoteSyncState::ConflictPending));

        s.store().fail_saves.store(false, Ordering::SeqCst);
        let resolved = s.resolve(&mine.id, &choices).unwrap();
        assert_eq!(s.local(&mine.id).unwrap(), resolved.quote);
        assert!(s.pending(&mine.id).unwrap().is_none());
    }

    #[test]
    fn unknown_quote_cannot_be_pushed() {
        let s = syncer("tablet");
        assert!(matches!(
            s.mark_pushed(&QuoteId::new("nope")),
            Err(SyncError::QuoteNotFound(_))
        ));
    }
}
