//! Storage seam for quotes and pending conflicts.

use crate::error::SyncResult;
use parking_lot::RwLock;
use quotesync_core::{ConflictReport, Quote, QuoteId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A merge waiting for a human choice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingMerge {
    /// Merged record with local placeholders at every reported path.
    pub pending: Quote,
    /// What must be resolved.
    pub report: ConflictReport,
}

/// Persistence for the local copies of quotes.
///
/// The sync engine never talks to a database directly; callers plug their
/// storage in through this trait.
pub trait QuoteStore: Send + Sync {
    /// Loads the local copy of a quote.
    fn load(&self, id: &QuoteId) -> SyncResult<Option<Quote>>;

    /// Stores the local copy of a quote, replacing any previous copy.
    fn save(&self, quote: Quote) -> SyncResult<()>;

    /// Stores a pending merge for the quote it describes.
    fn save_pending(&self, merge: PendingMerge) -> SyncResult<()>;

    /// Returns the pending merge for a quote, if any.
    fn pending(&self, id: &QuoteId) -> SyncResult<Option<PendingMerge>>;

    /// Removes and returns the pending merge for a quote.
    fn take_pending(&self, id: &QuoteId) -> SyncResult<Option<PendingMerge>>;
}

/// An in-memory quote store for tests and tools.
#[derive(Debug, Default)]
pub struct MemoryQuoteStore {
    quotes: RwLock<BTreeMap<QuoteId, Quote>>,
    pending: RwLock<BTreeMap<QuoteId, PendingMerge>>,
}

impl MemoryQuoteStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding `quotes`.
    pub fn with_quotes(quotes: impl IntoIterator<Item = Quote>) -> Self {
        let store = Self::new();
        store
            .quotes
            .write()
            .extend(quotes.into_iter().map(|q| (q.id.clone(), q)));
        store
    }

    /// Number of stored quotes.
    pub fn len(&self) -> usize {
        self.quotes.read().len()
    }

    /// Returns true if no quotes are stored.
    pub fn is_empty(&self) -> bool {
        self.quotes.read().is_empty()
    }

    /// Ids of quotes with a pending merge.
    pub fn pending_ids(&self) -> Vec<QuoteId> {
        self.pending.read().keys().cloned().collect()
    }
}

impl QuoteStore for MemoryQuoteStore {
    fn load(&self, id: &QuoteId) -> SyncResult<Option<Quote>> {
        Ok(self.quotes.read().get(id).cloned())
    }

    fn save(&self, quote: Quote) -> SyncResult<()> {
        self.quotes.write().insert(quote.id.clone(), quote);
        Ok(())
    }

    fn save_pending(&self, merge: PendingMerge) -> SyncResult<()> {
        self.pending
            .write()
            .insert(merge.report.quote_id.clone(), merge);
        Ok(())
    }

    fn pending(&self, id: &QuoteId) -> SyncResult<Option<PendingMerge>> {
        Ok(self.pending.read().get(id).cloned())
    }

    fn take_pending(&self, id: &QuoteId) -> SyncResult<Option<PendingMerge>> {
        Ok(self.pending.write().remove(id))
    }
}
