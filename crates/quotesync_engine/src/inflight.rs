//! Per-quote merge serialisation.
//!
//! The merge engine is safe across different quotes but must never run twice
//! on the same quote at once. The registry hands out one guard per quote id;
//! a second caller fails fast instead of waiting.

use crate::error::{SyncError, SyncResult};
use parking_lot::Mutex;
use quotesync_core::QuoteId;
use std::collections::BTreeSet;

/// Quote ids with a merge or resolution in progress.
#[derive(Debug, Default)]
pub struct InFlightRegistry {
    ids: Mutex<BTreeSet<QuoteId>>,
}

impl InFlightRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `id` until the returned guard is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::MergeInFlight`] if `id` is already claimed.
    pub fn try_acquire(&self, id: &QuoteId) -> SyncResult<InFlightGuard<'_>> {
        let mut ids = self.ids.lock();
        if !ids.insert(id.clone()) {
            return Err(SyncError::MergeInFlight(id.clone()));
        }
        Ok(InFlightGuard {
            registry: self,
            id: id.clone(),
        })
    }

    /// Returns true if `id` is claimed.
    pub fn is_in_flight(&self, id: &QuoteId) -> bool {
        self.ids.lock().contains(id)
    }

    /// Number of claimed ids.
    pub fn len(&self) -> usize {
        self.ids.lock().len()
    }

    /// Returns true if nothing is claimed.
    pub fn is_empty(&self) -> bool {
        self.ids.lock().is_empty()
    }
}

/// Releases its quote id on drop.
#[derive(Debug)]
pub struct InFlightGuard<'a> {
    registry: &'a InFlightRegistry,
    id: QuoteId,
}

impl InFlightGuard<'_> {
    /// The claimed quote id.
    pub fn id(&self) -> &QuoteId {
        &self.id
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.registry.ids.lock().remove(&self.id);
    }
}
