//! # QuoteSync Engine
//!
//! Caller-side sync plumbing around the QuoteSync merge engine.
//!
//! This crate provides:
//! - Per-quote lifecycle state machine (clean → dirty → comparing → merged)
//! - In-flight registry that serialises merges of the same quote
//! - Pluggable quote storage with an in-memory implementation
//! - A syncer that drives compare, merge and resolve and keeps statistics
//!
//! ## Key Invariants
//!
//! - At most one merge or resolution per quote is in flight
//! - A quote with a pending conflict accepts no edits or comparisons
//! - A failed merge leaves the stored copy and its state untouched
//! - A rejected resolution leaves the conflict pending

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod inflight;
mod state;
mod store;
mod syncer;

pub use error::{SyncError, SyncResult};
pub use inflight::{InFlightGuard, InFlightRegistry};
pub use state::{QuoteSyncState, SyncEvent};
pub use store::{MemoryQuoteStore, PendingMerge, QuoteStore};
pub use syncer::{QuoteSyncer, SyncStats};
