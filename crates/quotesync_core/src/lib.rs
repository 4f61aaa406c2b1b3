//! # QuoteSync Core
//!
//! Causal conflict detection and merge for price quotes edited offline on
//! several devices.
//!
//! This crate provides:
//! - Per-device version clocks and causal comparison
//! - Static field classification (system, auto-mergeable, critical)
//! - Field and job merging with conflict reports
//! - All-or-nothing resolution of reported conflicts
//! - Canonical CBOR encoding and fingerprints
//!
//! This is a pure crate with no I/O operations.
//!
//! ## Key Invariants
//!
//! - Two copies conflict only when their clocks are concurrent
//! - A causally newer copy replaces the older one verbatim
//! - Critical divergences are always reported, never guessed
//! - Jobs are matched by id, never by position
//! - Same inputs produce byte-identical outputs
//!
//! ## Usage
//!
//! ```
//! use quotesync_core::{MergeConfig, MergeEngine, MergeOutcome, Quote, QuoteId, Side};
//!
//! let engine = MergeEngine::new(MergeConfig::new("tablet-a"));
//!
//! let mut local = Quote::create(QuoteId::new("Q-1"), "tablet-a", 1_000);
//! let remote = local.clone();
//! local.set_field("tablet-a", 2_000, "notes", "call before arriving");
//!
//! let outcome = engine.attempt_merge(&local, &remote).unwrap();
//! assert_eq!(outcome, MergeOutcome::Replace(Side::Local));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod causal;
mod classify;
mod clock;
mod collection_merge;
mod config;
mod encoding;
mod engine;
mod error;
mod field_merge;
mod path;
mod quote;
mod report;
mod resolve;
mod value;

pub use causal::{compare, Relationship};
pub use classify::{ClassificationBuilder, ClassificationTable, FieldClass, FieldRule, GapPolicy};
pub use clock::{Dot, VersionClock};
pub use collection_merge::{CollectionMerger, JobMerge};
pub use config::MergeConfig;
pub use encoding::{fingerprint, from_canonical_bytes, to_canonical_bytes, Fingerprint};
pub use engine::{MergeEngine, MergeOutcome, MergedQuote};
pub use error::{MergeError, MergeResult};
pub use field_merge::{FieldMerge, FieldMerger};
pub use path::{FieldPath, ParsePathError};
pub use quote::{Financials, Job, JobId, Quote, QuoteId};
pub use report::{AutoMerged, Candidate, ConflictEntry, ConflictKind, ConflictReport, Side};
pub use resolve::{Choice, ChoiceMap, ResolutionCoordinator, ResolvedQuote};
pub use value::FieldValue;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Determines the causal relationship of clock `a` to clock `b`.
pub fn compare_clocks(a: &VersionClock, b: &VersionClock) -> Relationship {
    compare(a, b)
}
