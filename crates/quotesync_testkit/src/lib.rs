//! # QuoteSync Testkit
//!
//! Test utilities for QuoteSync.
//!
//! This crate provides:
//! - Reference scenarios with their expected outcomes
//! - Temporary JSON fixture directories
//! - Property-based test generators
//! - An independent oracle for which paths must be reported

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod oracle;

/// Re-export commonly used items.
pub mod prelude {
    pub use crate::fixtures::{all_scenarios, base_quote, ExpectedOutcome, FixtureDir, Scenario};
    pub use crate::generators::{
        apply_edits, clock_strategy, concurrent_pair_strategy, critical_diff_strategy,
        edit_strategy, field_value_strategy, quote_strategy, ConcurrentPair, Edit,
        PropTestConfig, LOCAL_DEVICE, ORIGIN_DEVICE, REMOTE_DEVICE,
    };
    pub use crate::oracle::{critical_divergences, one_sided_jobs};
}
