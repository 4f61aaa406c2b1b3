//! Configuration for the merge engine.

use crate::classify::{ClassificationTable, GapPolicy};
use std::sync::Arc;

/// Configuration for a [`MergeEngine`](crate::MergeEngine).
#[derive(Debug, Clone)]
pub struct MergeConfig {
    /// Device performing merges and resolutions; its counter is the one
    /// incremented on every merged or resolved record.
    pub device_id: String,
    /// Field classification, shared and immutable.
    pub classification: Arc<ClassificationTable>,
    /// Handling of fields missing from the classification.
    pub gap_policy: GapPolicy,
}

impl MergeConfig {
    /// Creates a configuration for `device_id` with the standard table.
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            classification: Arc::new(ClassificationTable::standard()),
            gap_policy: GapPolicy::default(),
        }
    }

    /// Sets the classification table.
    #[must_use]
    pub fn with_classification(mut self, table: ClassificationTable) -> Self {
        self.classification = Arc::new(table);
        self
    }

    /// Shares an existing classification table.
    #[must_use]
    pub fn with_shared_classification(mut self, table: Arc<ClassificationTable>) -> Self {
        self.classification = table;
        self
    }

    /// Sets the gap policy.
    #[must_use]
    pub fn with_gap_policy(mut self, policy: GapPolicy) -> Self {
        self.gap_policy = policy;
        self
    }
}
