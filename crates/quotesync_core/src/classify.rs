//! Static classification of quote fields.
//!
//! The table is an immutable value injected into the merger through
//! [`MergeConfig`](crate::MergeConfig); there is no global classification
//! state. Lookups that miss are handled according to a [`GapPolicy`].

use crate::error::{MergeError, MergeResult};
use crate::path::FieldPath;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Merge class of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldClass {
    /// Owned by the caller; never conflicts, local value kept.
    System,
    /// Low-stakes; last writer wins.
    AutoMergeable,
    /// Must be chosen by a human when both sides differ.
    Critical,
}

impl fmt::Display for FieldClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FieldClass::System => "system",
            FieldClass::AutoMergeable => "auto-mergeable",
            FieldClass::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// How a single field is merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRule {
    /// Merge class.
    pub class: FieldClass,
    /// True if the field feeds the pricing formulas directly.
    #[serde(default)]
    pub affects_cost: bool,
}

impl FieldRule {
    /// A system field.
    pub const SYSTEM: FieldRule = FieldRule::new(FieldClass::System, false);
    /// An auto-mergeable field.
    pub const AUTO: FieldRule = FieldRule::new(FieldClass::AutoMergeable, false);
    /// A critical field that does not affect cost.
    pub const CRITICAL: FieldRule = FieldRule::new(FieldClass::Critical, false);
    /// A critical, cost-affecting field.
    pub const COST: FieldRule = FieldRule::new(FieldClass::Critical, true);

    /// Creates a rule.
    pub const fn new(class: FieldClass, affects_cost: bool) -> Self {
        Self {
            class,
            affects_cost,
        }
    }
}

/// What to do with a field the table does not cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapPolicy {
    /// Return [`MergeError::ClassificationGap`].
    FailFast,
    /// Log a warning and classify the field as critical.
    TreatAsCritical,
}

impl Default for GapPolicy {
    /// Fail fast in debug builds, fail safe in release builds.
    fn default() -> Self {
        if cfg!(debug_assertions) {
            GapPolicy::FailFast
        } else {
            GapPolicy::TreatAsCritical
        }
    }
}

/// Classification of every field a quote may carry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationTable {
    #[serde(default)]
    scalars: BTreeMap<String, FieldRule>,
    #[serde(default)]
    job_fields: BTreeMap<String, FieldRule>,
    #[serde(default)]
    job_default: Option<FieldRule>,
}

impl ClassificationTable {
    /// Starts building a table.
    pub fn builder() -> ClassificationBuilder {
        ClassificationBuilder::default()
    }

    /// The table used by the quoting product.
    pub fn standard() -> Self {
        Self::builder()
            .scalar("id", FieldRule::SYSTEM)
            .scalar("created_at", FieldRule::SYSTEM)
            .scalar("created_by", FieldRule::SYSTEM)
            .scalar("version", FieldRule::SYSTEM)
            .scalar("notes", FieldRule::AUTO)
            .scalar("internal_notes", FieldRule::AUTO)
            .scalar("site_hint", FieldRule::AUTO)
            .scalar("location_hint", FieldRule::AUTO)
            .scalar("customer_name", FieldRule::CRITICAL)
            .scalar("contact_name", FieldRule::CRITICAL)
            .scalar("contact_email", FieldRule::CRITICAL)
            .scalar("contact_phone", FieldRule::CRITICAL)
            .scalar("status", FieldRule::CRITICAL)
            .scalar("valid_until", FieldRule::CRITICAL)
            .scalar("currency", FieldRule::COST)
            .scalar("discount_rate", FieldRule::COST)
            .scalar("tax_rate", FieldRule::COST)
            .job_field("notes", FieldRule::AUTO)
            .job_field("description", FieldRule::CRITICAL)
            .job_default(FieldRule::COST)
            .build()
    }

    /// Rule for a scalar field, if classified.
    pub fn scalar(&self, name: &str) -> Option<FieldRule> {
        self.scalars.get(name).copied()
    }

    /// Rule for a job parameter, falling back to the job default.
    pub fn job_field(&self, name: &str) -> Option<FieldRule> {
        self.job_fields.get(name).copied().or(self.job_default)
    }

    /// Looks up the rule for `path`, applying `policy` on a miss.
    ///
    /// Job presence and financials are always critical and cost-affecting.
    ///
    /// # Errors
    ///
    /// Returns [`MergeError::ClassificationGap`] for an unclassified field
    /// under [`GapPolicy::FailFast`].
    pub fn rule_for(&self, path: &FieldPath, policy: GapPolicy) -> MergeResult<FieldRule> {
        let found = match path {
            FieldPath::Scalar(name) => self.scalar(name),
            FieldPath::JobField { field, .. } => self.job_field(field),
            FieldPath::Job(_) | FieldPath::Financials => Some(FieldRule::COST),
        };

        match (found, policy) {
            (Some(rule), _) => Ok(rule),
            (None, GapPolicy::FailFast) => Err(MergeError::ClassificationGap { path: path.clone() }),
            (None, GapPolicy::TreatAsCritical) => {
                tracing::warn!(%path, "unclassified field, treating as critical");
                Ok(FieldRule::COST)
            }
        }
    }

    /// Number of explicitly classified scalar fields.
    pub fn scalar_count(&self) -> usize {
        self.scalars.len()
    }
}

/// Builder for [`ClassificationTable`].
#[derive(Debug, Default)]
pub struct ClassificationBuilder {
    table: ClassificationTable,
}

impl ClassificationBuilder {
    /// Classifies a scalar field.
    #[must_use]
    pub fn scalar(mut self, name: impl Into<String>, rule: FieldRule) -> Self {
        self.table.scalars.insert(name.into(), rule);
        self
    }

    /// Classifies a named job parameter.
    #[must_use]
    pub fn job_field(mut self, name: impl Into<String>, rule: FieldRule) -> Self {
        self.table.job_fields.insert(name.into(), rule);
        self
    }

    /// Classifies every job parameter without its own rule.
    #[must_use]
    pub fn job_default(mut self, rule: FieldRule) -> Self {
        self.table.job_default = Some(rule);
        self
    }

    /// Finishes the table.
    pub fn build(self) -> ClassificationTable {
        self.table
    }
}
