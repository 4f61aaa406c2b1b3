//! The merge engine facade.
//!
//! [`MergeEngine`] ties the pieces together: it compares clocks, dispatches
//! non-concurrent pairs to a wholesale replace, and runs the field and job
//! mergers on concurrent pairs.

use crate::causal::{compare, Relationship};
use crate::clock::VersionClock;
use crate::collection_merge::CollectionMerger;
use crate::config::MergeConfig;
use crate::error::{MergeError, MergeResult};
use crate::field_merge::FieldMerger;
use crate::quote::Quote;
use crate::report::{AutoMerged, ConflictReport, Side};
use crate::resolve::{ChoiceMap, ResolutionCoordinator, ResolvedQuote};
use serde::{Deserialize, Serialize};

/// A merge that completed without human input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedQuote {
    /// The merged record, stamped by the merging device.
    pub quote: Quote,
    /// Divergences settled by last-writer-wins or job set rules.
    pub auto_merged: Vec<AutoMerged>,
    /// True if financials must be recomputed before the record is shown.
    pub recompute_financials: bool,
}

/// Result of [`MergeEngine::attempt_merge`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeOutcome {
    /// The inputs are causally ordered; keep the given side verbatim.
    Replace(Side),
    /// The inputs were concurrent and merged silently.
    Merged(MergedQuote),
    /// The inputs were concurrent and some paths need a human choice.
    NeedsResolution {
        /// Merged record with local placeholders at every reported path.
        pending: Quote,
        /// What must be resolved.
        report: ConflictReport,
    },
}

impl MergeOutcome {
    /// Returns the record the caller should store, if the merge settled.
    ///
    /// `None` means a resolution is still required.
    pub fn settled(&self, local: &Quote, remote: &Quote) -> Option<Quote> {
        match self {
            MergeOutcome::Replace(Side::Local) => Some(local.clone()),
            MergeOutcome::Replace(Side::Remote) => Some(remote.clone()),
            MergeOutcome::Merged(merged) => Some(merged.quote.clone()),
            MergeOutcome::NeedsResolution { .. } => None,
        }
    }

    /// True if a resolution is required.
    pub fn needs_resolution(&self) -> bool {
        matches!(self, MergeOutcome::NeedsResolution { .. })
    }

    /// Short label for logs and CLI output.
    pub fn label(&self) -> &'static str {
        match self {
            MergeOutcome::Replace(Side::Local) => "keep_local",
            MergeOutcome::Replace(Side::Remote) => "adopt_remote",
            MergeOutcome::Merged(_) => "merged",
            MergeOutcome::NeedsResolution { .. } => "needs_resolution",
        }
    }
}

/// Causal conflict detection and merge for quotes.
///
/// The engine holds only immutable configuration. Every call is value in,
/// value out, so one engine may be shared across threads.
#[derive(Debug, Clone)]
pub struct MergeEngine {
    config: MergeConfig,
}

impl MergeEngine {
    /// Creates an engine.
    pub fn new(config: MergeConfig) -> Self {
        Self { config }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &MergeConfig {
        &self.config
    }

    /// Compares two clocks.
    pub fn compare_clocks(&self, a: &VersionClock, b: &VersionClock) -> Relationship {
        compare(a, b)
    }

    /// Reconciles the local copy of a quote with a remote copy.
    ///
    /// # Errors
    ///
    /// - [`MergeError::QuoteMismatch`] if the copies have different ids
    /// - [`MergeError::MalformedClock`] if the remote claims more edits by
    ///   this device than the local copy holds
    /// - [`MergeError::ClassificationGap`] for an unclassified field under
    ///   [`GapPolicy::FailFast`](crate::GapPolicy::FailFast)
    pub fn attempt_merge(&self, local: &Quote, remote: &Quote) -> MergeResult<MergeOutcome> {
        if local.id != remote.id {
            return Err(MergeError::QuoteMismatch {
                expected: local.id.to_string(),
                actual: remote.id.to_string(),
            });
        }

        let me = self.config.device_id.as_str();
        let (ours, theirs) = (local.clock.get(me), remote.clock.get(me));
        if theirs > ours {
            return Err(MergeError::malformed_clock(
                me,
                format!("remote has seen {theirs} local edits, local copy holds {ours}"),
            ));
        }

        let relationship = compare(&local.clock, &remote.clock);
        tracing::debug!(
            quote = %local.id,
            local = %local.clock,
            remote = %remote.clock,
            %relationship,
            "compared clocks"
        );

        match relationship {
            Relationship::Before => Ok(MergeOutcome::Replace(Side::Remote)),
            Relationship::After => Ok(MergeOutcome::Replace(Side::Local)),
            Relationship::Equal => {
                if local != remote {
                    tracing::warn!(
                        quote = %local.id,
                        clock = %local.clock,
                        "equal clocks with differing content, keeping local"
                    );
                }
                Ok(MergeOutcome::Replace(Side::Local))
            }
            Relationship::Concurrent => self.merge_concurrent(local, remote),
        }
    }

    /// Applies caller choices to a pending merge, stamped by this device.
    ///
    /// # Errors
    ///
    /// See [`ResolutionCoordinator::resolve`].
    pub fn resolve(
        &self,
        pending: &Quote,
        report: &ConflictReport,
        choices: &ChoiceMap,
    ) -> MergeResult<ResolvedQuote> {
        ResolutionCoordinator::new(&self.config.device_id).resolve(pending, report, choices)
    }

    fn merge_concurrent(&self, local: &Quote, remote: &Quote) -> MergeResult<MergeOutcome> {
        let table = self.config.classification.as_ref();
        let policy = self.config.gap_policy;

        let fields = FieldMerger::new(table, policy).merge(local, remote)?;
        let jobs = CollectionMerger::new(table, policy).merge(local, remote)?;

        let financials_flagged =
            fields.cost_diverged || jobs.cost_diverged || local.financials != remote.financials;

        let mut entries = fields.entries;
        entries.extend(jobs.entries);
        let mut auto_merged = fields.auto_merged;
        auto_merged.extend(jobs.auto_merged);

        let mut quote = local.clone();
        quote.fields = fields.fields;
        quote.jobs = jobs.jobs;

        if entries.is_empty() {
            quote.clock = VersionClock::merge(&local.clock, &remote.clock);
            let dot = quote.clock.tick(&self.config.device_id);
            for job in quote.jobs.iter_mut().filter(|j| jobs.restamp.contains(&j.id)) {
                job.modified = dot.clone();
            }
            quote.modified_at = local.modified_at.max(remote.modified_at);
            quote.modified_by = self.config.device_id.clone();

            tracing::debug!(
                quote = %quote.id,
                clock = %quote.clock,
                auto_merged = auto_merged.len(),
                financials_flagged,
                "merged concurrent edits"
            );
            return Ok(MergeOutcome::Merged(MergedQuote {
                quote,
                auto_merged,
                recompute_financials: financials_flagged,
            }));
        }

        tracing::debug!(
            quote = %quote.id,
            entries = entries.len(),
            auto_merged = auto_merged.len(),
            financials_flagged,
            "concurrent edits need resolution"
        );

        let report = ConflictReport {
            quote_id: local.id.clone(),
            local_clock: local.clock.clone(),
            remote_clock: remote.clock.clone(),
            local_modified_at: local.modified_at,
            remote_modified_at: remote.modified_at,
            entries,
            auto_merged,
            restamp_jobs: jobs.restamp.into_iter().collect(),
            financials_flagged,
        };
        Ok(MergeOutcome::NeedsResolution {
            pending: quote,
            report,
        })
    }
}
