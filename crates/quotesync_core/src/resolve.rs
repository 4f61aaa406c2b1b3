//! Applying human choices to a pending merge.
//!
//! Resolution is all-or-nothing: every choice is validated against the report
//! and the pending quote before anything is applied, so an error never leaves
//! a partially resolved record behind.

use crate::clock::{Dot, VersionClock};
use crate::error::{MergeError, MergeResult};
use crate::path::FieldPath;
use crate::quote::Quote;
use crate::report::{Candidate, ConflictReport, Side};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A caller's decision for one reported path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Choice {
    /// Keep the local candidate.
    AdoptLocal,
    /// Take the remote candidate.
    AdoptRemote,
    /// Use an explicit value.
    Override(Candidate),
}

impl Choice {
    /// Adopts the candidate held by `side`.
    pub fn adopt(side: Side) -> Self {
        match side {
            Side::Local => Choice::AdoptLocal,
            Side::Remote => Choice::AdoptRemote,
        }
    }
}

/// One choice per reported path.
pub type ChoiceMap = BTreeMap<FieldPath, Choice>;

/// A fully resolved quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedQuote {
    /// The resolved record, stamped by the resolving device.
    pub quote: Quote,
    /// True if job or cost inputs changed and financials must be recomputed.
    pub recompute_financials: bool,
}

/// Applies caller choices to the output of a concurrent merge.
#[derive(Debug, Clone, Copy)]
pub struct ResolutionCoordinator<'a> {
    device_id: &'a str,
}

impl<'a> ResolutionCoordinator<'a> {
    /// Creates a coordinator resolving on behalf of `device_id`.
    pub fn new(device_id: &'a str) -> Self {
        Self { device_id }
    }

    /// Resolves `pending` with one choice per entry of `report`.
    ///
    /// # Errors
    ///
    /// - [`MergeError::QuoteMismatch`] if `pending` is not the reported quote
    /// - [`MergeError::IncompleteResolution`] if a reported path has no choice
    ///   or a choice names a path that was not reported
    /// - [`MergeError::InvalidChoice`] if an override does not fit its path
    pub fn resolve(
        &self,
        pending: &Quote,
        report: &ConflictReport,
        choices: &ChoiceMap,
    ) -> MergeResult<ResolvedQuote> {
        if pending.id != report.quote_id {
            return Err(MergeError::QuoteMismatch {
                expected: report.quote_id.to_string(),
                actual: pending.id.to_string(),
            });
        }

        check_totality(report, choices)?;

        let mut picks = Vec::with_capacity(report.entries.len());
        for entry in &report.entries {
            let choice = &choices[&entry.path];
            let picked = match choice {
                Choice::AdoptLocal => entry.local.clone(),
                Choice::AdoptRemote => entry.remote.clone(),
                Choice::Override(candidate) => {
                    if !candidate.fits(&entry.path) {
                        return Err(MergeError::invalid_choice(
                            entry.path.clone(),
                            format!("override {candidate} does not fit this path"),
                        ));
                    }
                    candidate.clone()
                }
            };
            if let FieldPath::JobField { job, .. } = &entry.path {
                if pending.job(job).is_none() {
                    return Err(MergeError::invalid_choice(
                        entry.path.clone(),
                        "job is missing from the pending quote",
                    ));
                }
            }
            picks.push((&entry.path, picked));
        }

        let mut quote = pending.clone();
        let mut clock = VersionClock::merge(&report.local_clock, &report.remote_clock);
        clock.merge_from(&pending.clock);
        let dot = clock.tick(self.device_id);

        for id in &report.restamp_jobs {
            if let Some(job) = quote.job_mut(id) {
                job.modified = dot.clone();
            }
        }
        for (path, picked) in picks {
            apply(&mut quote, path, picked, &dot);
        }

        quote.clock = clock;
        quote.modified_at = report.local_modified_at.max(report.remote_modified_at);
        quote.modified_by = self.device_id.to_string();

        tracing::debug!(
            quote = %quote.id,
            entries = report.entries.len(),
            clock = %quote.clock,
            "resolved pending merge"
        );

        Ok(ResolvedQuote {
            quote,
            recompute_financials: report.touches_cost(),
        })
    }
}

fn check_totality(report: &ConflictReport, choices: &ChoiceMap) -> MergeResult<()> {
    let reported: BTreeSet<&FieldPath> = report.paths().collect();
    let missing: Vec<FieldPath> = reported
        .iter()
        .filter(|p| !choices.contains_key(**p))
        .map(|p| (*p).clone())
        .collect();
    let unexpected: Vec<FieldPath> = choices
        .keys()
        .filter(|p| !reported.contains(p))
        .cloned()
        .collect();

    if missing.is_empty() && unexpected.is_empty() {
        Ok(())
    } else {
        Err(MergeError::IncompleteResolution {
            missing,
            unexpected,
        })
    }
}

fn apply(quote: &mut Quote, path: &FieldPath, picked: Candidate, dot: &Dot) {
    match (path, picked) {
        (FieldPath::Scalar(name), Candidate::Value(v)) => {
            quote.fields.insert(name.clone(), v);
        }
        (FieldPath::Scalar(name), _) => {
            quote.fields.remove(name);
        }
        (FieldPath::JobField { job, field }, picked) => {
            if let Some(j) = quote.job_mut(job) {
                match picked {
                    Candidate::Value(v) => {
                        j.params.insert(field.clone(), v);
                    }
                    _ => {
                        j.params.remove(field);
                    }
                }
                j.modified = dot.clone();
            }
        }
        (FieldPath::Job(id), Candidate::Job(mut job)) => {
            job.modified = dot.clone();
            match quote.job_mut(id) {
                Some(slot) => *slot = job,
                None => quote.jobs.push(job),
            }
        }
        (FieldPath::Job(id), _) => {
            quote.jobs.retain(|j| &j.id != id);
        }
        (FieldPath::Financials, _) => {}
    }
}
