//! Identity-keyed merge of a quote's jobs.
//!
//! Jobs are matched by [`JobId`] through keyed maps, never by list position,
//! so reordering on either side cannot produce spurious conflicts.
//!
//! A job present on only one side is either an addition (the other side never
//! observed its creation) or a removal (the other side observed it and no
//! longer holds it). A removal is adopted only if the removing side had also
//! observed the job's last edit; otherwise the removal raced an edit and is
//! reported as [`ConflictKind::RemovedVsEdited`].

use crate::classify::{ClassificationTable, FieldClass, GapPolicy};
use crate::error::MergeResult;
use crate::field_merge::lww_winner;
use crate::path::FieldPath;
use crate::quote::{Job, JobId, Quote};
use crate::report::{AutoMerged, Candidate, ConflictEntry, ConflictKind, Side};
use std::collections::BTreeSet;

/// Result of merging the jobs of two concurrent quotes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobMerge {
    /// Merged jobs: local order first, then remote-only jobs in remote order.
    pub jobs: Vec<Job>,
    /// Unresolved job conflicts, in merged order.
    pub entries: Vec<ConflictEntry>,
    /// Additions, removals and parameters settled automatically.
    pub auto_merged: Vec<AutoMerged>,
    /// Jobs whose merged state was assembled from both sides and must be
    /// stamped with the merging edit.
    pub restamp: BTreeSet<JobId>,
    /// True if the job set or any job's content differs between the sides.
    pub cost_diverged: bool,
}

/// Merges job collections by stable identity.
#[derive(Debug, Clone, Copy)]
pub struct CollectionMerger<'a> {
    table: &'a ClassificationTable,
    policy: GapPolicy,
}

impl<'a> CollectionMerger<'a> {
    /// Creates a merger over `table`.
    pub fn new(table: &'a ClassificationTable, policy: GapPolicy) -> Self {
        Self { table, policy }
    }

    /// Merges the jobs of two concurrent quotes.
    ///
    /// # Errors
    ///
    /// Returns [`MergeError::ClassificationGap`](crate::MergeError::ClassificationGap)
    /// for an unclassified job parameter under [`GapPolicy::FailFast`].
    pub fn merge(&self, local: &Quote, remote: &Quote) -> MergeResult<JobMerge> {
        let local_jobs = local.job_index();
        let remote_jobs = remote.job_index();
        let mut out = JobMerge::default();

        let order = local
            .jobs
            .iter()
            .map(|j| &j.id)
            .chain(remote.jobs.iter().map(|j| &j.id).filter(|id| !local_jobs.contains_key(id)));

        for id in order {
            match (local_jobs.get(id), remote_jobs.get(id)) {
                (Some(l), Some(r)) => self.merge_shared(local, remote, l, r, &mut out)?,
                (Some(l), None) => one_sided(Side::Local, l, remote, local, &mut out),
                (None, Some(r)) => one_sided(Side::Remote, r, local, remote, &mut out),
                (None, None) => {}
            }
        }

        Ok(out)
    }

    fn merge_shared(
        &self,
        local: &Quote,
        remote: &Quote,
        l: &Job,
        r: &Job,
        out: &mut JobMerge,
    ) -> MergeResult<()> {
        if l.content_eq(r) {
            if l.modified != r.modified {
                out.restamp.insert(l.id.clone());
            }
            out.jobs.push(l.clone());
            return Ok(());
        }

        out.cost_diverged = true;
        out.restamp.insert(l.id.clone());
        let mut merged = l.clone();
        let names: BTreeSet<&String> = l.params.keys().chain(r.params.keys()).collect();

        for name in names {
            let (lv, rv) = (l.params.get(name), r.params.get(name));
            if lv == rv {
                continue;
            }
            let path = FieldPath::job_field(l.id.clone(), name.as_str());
            let rule = self.table.rule_for(&path, self.policy)?;

            match rule.class {
                FieldClass::System => {}
                FieldClass::AutoMergeable => {
                    let winner = lww_winner(local, remote, lv, rv);
                    let value = match winner {
                        Side::Local => lv,
                        Side::Remote => rv,
                    };
                    match value {
                        Some(v) => merged.params.insert(name.clone(), v.clone()),
                        None => merged.params.remove(name),
                    };
                    out.auto_merged.push(AutoMerged {
                        path,
                        winner,
                        value: Candidate::from_field(value),
                    });
                }
                FieldClass::Critical => {
                    out.entries.push(ConflictEntry {
                        path,
                        class: rule.class,
                        affects_cost: rule.affects_cost,
                        kind: ConflictKind::Diverged,
                        local: Candidate::from_field(lv),
                        remote: Candidate::from_field(rv),
                        local_modified_at: local.modified_at,
                        remote_modified_at: remote.modified_at,
                    });
                }
            }
        }

        out.jobs.push(merged);
        Ok(())
    }
}

/// Handles a job held only by `holder_side`.
fn one_sided(holder_side: Side, job: &Job, other: &Quote, holder: &Quote, out: &mut JobMerge) {
    let path = FieldPath::Job(job.id.clone());
    out.cost_diverged = true;

    if !other.clock.covers(&job.created) {
        tracing::debug!(%path, side = %holder_side, "job added on one side");
        if holder_side == Side::Remote {
            out.auto_merged.push(AutoMerged {
                path,
                winner: Side::Remote,
                value: Candidate::Job(job.clone()),
            });
        }
        out.jobs.push(job.clone());
        return;
    }

    if other.clock.covers(&job.modified) {
        tracing::debug!(%path, removed_by = %holder_side.opposite(), "adopting job removal");
        out.auto_merged.push(AutoMerged {
            path,
            winner: holder_side.opposite(),
            value: Candidate::Absent,
        });
        return;
    }

    tracing::debug!(%path, "job removed on one side and edited on the other");
    let held = Candidate::Job(job.clone());
    let (local, remote, local_at, remote_at) = match holder_side {
        Side::Local => (held, Candidate::Absent, holder.modified_at, other.modified_at),
        Side::Remote => (Candidate::Absent, held, other.modified_at, holder.modified_at),
    };
    out.entries.push(ConflictEntry {
        path,
        class: FieldClass::Critical,
        affects_cost: true,
        kind: ConflictKind::RemovedVsEdited,
        local,
        remote,
        local_modified_at: local_at,
        remote_modified_at: remote_at,
    });
    out.jobs.push(job.clone());
}
