//! Conflict reports produced by a concurrent merge.

use crate::classify::FieldClass;
use crate::clock::VersionClock;
use crate::path::FieldPath;
use crate::quote::{Job, JobId, QuoteId};
use crate::value::FieldValue;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the two inputs to a merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// The copy held by the merging device.
    Local,
    /// The copy received from elsewhere.
    Remote,
}

impl Side {
    /// The other side.
    pub fn opposite(self) -> Self {
        match self {
            Side::Local => Side::Remote,
            Side::Remote => Side::Local,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Local => f.write_str("local"),
            Side::Remote => f.write_str("remote"),
        }
    }
}

/// What one side holds at a conflicting path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Candidate {
    /// A field or parameter value.
    Value(FieldValue),
    /// A whole job (for job presence conflicts).
    Job(Job),
    /// Nothing: the field is unset or the job was removed.
    Absent,
}

impl Candidate {
    /// Wraps an optional field value.
    pub fn from_field(value: Option<&FieldValue>) -> Self {
        match value {
            Some(v) => Candidate::Value(v.clone()),
            None => Candidate::Absent,
        }
    }

    /// Wraps an optional job.
    pub fn from_job(job: Option<&Job>) -> Self {
        match job {
            Some(j) => Candidate::Job(j.clone()),
            None => Candidate::Absent,
        }
    }

    /// The field value, if this candidate holds one.
    pub fn as_value(&self) -> Option<&FieldValue> {
        match self {
            Candidate::Value(v) => Some(v),
            _ => None,
        }
    }

    /// True if this candidate can stand at `path`.
    pub fn fits(&self, path: &FieldPath) -> bool {
        match (path, self) {
            (_, Candidate::Absent) => !matches!(path, FieldPath::Financials),
            (FieldPath::Scalar(_) | FieldPath::JobField { .. }, Candidate::Value(_)) => true,
            (FieldPath::Job(id), Candidate::Job(job)) => &job.id == id,
            _ => false,
        }
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Candidate::Value(v) => write!(f, "{v}"),
            Candidate::Job(job) => write!(f, "job {} (edited {})", job.id, job.modified),
            Candidate::Absent => f.write_str("<absent>"),
        }
    }
}

/// Why an entry was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    /// Both sides hold different values.
    Diverged,
    /// One side removed a job the other side edited.
    RemovedVsEdited,
}

/// A single unresolved divergence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictEntry {
    /// Where the sides diverge.
    pub path: FieldPath,
    /// Classification of the path.
    pub class: FieldClass,
    /// True if resolving it changes the financials.
    pub affects_cost: bool,
    /// Why the entry was raised.
    pub kind: ConflictKind,
    /// The local candidate.
    pub local: Candidate,
    /// The remote candidate.
    pub remote: Candidate,
    /// Local last-modified timestamp.
    pub local_modified_at: u64,
    /// Remote last-modified timestamp.
    pub remote_modified_at: u64,
}

impl ConflictEntry {
    /// The candidate held by `side`.
    pub fn candidate(&self, side: Side) -> &Candidate {
        match side {
            Side::Local => &self.local,
            Side::Remote => &self.remote,
        }
    }
}

/// A divergence the merger settled on its own, kept for observability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoMerged {
    /// The settled path.
    pub path: FieldPath,
    /// Side whose state was adopted.
    pub winner: Side,
    /// The adopted state.
    pub value: Candidate,
}

/// Everything a concurrent merge could not settle on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictReport {
    /// The quote both inputs describe.
    pub quote_id: QuoteId,
    /// Clock of the local input.
    pub local_clock: VersionClock,
    /// Clock of the remote input.
    pub remote_clock: VersionClock,
    /// Local last-modified timestamp.
    pub local_modified_at: u64,
    /// Remote last-modified timestamp.
    pub remote_modified_at: u64,
    /// Unresolved entries, scalars first, then jobs in merged order.
    pub entries: Vec<ConflictEntry>,
    /// Divergences settled automatically.
    pub auto_merged: Vec<AutoMerged>,
    /// Jobs assembled from both sides; a resolution stamps them with its edit.
    #[serde(default)]
    pub restamp_jobs: Vec<JobId>,
    /// True if job or cost-affecting inputs diverged, so the financials of
    /// either side cannot be trusted.
    pub financials_flagged: bool,
}

impl ConflictReport {
    /// True if the merge completed silently.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of unresolved entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// The entry at `path`, if reported.
    pub fn entry(&self, path: &FieldPath) -> Option<&ConflictEntry> {
        self.entries.iter().find(|e| &e.path == path)
    }

    /// True if `path` was reported.
    pub fn contains(&self, path: &FieldPath) -> bool {
        self.entry(path).is_some()
    }

    /// Reported paths in report order.
    pub fn paths(&self) -> impl Iterator<Item = &FieldPath> {
        self.entries.iter().map(|e| &e.path)
    }

    /// True if resolving this report requires recomputing financials.
    pub fn touches_cost(&self) -> bool {
        self.financials_flagged
            || self
                .entries
                .iter()
                .any(|e| e.affects_cost || e.path.is_job_scoped())
    }
}
