//! The quote record and its job sub-records.
//!
//! A [`Quote`] is the unit the engine merges. Each local edit goes through one
//! of the editing helpers, which bump the editing device's own counter exactly
//! once and stamp the modification time.

use crate::clock::{Dot, VersionClock};
use crate::value::FieldValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Stable identifier of a quote.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuoteId(String);

impl QuoteId {
    /// Wraps an existing identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh random identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QuoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stable identifier of a job. Never derived from list position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Wraps an existing identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh random identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A line of work on a quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    /// Stable identity.
    pub id: JobId,
    /// The edit that created the job.
    pub created: Dot,
    /// The most recent edit to the job.
    pub modified: Dot,
    /// Pricing parameters and descriptive fields.
    #[serde(default)]
    pub params: BTreeMap<String, FieldValue>,
    /// Derived total in minor units.
    #[serde(default)]
    pub total: i64,
}

impl Job {
    /// Creates a job stamped with the edit that created it.
    pub fn new(id: JobId, created: Dot) -> Self {
        Self {
            id,
            modified: created.clone(),
            created,
            params: BTreeMap::new(),
            total: 0,
        }
    }

    /// Sets a parameter, builder-style.
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Sets the derived total, builder-style.
    pub fn with_total(mut self, total: i64) -> Self {
        self.total = total;
        self
    }

    /// Compares the job's content, ignoring its causal stamps.
    pub fn content_eq(&self, other: &Job) -> bool {
        self.params == other.params && self.total == other.total
    }

    /// Returns a parameter value.
    pub fn param(&self, name: &str) -> Option<&FieldValue> {
        self.params.get(name)
    }
}

/// Derived money totals, in minor units.
///
/// Never merged field by field: after any job or cost-affecting merge the
/// caller recomputes it with its pricing rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Financials {
    /// Sum of job totals.
    pub subtotal: i64,
    /// Discount applied to the subtotal.
    pub discount: i64,
    /// Tax on the discounted subtotal.
    pub tax: i64,
    /// Amount payable.
    pub total: i64,
}

/// A price quote as exchanged between devices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    /// Stable identity.
    pub id: QuoteId,
    /// Causal history of the record.
    pub clock: VersionClock,
    /// Creation time in milliseconds since the Unix epoch.
    pub created_at: u64,
    /// Last modification time in milliseconds since the Unix epoch.
    pub modified_at: u64,
    /// Device that made the last modification.
    pub modified_by: String,
    /// Scalar fields by name.
    #[serde(default)]
    pub fields: BTreeMap<String, FieldValue>,
    /// Jobs, in display order.
    #[serde(default)]
    pub jobs: Vec<Job>,
    /// Derived totals.
    #[serde(default)]
    pub financials: Financials,
}

impl Quote {
    /// Creates a new quote on `device` at time `now`.
    pub fn create(id: QuoteId, device: &str, now: u64) -> Self {
        Self {
            id,
            clock: VersionClock::origin(device),
            created_at: now,
            modified_at: now,
            modified_by: device.to_string(),
            fields: BTreeMap::new(),
            jobs: Vec::new(),
            financials: Financials::default(),
        }
    }

    /// Records one local edit made on `device` at `at`, returning its dot.
    pub fn record_edit(&mut self, device: &str, at: u64) -> Dot {
        self.modified_at = at;
        self.modified_by = device.to_string();
        self.clock.tick(device)
    }

    /// Sets a scalar field as one local edit.
    pub fn set_field(
        &mut self,
        device: &str,
        at: u64,
        name: impl Into<String>,
        value: impl Into<FieldValue>,
    ) {
        self.record_edit(device, at);
        self.fields.insert(name.into(), value.into());
    }

    /// Removes a scalar field as one local edit.
    pub fn clear_field(&mut self, device: &str, at: u64, name: &str) -> Option<FieldValue> {
        self.record_edit(device, at);
        self.fields.remove(name)
    }

    /// Appends a job as one local edit and returns its id.
    pub fn add_job(
        &mut self,
        device: &str,
        at: u64,
        id: JobId,
        params: BTreeMap<String, FieldValue>,
        total: i64,
    ) -> JobId {
        let dot = self.record_edit(device, at);
        let mut job = Job::new(id.clone(), dot);
        job.params = params;
        job.total = total;
        self.jobs.push(job);
        id
    }

    /// Changes a job parameter as one local edit.
    ///
    /// Returns false, without recording an edit, if the job does not exist.
    pub fn set_job_param(
        &mut self,
        device: &str,
        at: u64,
        id: &JobId,
        name: impl Into<String>,
        value: impl Into<FieldValue>,
    ) -> bool {
        if self.job(id).is_none() {
            return false;
        }
        let dot = self.record_edit(device, at);
        if let Some(job) = self.job_mut(id) {
            job.params.insert(name.into(), value.into());
            job.modified = dot;
        }
        true
    }

    /// Removes a job as one local edit.
    pub fn remove_job(&mut self, device: &str, at: u64, id: &JobId) -> Option<Job> {
        let index = self.jobs.iter().position(|j| &j.id == id)?;
        self.record_edit(device, at);
        Some(self.jobs.remove(index))
    }

    /// Looks up a job by id.
    pub fn job(&self, id: &JobId) -> Option<&Job> {
        self.jobs.iter().find(|j| &j.id == id)
    }

    /// Looks up a job by id, mutably.
    pub fn job_mut(&mut self, id: &JobId) -> Option<&mut Job> {
        self.jobs.iter_mut().find(|j| &j.id == id)
    }

    /// Jobs keyed by id.
    pub fn job_index(&self) -> BTreeMap<&JobId, &Job> {
        self.jobs.iter().map(|j| (&j.id, j)).collect()
    }

    /// Returns a scalar field value.
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_stamps_origin() {
        let q = Quote::create(QuoteId::new("Q1"), "tablet", 1_000);
        assert_eq!(q.clock.get("tablet"), 1);
        assert_eq!(q.created_at, 1_000);
        assert_eq!(q.modified_by, "tablet");
    }

    #[test]
    fn generated_ids_are_distinct() {
        assert_ne!(QuoteId::generate(), QuoteId::generate());
        let job = JobId::generate();
        assert_eq!(job.as_str().len(), 36);
    }

    #[test]
    fn each_edit_bumps_own_counter_once() {
        let mut q = Quote::create(QuoteId::new("Q1"), "A", 0);
        q.set_field("B", 10, "notes", "hello");
        assert_eq!(q.clock.get("A"), 1);
        assert_eq!(q.clock.get("B"), 1);
        assert_eq!(q.modified_at, 10);
        assert_eq!(q.modified_by, "B");

        let id = q.add_job("B", 20, JobId::new("J1"), BTreeMap::new(), 0);
        assert_eq!(q.clock.get("B"), 2);
        assert_eq!(q.job(&id).unwrap().created, Dot::new("B", 2));

        assert!(q.set_job_param("A", 30, &id, "hours", 4));
        assert_eq!(q.clock.get("A"), 2);
        assert_eq!(q.job(&id).unwrap().modified, Dot::new("A", 2));
        assert_eq!(q.job(&id).unwrap().created, Dot::new("B", 2));
    }

    #[test]
    fn editing_missing_job_records_nothing() {
        let mut q = Quote::create(QuoteId::new("Q1"), "A", 0);
        assert!(!q.set_job_param("A", 5, &JobId::new("nope"), "hours", 1));
        assert!(q.remove_job("A", 5, &JobId::new("nope")).is_none());
        assert_eq!(q.clock.get("A"), 1);
        assert_eq!(q.modified_at, 0);
    }

    #[test]
    fn content_eq_ignores_stamps() {
        let a = Job::new(JobId::new("J"), Dot::new("A", 1)).with_param("hours", 2);
        let mut b = a.clone();
        b.modified = Dot::new("B", 9);
        assert!(a.content_eq(&b));
        b.total = 5;
        assert!(!a.content_eq(&b));
    }

    #[test]
    fn json_round_trip_keeps_job_order() {
        let mut q = Quote::create(QuoteId::new("Q1"), "A", 0);
        q.add_job("A", 1, JobId::new("z"), BTreeMap::new(), 10);
        q.add_job("A", 2, JobId::new("a"), BTreeMap::new(), 20);
        let json = serde_json::to_string(&q).unwrap();
        let back: Quote = serde_json::from_str(&json).unwrap();
        assert_eq!(back, q);
        assert_eq!(back.jobs[0].id, JobId::new("z"));
    }
}
