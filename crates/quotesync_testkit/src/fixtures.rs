//! Reference scenarios and fixture files.
//!
//! The five scenarios below pin down the engine's behaviour on hand-picked
//! clock pairs. Each one carries the outcome it must produce so tests, the
//! CLI and property suites can share them.

use quotesync_core::{
    FieldPath, FieldValue, GapPolicy, JobId, MergeConfig, MergeEngine, MergeOutcome, Quote,
    QuoteId, Relationship, Side, VersionClock,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Device that merges in every scenario.
pub const SCENARIO_DEVICE: &str = "A";

/// What a scenario must produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpectedOutcome {
    /// One side is kept verbatim.
    Replace(Side),
    /// A silent merge with this many auto-merged paths.
    Merged {
        /// Number of auto-merged paths.
        auto_merged: usize,
    },
    /// A conflict report with exactly these entries.
    NeedsResolution {
        /// Reported paths, in report order.
        entries: Vec<FieldPath>,
        /// Number of auto-merged paths.
        auto_merged: usize,
    },
}

/// A local and a remote copy of one quote, and what merging them must yield.
#[derive(Debug, Clone)]
pub struct Scenario {
    /// Short identifier, also used for fixture file names.
    pub name: &'static str,
    /// What the scenario exercises.
    pub description: &'static str,
    /// Copy held by [`SCENARIO_DEVICE`].
    pub local: Quote,
    /// Copy received from elsewhere.
    pub remote: Quote,
    /// Expected clock relationship of local to remote.
    pub relationship: Relationship,
    /// Expected merge outcome.
    pub expected: ExpectedOutcome,
}

impl Scenario {
    /// Engine configured the way every scenario expects.
    pub fn engine(&self) -> MergeEngine {
        MergeEngine::new(MergeConfig::new(SCENARIO_DEVICE).with_gap_policy(GapPolicy::FailFast))
    }

    /// Paths the conflict report must hold; empty unless a resolution is
    /// expected.
    pub fn expected_entries(&self) -> Vec<FieldPath> {
        match &self.expected {
            ExpectedOutcome::NeedsResolution { entries, .. } => entries.clone(),
            _ => Vec::new(),
        }
    }

    /// Runs the scenario and compares the outcome with the expectation.
    ///
    /// # Errors
    ///
    /// Returns a description of the first mismatch.
    pub fn check(&self) -> Result<MergeOutcome, String> {
        let engine = self.engine();
        let relationship = engine.compare_clocks(&self.local.clock, &self.remote.clock);
        if relationship != self.relationship {
            return Err(format!(
                "{}: expected {}, compared {}",
                self.name, self.relationship, relationship
            ));
        }

        let outcome = engine
            .attempt_merge(&self.local, &self.remote)
            .map_err(|e| format!("{}: {e}", self.name))?;

        let matches = match (&self.expected, &outcome) {
            (ExpectedOutcome::Replace(want), MergeOutcome::Replace(got)) => want == got,
            (ExpectedOutcome::Merged { auto_merged }, MergeOutcome::Merged(merged)) => {
                merged.auto_merged.len() == *auto_merged
            }
            (
                ExpectedOutcome::NeedsResolution {
                    entries,
                    auto_merged,
                },
                MergeOutcome::NeedsResolution { report, .. },
            ) => report.paths().eq(entries.iter()) && report.auto_merged.len() == *auto_merged,
            _ => false,
        };

        if matches {
            Ok(outcome)
        } else {
            Err(format!(
                "{}: expected {:?}, got {}",
                self.name,
                self.expected,
                outcome.label()
            ))
        }
    }
}

fn clock(pairs: &[(&str, i64)]) -> VersionClock {
    VersionClock::from_counters(pairs.iter().map(|(d, c)| (*d, *c)))
        .expect("fixture clocks are well formed")
}

/// A quote both sides agreed on before going offline.
pub fn base_quote() -> Quote {
    let mut q = Quote::create(QuoteId::new("Q-1001"), SCENARIO_DEVICE, 1_700_000_000_000);
    q.fields
        .insert("customer_name".into(), FieldValue::text("Harbour Cafe"));
    q.fields
        .insert("contact_email".into(), FieldValue::text("owner@harbour.test"));
    q.fields.insert("status".into(), FieldValue::text("draft"));
    q.fields.insert("notes".into(), FieldValue::text("first visit"));
    q.fields.insert("tax_rate".into(), FieldValue::Integer(2000));

    let mut params = BTreeMap::new();
    params.insert("hours".to_string(), FieldValue::Integer(6));
    params.insert("rate".to_string(), FieldValue::Integer(9000));
    q.add_job(
        SCENARIO_DEVICE,
        1_700_000_000_100,
        JobId::new("J-install"),
        params,
        54_000,
    );
    q
}

fn copy(base: &Quote, pairs: &[(&str, i64)], at: u64, by: &str) -> Quote {
    let mut q = base.clone();
    q.clock = clock(pairs);
    q.modified_at = at;
    q.modified_by = by.to_string();
    q
}

/// Local is strictly newer: keep it.
pub fn local_newer() -> Scenario {
    let base = base_quote();
    let local = copy(&base, &[("A", 5), ("B", 2)], 1_700_000_500_000, "A");
    let mut remote = copy(&base, &[("A", 4), ("B", 2)], 1_700_000_400_000, "B");
    remote
        .fields
        .insert("status".into(), FieldValue::text("sent"));
    Scenario {
        name: "local-newer",
        description: "local {A:5,B:2} against remote {A:4,B:2}",
        local,
        remote,
        relationship: Relationship::After,
        expected: ExpectedOutcome::Replace(Side::Local),
    }
}

/// Remote is strictly newer: adopt it verbatim.
pub fn remote_newer() -> Scenario {
    let base = base_quote();
    let local = copy(&base, &[("A", 3), ("B", 4)], 1_700_000_300_000, "B");
    let mut remote = copy(&base, &[("A", 3), ("B", 5)], 1_700_000_600_000, "B");
    remote
        .fields
        .insert("contact_email".into(), FieldValue::text("accounts@harbour.test"));
    Scenario {
        name: "remote-newer",
        description: "local {A:3,B:4} against remote {A:3,B:5}",
        local,
        remote,
        relationship: Relationship::Before,
        expected: ExpectedOutcome::Replace(Side::Remote),
    }
}

/// Concurrent edits to low-stakes fields only: merge silently.
pub fn concurrent_auto_only() -> Scenario {
    let base = base_quote();
    let mut local = copy(&base, &[("A", 6), ("B", 2)], 1_700_000_600_000, "A");
    let mut remote = copy(&base, &[("A", 5), ("B", 4)], 1_700_000_700_000, "B");
    local
        .fields
        .insert("notes".into(), FieldValue::text("prefers mornings"));
    remote
        .fields
        .insert("notes".into(), FieldValue::text("side door code 4411"));
    remote
        .fields
        .insert("site_hint".into(), FieldValue::text("parking behind shop"));
    Scenario {
        name: "concurrent-auto",
        description: "local {A:6,B:2} against remote {A:5,B:4}, only auto fields differ",
        local,
        remote,
        relationship: Relationship::Concurrent,
        expected: ExpectedOutcome::Merged { auto_merged: 2 },
    }
}

/// Concurrent edits to a contact field and a job parameter.
pub fn concurrent_critical() -> Scenario {
    let base = base_quote();
    let mut local = copy(&base, &[("A", 10), ("B", 5)], 1_700_001_000_000, "A");
    let mut remote = copy(&base, &[("A", 9), ("B", 7)], 1_700_000_900_000, "B");
    local
        .fields
        .insert("contact_email".into(), FieldValue::text("chef@harbour.test"));
    remote
        .fields
        .insert("contact_email".into(), FieldValue::text("manager@harbour.test"));
    let job = JobId::new("J-install");
    if let Some(j) = local.job_mut(&job) {
        j.params.insert("hours".into(), FieldValue::Integer(8));
    }
    if let Some(j) = remote.job_mut(&job) {
        j.params.insert("hours".into(), FieldValue::Integer(5));
    }
    Scenario {
        name: "concurrent-critical",
        description: "local {A:10,B:5} against remote {A:9,B:7}, contact email and job hours differ",
        local,
        remote,
        relationship: Relationship::Concurrent,
        expected: ExpectedOutcome::NeedsResolution {
            entries: vec![
                FieldPath::scalar("contact_email"),
                FieldPath::job_field(job, "hours"),
            ],
            auto_merged: 0,
        },
    }
}

/// Three devices; one auto field and the workflow status differ.
pub fn three_devices() -> Scenario {
    let base = base_quote();
    let mut local = copy(&base, &[("A", 3), ("B", 2), ("C", 1)], 1_700_000_300_000, "A");
    let mut remote = copy(&base, &[("A", 2), ("B", 4), ("C", 3)], 1_700_000_350_000, "C");
    local
        .fields
        .insert("notes".into(), FieldValue::text("call ahead"));
    remote
        .fields
        .insert("notes".into(), FieldValue::text("ask for Sam"));
    local
        .fields
        .insert("status".into(), FieldValue::text("sent"));
    remote
        .fields
        .insert("status".into(), FieldValue::text("accepted"));
    Scenario {
        name: "three-devices",
        description: "{A:3,B:2,C:1} against {A:2,B:4,C:3}, notes and status differ",
        local,
        remote,
        relationship: Relationship::Concurrent,
        expected: ExpectedOutcome::NeedsResolution {
            entries: vec![FieldPath::scalar("status")],
            auto_merged: 1,
        },
    }
}

/// All reference scenarios, in order.
pub fn all_scenarios() -> Vec<Scenario> {
    vec![
        local_newer(),
        remote_newer(),
        concurrent_auto_only(),
        concurrent_critical(),
        three_devices(),
    ]
}

/// A temporary directory of JSON fixture files, removed on drop.
pub struct FixtureDir {
    dir: TempDir,
}

impl FixtureDir {
    /// Creates an empty fixture directory.
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Creates a directory holding `<name>.local.json` and
    /// `<name>.remote.json` for every reference scenario.
    pub fn with_scenarios() -> Self {
        let fixtures = Self::new();
        for scenario in all_scenarios() {
            fixtures.write_json(&format!("{}.local.json", scenario.name), &scenario.local);
            fixtures.write_json(&format!("{}.remote.json", scenario.name), &scenario.remote);
        }
        fixtures
    }

    /// The directory path.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path of a file inside the directory.
    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Writes `value` as pretty JSON and returns the file path.
    pub fn write_json<T: Serialize>(&self, name: &str, value: &T) -> PathBuf {
        let path = self.file(name);
        let json = serde_json::to_string_pretty(value).expect("Failed to encode fixture");
        std::fs::write(&path, json).expect("Failed to write fixture");
        path
    }

    /// Reads a JSON file from the directory.
    pub fn read_json<T: DeserializeOwned>(&self, name: &str) -> T {
        let json = std::fs::read_to_string(self.file(name)).expect("Failed to read fixture");
        serde_json::from_str(&json).expect("Failed to decode fixture")
    }
}

impl Default for FixtureDir {
    fn default() -> Self {
        Self::new()
    }
}
