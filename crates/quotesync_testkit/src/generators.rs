//! Property-based test generators using proptest.
//!
//! Provides strategies for generating random clocks, values, quotes and
//! pairs of concurrently edited copies. Every generated field name is covered
//! by [`ClassificationTable::standard`](quotesync_core::ClassificationTable::standard),
//! so merges never hit a classification gap.

use proptest::prelude::*;
use quotesync_core::{FieldValue, JobId, Quote, QuoteId, VersionClock};
use std::collections::BTreeMap;

/// Device that created every generated quote.
pub const ORIGIN_DEVICE: &str = "O";
/// Device holding the local copy in generated pairs.
pub const LOCAL_DEVICE: &str = "L";
/// Device holding the remote copy in generated pairs.
pub const REMOTE_DEVICE: &str = "R";

/// Critical scalar fields of the standard table.
pub const CRITICAL_FIELDS: &[&str] = &[
    "customer_name",
    "contact_name",
    "contact_email",
    "contact_phone",
    "status",
    "valid_until",
    "currency",
    "discount_rate",
    "tax_rate",
];

/// Auto-mergeable scalar fields of the standard table.
pub const AUTO_FIELDS: &[&str] = &["notes", "internal_notes", "site_hint", "location_hint"];

/// Job parameters used by generated jobs.
pub const JOB_PARAMS: &[&str] = &["hours", "rate", "quantity", "description", "notes"];

/// Strategy for generating device ids.
pub fn device_id_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["A", "B", "C", "D", "E"]).prop_map(str::to_string)
}

/// Strategy for generating version clocks over a small device set.
pub fn clock_strategy() -> impl Strategy<Value = VersionClock> {
    prop::collection::btree_map(device_id_strategy(), 0i64..12, 0..5).prop_map(|counters| {
        VersionClock::from_counters(counters).expect("generated counters are non-negative")
    })
}

/// Strategy for generating field values.
pub fn field_value_strategy() -> impl Strategy<Value = FieldValue> {
    let leaf = prop_oneof![
        Just(FieldValue::Null),
        any::<bool>().prop_map(FieldValue::Bool),
        (-10_000i64..10_000).prop_map(FieldValue::Integer),
        "[a-z ]{0,12}".prop_map(FieldValue::Text),
    ];
    leaf.prop_recursive(2, 8, 4, |inner| {
        prop::collection::vec(inner, 0..4).prop_map(FieldValue::List)
    })
}

fn field_name_strategy() -> impl Strategy<Value = &'static str> {
    let names: Vec<&'static str> = CRITICAL_FIELDS.iter().chain(AUTO_FIELDS).copied().collect();
    prop::sample::select(names)
}

fn params_strategy() -> impl Strategy<Value = BTreeMap<String, FieldValue>> {
    prop::collection::btree_map(
        prop::sample::select(JOB_PARAMS.to_vec()).prop_map(str::to_string),
        field_value_strategy(),
        0..4,
    )
}

/// Strategy for generating a quote created and edited on [`ORIGIN_DEVICE`].
pub fn quote_strategy() -> impl Strategy<Value = Quote> {
    (
        prop::collection::btree_map(field_name_strategy(), field_value_strategy(), 0..8),
        prop::collection::vec((params_strategy(), 0i64..100_000), 0..4),
    )
        .prop_map(|(fields, jobs)| {
            let mut q = Quote::create(QuoteId::new("Q-prop"), ORIGIN_DEVICE, 1_000);
            let mut at = 1_000;
            for (name, value) in fields {
                at += 10;
                q.set_field(ORIGIN_DEVICE, at, name, value);
            }
            for (i, (params, total)) in jobs.into_iter().enumerate() {
                at += 10;
                q.add_job(ORIGIN_DEVICE, at, JobId::new(format!("J{i}")), params, total);
            }
            q
        })
}

/// One local edit to a quote.
#[derive(Debug, Clone)]
pub enum Edit {
    /// Set a scalar field.
    SetField {
        /// Field name.
        name: &'static str,
        /// New value.
        value: FieldValue,
    },
    /// Remove a scalar field.
    ClearField {
        /// Field name.
        name: &'static str,
    },
    /// Set a parameter on the job at `index` modulo the job count.
    SetJobParam {
        /// Job selector.
        index: usize,
        /// Parameter name.
        name: &'static str,
        /// New value.
        value: FieldValue,
    },
    /// Append a new job.
    AddJob {
        /// Initial parameters.
        params: BTreeMap<String, FieldValue>,
    },
    /// Remove the job at `index` modulo the job count.
    RemoveJob {
        /// Job selector.
        index: usize,
    },
}

/// Strategy for generating edits.
pub fn edit_strategy() -> impl Strategy<Value = Edit> {
    prop_oneof![
        4 => (field_name_strategy(), field_value_strategy())
            .prop_map(|(name, value)| Edit::SetField { name, value }),
        1 => field_name_strategy().prop_map(|name| Edit::ClearField { name }),
        3 => (any::<usize>(), prop::sample::select(JOB_PARAMS.to_vec()), field_value_strategy())
            .prop_map(|(index, name, value)| Edit::SetJobParam { index, name, value }),
        1 => params_strategy().prop_map(|params| Edit::AddJob { params }),
        1 => any::<usize>().prop_map(|index| Edit::RemoveJob { index }),
    ]
}

/// Applies `edits` on `device`, one clock tick each, starting at time `at`.
///
/// The first tick is always recorded, so the result is strictly newer than
/// the input even if every edit turns out to be a no-op.
pub fn apply_edits(quote: &mut Quote, device: &str, mut at: u64, edits: &[Edit]) {
    quote.record_edit(device, at);
    for (n, edit) in edits.iter().enumerate() {
        at += 7;
        match edit {
            Edit::SetField { name, value } => quote.set_field(device, at, *name, value.clone()),
            Edit::ClearField { name } => {
                quote.clear_field(device, at, name);
            }
            Edit::SetJobParam { index, name, value } => {
                if !quote.jobs.is_empty() {
                    let id = quote.jobs[index % quote.jobs.len()].id.clone();
                    quote.set_job_param(device, at, &id, *name, value.clone());
                }
            }
            Edit::AddJob { params } => {
                let id = JobId::new(format!("{device}-{n}"));
                quote.add_job(device, at, id, params.clone(), 0);
            }
            Edit::RemoveJob { index } => {
                if !quote.jobs.is_empty() {
                    let id = quote.jobs[index % quote.jobs.len()].id.clone();
                    quote.remove_job(device, at, &id);
                }
            }
        }
    }
}

/// Two copies of one quote edited concurrently on [`LOCAL_DEVICE`] and
/// [`REMOTE_DEVICE`] from a shared base.
#[derive(Debug, Clone)]
pub struct ConcurrentPair {
    /// The shared ancestor.
    pub base: Quote,
    /// Copy edited on [`LOCAL_DEVICE`].
    pub local: Quote,
    /// Copy edited on [`REMOTE_DEVICE`].
    pub remote: Quote,
}

/// Strategy for generating concurrently edited pairs.
pub fn concurrent_pair_strategy() -> impl Strategy<Value = ConcurrentPair> {
    (
        quote_strategy(),
        prop::collection::vec(edit_strategy(), 0..6),
        prop::collection::vec(edit_strategy(), 0..6),
        2_000u64..2_100,
        2_000u64..2_100,
    )
        .prop_map(|(base, local_edits, remote_edits, local_at, remote_at)| {
            let mut local = base.clone();
            let mut remote = base.clone();
            apply_edits(&mut local, LOCAL_DEVICE, local_at, &local_edits);
            apply_edits(&mut remote, REMOTE_DEVICE, remote_at, &remote_edits);
            ConcurrentPair {
                base,
                local,
                remote,
            }
        })
}

/// Strategy for generating a base quote and critical fields to diverge on,
/// each with a distinct local and remote value.
pub fn critical_diff_strategy(
) -> impl Strategy<Value = (Quote, Vec<(&'static str, FieldValue, FieldValue)>)> {
    let diffs = prop::collection::btree_map(
        prop::sample::select(CRITICAL_FIELDS.to_vec()),
        (field_value_strategy(), field_value_strategy())
            .prop_filter("sides must differ", |(l, r)| l != r),
        1..5,
    )
    .prop_map(|m| m.into_iter().map(|(k, (l, r))| (k, l, r)).collect::<Vec<_>>());
    (quote_strategy(), diffs)
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
