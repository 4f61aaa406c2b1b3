//! Independent expectations for merge results.
//!
//! Recomputes, straight from a classification table and two quotes, which
//! paths a merge must put in front of a person. Property tests compare the
//! engine's reports against these sets.

use quotesync_core::{ClassificationTable, FieldClass, FieldPath, Quote};
use std::collections::BTreeSet;

/// Critical paths that differ between `local` and `remote`.
///
/// Covers scalar fields and parameters of jobs both sides hold. Job presence
/// conflicts are decided by clock coverage and are not included here.
pub fn critical_divergences(
    table: &ClassificationTable,
    local: &Quote,
    remote: &Quote,
) -> BTreeSet<FieldPath> {
    let mut out = BTreeSet::new();

    let names: BTreeSet<&String> = local.fields.keys().chain(remote.fields.keys()).collect();
    for name in names {
        if local.fields.get(name) == remote.fields.get(name) {
            continue;
        }
        if matches!(table.scalar(name), Some(rule) if rule.class == FieldClass::Critical) {
            out.insert(FieldPath::scalar(name.as_str()));
        }
    }

    for l in &local.jobs {
        let Some(r) = remote.job(&l.id) else {
            continue;
        };
        let params: BTreeSet<&String> = l.params.keys().chain(r.params.keys()).collect();
        for name in params {
            if l.params.get(name) == r.params.get(name) {
                continue;
            }
            if matches!(table.job_field(name), Some(rule) if rule.class == FieldClass::Critical) {
                out.insert(FieldPath::job_field(l.id.clone(), name.as_str()));
            }
        }
    }

    out
}

/// Jobs held by exactly one side.
pub fn one_sided_jobs(local: &Quote, remote: &Quote) -> BTreeSet<FieldPath> {
    let l = local.job_index();
    let r = remote.job_index();
    l.keys()
        .filter(|id| !r.contains_key(*id))
        .chain(r.keys().filter(|id| !l.contains_key(*id)))
        .map(|id| FieldPath::Job((*id).clone()))
        .collect()
}
