//! Scalar field merge for concurrent quotes.

use crate::classify::{ClassificationTable, FieldClass, GapPolicy};
use crate::error::MergeResult;
use crate::path::FieldPath;
use crate::quote::Quote;
use crate::report::{AutoMerged, Candidate, ConflictEntry, ConflictKind, Side};
use crate::value::FieldValue;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

/// Result of merging the scalar fields of two concurrent quotes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMerge {
    /// Merged fields; critical conflicts hold the local value as placeholder.
    pub fields: BTreeMap<String, FieldValue>,
    /// Critical divergences, in field name order.
    pub entries: Vec<ConflictEntry>,
    /// Last-writer-wins decisions.
    pub auto_merged: Vec<AutoMerged>,
    /// True if a cost-affecting field diverged.
    pub cost_diverged: bool,
}

/// Merges scalar fields according to a classification table.
#[derive(Debug, Clone, Copy)]
pub struct FieldMerger<'a> {
    table: &'a ClassificationTable,
    policy: GapPolicy,
}

impl<'a> FieldMerger<'a> {
    /// Creates a merger over `table`.
    pub fn new(table: &'a ClassificationTable, policy: GapPolicy) -> Self {
        Self { table, policy }
    }

    /// Merges the scalar fields of two concurrent quotes.
    ///
    /// # Errors
    ///
    /// Returns [`MergeError::ClassificationGap`](crate::MergeError::ClassificationGap)
    /// for an unclassified field under [`GapPolicy::FailFast`].
    pub fn merge(&self, local: &Quote, remote: &Quote) -> MergeResult<FieldMerge> {
        let mut out = FieldMerge::default();
        let names: BTreeSet<&String> = local.fields.keys().chain(remote.fields.keys()).collect();

        for name in names {
            let path = FieldPath::scalar(name.as_str());
            let rule = self.table.rule_for(&path, self.policy)?;
            let (l, r) = (local.fields.get(name), remote.fields.get(name));

            if l == r {
                if let Some(v) = l {
                    out.fields.insert(name.clone(), v.clone());
                }
                continue;
            }

            match rule.class {
                FieldClass::System => {
                    if let Some(v) = l {
                        out.fields.insert(name.clone(), v.clone());
                    }
                }
                FieldClass::AutoMergeable => {
                    let winner = lww_winner(local, remote, l, r);
                    let value = match winner {
                        Side::Local => l,
                        Side::Remote => r,
                    };
                    if let Some(v) = value {
                        out.fields.insert(name.clone(), v.clone());
                    }
                    tracing::debug!(%path, %winner, "auto-merged field");
                    out.auto_merged.push(AutoMerged {
                        path,
                        winner,
                        value: Candidate::from_field(value),
                    });
                }
                FieldClass::Critical => {
                    if let Some(v) = l {
                        out.fields.insert(name.clone(), v.clone());
                    }
                    out.cost_diverged |= rule.affects_cost;
                    out.entries.push(ConflictEntry {
                        path,
                        class: rule.class,
                        affects_cost: rule.affects_cost,
                        kind: ConflictKind::Diverged,
                        local: Candidate::from_field(l),
                        remote: Candidate::from_field(r),
                        local_modified_at: local.modified_at,
                        remote_modified_at: remote.modified_at,
                    });
                }
            }
        }

        Ok(out)
    }
}

/// Picks the last writer between two differing values.
///
/// Later `modified_at` wins; ties go to the lexicographically greater
/// `modified_by`, then to the greater value (a present value beats an absent
/// one). Swapping the arguments yields the same value.
pub(crate) fn lww_winner(
    local: &Quote,
    remote: &Quote,
    l: Option<&FieldValue>,
    r: Option<&FieldValue>,
) -> Side {
    let ordering = local
        .modified_at
        .cmp(&remote.modified_at)
        .then_with(|| local.modified_by.cmp(&remote.modified_by))
        .then_with(|| l.cmp(&r));

    match ordering {
        Ordering::Less => Side::Remote,
        Ordering::Greater | Ordering::Equal => Side::Local,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::FieldRule;
    use crate::quote::QuoteId;
    use crate::MergeError;

    fn quote(device: &str, at: u64, fields: &[(&str, FieldValue)]) -> Quote {
        let mut q = Quote::create(QuoteId::new("Q"), device, 0);
        q.modified_at = at;
        for (name, value) in fields {
            q.fields.insert((*name).to_string(), value.clone());
        }
        q
    }

    fn merge(local: &Quote, remote: &Quote) -> FieldMerge {
        let table = ClassificationTable::standard();
        FieldMerger::new(&table, GapPolicy::FailFast)
            .merge(local, remote)
            .unwrap()
    }

    #[test]
    fn later_writer_wins_auto_field() {
        let local = quote("A", 100, &[("notes", "local".into())]);
        let remote = quote("B", 200, &[("notes", "remote".into())]);
        let out = merge(&local, &remote);

        assert!(out.entries.is_empty());
        assert_eq!(out.fields["notes"], FieldValue::text("remote"));
        assert_eq!(out.auto_merged.len(), 1);
        assert_eq!(out.auto_merged[0].winner, Side::Remote);
    }

    #[test]
    fn timestamp_tie_breaks_on_device() {
        let local = quote("B", 100, &[("notes", "from b".into())]);
        let remote = quote("A", 100, &[("notes", "from a".into())]);
        assert_eq!(merge(&local, &remote).fields["notes"], FieldValue::text("from b"));
        assert_eq!(merge(&remote, &local).fields["notes"], FieldValue::text("from b"));
    }

    #[test]
    fn critical_divergence_is_reported_not_guessed() {
        let local = quote("A", 500, &[("contact_email", "a@x.io".into())]);
        let remote = quote("B", 100, &[("contact_email", "b@x.io".into())]);
        let out = merge(&local, &remote);

        assert_eq!(out.entries.len(), 1);
        let entry = &out.entries[0];
        assert_eq!(entry.path, FieldPath::scalar("contact_email"));
        assert_eq!(entry.local, Candidate::Value("a@x.io".into()));
        assert_eq!(entry.remote, Candidate::Value("b@x.io".into()));
        assert_eq!((entry.local_modified_at, entry.remote_modified_at), (500, 100));
        assert!(!out.cost_diverged);
        assert_eq!(out.fields["contact_email"], FieldValue::text("a@x.io"));
    }

    #[test]
    fn cost_field_marks_divergence() {
        let local = quote("A", 1, &[("tax_rate", 2000.into())]);
        let remote = quote("B", 2, &[("tax_rate", 1500.into())]);
        let out = merge(&local, &remote);
        assert!(out.cost_diverged);
        assert!(out.entries[0].affects_cost);
    }

    #[test]
    fn field_set_on_one_side_only() {
        let local = quote("A", 1, &[]);
        let remote = quote("B", 2, &[("status", "sent".into()), ("notes", "n".into())]);
        let out = merge(&local, &remote);

        assert_eq!(out.entries.len(), 1);
        assert_eq!(out.entries[0].local, Candidate::Absent);
        assert!(!out.fields.contains_key("status"));
        assert_eq!(out.fields["notes"], FieldValue::text("n"));
    }

    #[test]
    fn equal_values_produce_nothing() {
        let local = quote("A", 1, &[("status", "draft".into()), ("notes", "x".into())]);
        let remote = quote("B", 2, &[("status", "draft".into()), ("notes", "x".into())]);
        let out = merge(&local, &remote);
        assert!(out.entries.is_empty());
        assert!(out.auto_merged.is_empty());
        assert_eq!(out.fields.len(), 2);
    }

    #[test]
    fn system_fields_keep_local() {
        let local = quote("A", 1, &[("created_by", "alice".into())]);
        let remote = quote("B", 2, &[("created_by", "bob".into())]);
        let out = merge(&local, &remote);
        assert!(out.entries.is_empty());
        assert_eq!(out.fields["created_by"], FieldValue::text("alice"));
    }

    #[test]
    fn unclassified_field_follows_policy() {
        let table = ClassificationTable::builder()
            .scalar("notes", FieldRule::AUTO)
            .build();
        let local = quote("A", 1, &[("fax", "1".into())]);
        let remote = quote("B", 2, &[("fax", "2".into())]);

        let err = FieldMerger::new(&table, GapPolicy::FailFast)
            .merge(&local, &remote)
            .unwrap_err();
        assert!(matches!(err, MergeError::ClassificationGap { .. }));

        let out = FieldMerger::new(&table, GapPolicy::TreatAsCritical)
            .merge(&local, &remote)
            .unwrap();
        assert_eq!(out.entries.len(), 1);
        assert_eq!(out.entries[0].class, FieldClass::Critical);
    }
}
