//! Property tests for the merge engine.

use proptest::prelude::*;
use quotesync_core::{
    compare_clocks, to_canonical_bytes, Choice, ChoiceMap, ClassificationTable, FieldPath,
    MergeConfig, MergeEngine, MergeError, MergeOutcome, Relationship, Side, VersionClock,
};
use quotesync_testkit::prelude::*;
use std::collections::BTreeSet;

fn engine(device: &str) -> MergeEngine {
    MergeEngine::new(MergeConfig::new(device))
}

proptest! {
    #![proptest_config(PropTestConfig::default().to_proptest_config())]

    #[test]
    fn compare_is_reflexive(a in clock_strategy()) {
        prop_assert_eq!(compare_clocks(&a, &a), Relationship::Equal);
    }

    #[test]
    fn compare_is_antisymmetric(a in clock_strategy(), b in clock_strategy()) {
        prop_assert_eq!(compare_clocks(&a, &b), compare_clocks(&b, &a).reverse());
    }

    #[test]
    fn clock_merge_is_a_commutative_upper_bound(a in clock_strategy(), b in clock_strategy()) {
        let ab = VersionClock::merge(&a, &b);
        prop_assert_eq!(&ab, &VersionClock::merge(&b, &a));
        prop_assert!(a.precedes_or_equals(&ab));
        prop_assert!(b.precedes_or_equals(&ab));
        prop_assert_eq!(VersionClock::merge(&ab, &a), ab.clone());
    }
}

proptest! {
    #![proptest_config(PropTestConfig::quick().to_proptest_config())]

    #[test]
    fn merging_a_copy_with_itself_keeps_it(q in quote_strategy()) {
        let outcome = engine(LOCAL_DEVICE).attempt_merge(&q, &q).unwrap();
        prop_assert_eq!(outcome, MergeOutcome::Replace(Side::Local));
    }

    #[test]
    fn ordered_copies_are_replaced_not_merged(
        base in quote_strategy(),
        edits in prop::collection::vec(edit_strategy(), 0..6),
    ) {
        let mut edited = base.clone();
        apply_edits(&mut edited, LOCAL_DEVICE, 3_000, &edits);

        let keep = engine(LOCAL_DEVICE).attempt_merge(&edited, &base).unwrap();
        prop_assert_eq!(keep, MergeOutcome::Replace(Side::Local));

        let adopt = engine(REMOTE_DEVICE).attempt_merge(&base, &edited).unwrap();
        prop_assert_eq!(adopt, MergeOutcome::Replace(Side::Remote));

        // A remote that has seen more of our edits than we hold is corrupt.
        let corrupt = engine(LOCAL_DEVICE).attempt_merge(&base, &edited);
        prop_assert!(
            matches!(corrupt, Err(MergeError::MalformedClock { .. })),
            "expected MalformedClock, got {:?}",
            corrupt
        );
    }

    #[test]
    fn critical_divergence_is_always_reported(pair in concurrent_pair_strategy()) {
        let table = ClassificationTable::standard();
        let expected = critical_divergences(&table, &pair.local, &pair.remote);
        let one_sided = one_sided_jobs(&pair.local, &pair.remote);

        match engine(LOCAL_DEVICE).attempt_merge(&pair.local, &pair.remote).unwrap() {
            MergeOutcome::NeedsResolution { report, .. } => {
                let reported: BTreeSet<FieldPath> = report.paths().cloned().collect();
                for path in &reported {
                    match path {
                        FieldPath::Job(_) => prop_assert!(one_sided.contains(path), "{}", path),
                        _ => prop_assert!(expected.contains(path), "{} not critical", path),
                    }
                }
                for path in &expected {
                    prop_assert!(reported.contains(path), "{} missing", path);
                }
            }
            MergeOutcome::Merged(_) => prop_assert!(expected.is_empty()),
            other => prop_assert!(false, "concurrent pair gave {}", other.label()),
        }
    }

    #[test]
    fn chosen_critical_fields_are_reported(
        (base, diffs) in critical_diff_strategy(),
    ) {
        let mut local = base.clone();
        let mut remote = base;
        local.record_edit(LOCAL_DEVICE, 4_000);
        remote.record_edit(REMOTE_DEVICE, 4_000);
        for (name, l, r) in &diffs {
            local.set_field(LOCAL_DEVICE, 4_001, *name, l.clone());
            remote.set_field(REMOTE_DEVICE, 4_001, *name, r.clone());
        }

        let outcome = engine(LOCAL_DEVICE).attempt_merge(&local, &remote).unwrap();
        let MergeOutcome::NeedsResolution { pending, report } = outcome else {
            return Err(TestCaseError::fail("critical edits merged silently"));
        };
        for (name, l, _) in &diffs {
            let path = FieldPath::scalar(*name);
            prop_assert!(report.contains(&path), "{} missing", path);
            // Local value held as placeholder until resolved.
            prop_assert_eq!(pending.field(name), Some(l));
        }
    }

    #[test]
    fn resolution_requires_every_path(
        pair in concurrent_pair_strategy(),
        picks in prop::collection::vec(any::<bool>(), 32),
        skip in any::<prop::sample::Index>(),
    ) {
        let engine = engine(LOCAL_DEVICE);
        let outcome = engine.attempt_merge(&pair.local, &pair.remote).unwrap();
        let MergeOutcome::NeedsResolution { pending, report } = outcome else {
            return Ok(());
        };

        let choices: ChoiceMap = report
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| {
                let side = if picks[i % picks.len()] { Side::Local } else { Side::Remote };
                (e.path.clone(), Choice::adopt(side))
            })
            .collect();

        let mut partial = choices.clone();
        let dropped = report.entries[skip.index(report.entries.len())].path.clone();
        partial.remove(&dropped);
        let incomplete = engine.resolve(&pending, &report, &partial);
        prop_assert!(
            matches!(incomplete, Err(MergeError::IncompleteResolution { ref missing, .. }) if missing == &vec![dropped.clone()]),
            "expected IncompleteResolution missing [{:?}], got {:?}",
            dropped,
            incomplete
        );

        let resolved = engine.resolve(&pending, &report, &choices).unwrap();
        for entry in &report.entries {
            if let FieldPath::Scalar(name) = &entry.path {
                let side = match choices[&entry.path] {
                    Choice::AdoptLocal => Side::Local,
                    _ => Side::Remote,
                };
                let want = entry.candidate(side).as_value();
                prop_assert_eq!(resolved.quote.field(name), want);
            }
        }

        let q = &resolved.quote;
        prop_assert_eq!(compare_clocks(&q.clock, &pair.local.clock), Relationship::After);
        prop_assert_eq!(compare_clocks(&q.clock, &pair.remote.clock), Relationship::After);
        prop_assert_eq!(
            engine.attempt_merge(q, &pair.remote).unwrap(),
            MergeOutcome::Replace(Side::Local)
        );
    }

    #[test]
    fn merges_are_deterministic(pair in concurrent_pair_strategy()) {
        let a = engine(LOCAL_DEVICE).attempt_merge(&pair.local, &pair.remote).unwrap();
        let b = engine(LOCAL_DEVICE).attempt_merge(&pair.local, &pair.remote).unwrap();
        prop_assert_eq!(to_canonical_bytes(&a).unwrap(), to_canonical_bytes(&b).unwrap());
    }

    #[test]
    fn both_devices_reach_the_same_content(pair in concurrent_pair_strategy()) {
        let on_local = engine(LOCAL_DEVICE).attempt_merge(&pair.local, &pair.remote).unwrap();
        let on_remote = engine(REMOTE_DEVICE).attempt_merge(&pair.remote, &pair.local).unwrap();
        prop_assert_eq!(on_local.needs_resolution(), on_remote.needs_resolution());

        match (on_local, on_remote) {
            (MergeOutcome::Merged(l), MergeOutcome::Merged(r)) => {
                prop_assert_eq!(&l.quote.fields, &r.quote.fields);
                let lj = l.quote.job_index();
                let rj = r.quote.job_index();
                prop_assert_eq!(lj.len(), rj.len());
                for (id, job) in lj {
                    let Some(other) = rj.get(id) else {
                        return Err(TestCaseError::fail(format!("job {id} missing on remote")));
                    };
                    prop_assert_eq!(&job.params, &other.params);
                }
            }
            (MergeOutcome::NeedsResolution { report: l, .. }, MergeOutcome::NeedsResolution { report: r, .. }) => {
                let lp: BTreeSet<_> = l.paths().collect();
                let rp: BTreeSet<_> = r.paths().collect();
                prop_assert_eq!(lp, rp);
            }
            (l, r) => prop_assert!(false, "{} against {}", l.label(), r.label()),
        }
    }

    #[test]
    fn merged_result_supersedes_both_inputs(pair in concurrent_pair_strategy()) {
        let engine = engine(LOCAL_DEVICE);
        let MergeOutcome::Merged(merged) = engine.attempt_merge(&pair.local, &pair.remote).unwrap() else {
            return Ok(());
        };
        prop_assert_eq!(
            engine.attempt_merge(&merged.quote, &pair.remote).unwrap(),
            MergeOutcome::Replace(Side::Local)
        );
        prop_assert_eq!(
            engine.attempt_merge(&merged.quote, &merged.quote).unwrap(),
            MergeOutcome::Replace(Side::Local)
        );
    }
}
