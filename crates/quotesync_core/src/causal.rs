//! Causal ordering between two version clocks.
//!
//! This is the only place where "conflict" is defined: two snapshots
//! conflict exactly when their clocks are [`Relationship::Concurrent`].

use crate::clock::VersionClock;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How one clock relates to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relationship {
    /// The first clock is causally older; the second is safe to adopt.
    Before,
    /// The first clock is causally newer.
    After,
    /// Both clocks are identical.
    Equal,
    /// Each side has edits the other lacks.
    Concurrent,
}

impl Relationship {
    /// The relationship seen from the other side.
    pub fn reverse(self) -> Self {
        match self {
            Relationship::Before => Relationship::After,
            Relationship::After => Relationship::Before,
            other => other,
        }
    }

    /// True if the two snapshots require a merge.
    pub fn is_concurrent(self) -> bool {
        matches!(self, Relationship::Concurrent)
    }
}

impl fmt::Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Relationship::Before => "before",
            Relationship::After => "after",
            Relationship::Equal => "equal",
            Relationship::Concurrent => "concurrent",
        };
        f.write_str(s)
    }
}

/// Determines the causal relationship of `a` to `b`.
///
/// `a ≤ b` iff for every device known to either clock `a[d] ≤ b[d]`.
pub fn compare(a: &VersionClock, b: &VersionClock) -> Relationship {
    let mut a_ahead = false;
    let mut b_ahead = false;

    for device in a.devices().chain(b.devices()) {
        let (x, y) = (a.get(device), b.get(device));
        if x > y {
            a_ahead = true;
        } else if y > x {
            b_ahead = true;
        }
        if a_ahead && b_ahead {
            return Relationship::Concurrent;
        }
    }

    match (a_ahead, b_ahead) {
        (false, false) => Relationship::Equal,
        (false, true) => Relationship::Before,
        (true, false) => Relationship::After,
        (true, true) => Relationship::Concurrent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn clock(pairs: &[(&str, i64)]) -> VersionClock {
        VersionClock::from_counters(pairs.iter().map(|(d, c)| (*d, *c))).unwrap()
    }

    #[test]
    fn reference_relationships() {
        assert_eq!(
            compare(&clock(&[("A", 5), ("B", 2)]), &clock(&[("A", 4), ("B", 2)])),
            Relationship::After
        );
        assert_eq!(
            compare(&clock(&[("A", 3), ("B", 4)]), &clock(&[("A", 3), ("B", 5)])),
            Relationship::Before
        );
        assert_eq!(
            compare(&clock(&[("A", 6), ("B", 2)]), &clock(&[("A", 5), ("B", 4)])),
            Relationship::Concurrent
        );
        assert_eq!(
            compare(
                &clock(&[("A", 3), ("B", 2), ("C", 1)]),
                &clock(&[("A", 2), ("B", 4), ("C", 3)])
            ),
            Relationship::Concurrent
        );
    }

    #[test]
    fn devices_missing_on_one_side_count_as_zero() {
        let a = clock(&[("A", 1)]);
        let b = clock(&[("A", 1), ("B", 1)]);
        assert_eq!(compare(&a, &b), Relationship::Before);
        assert_eq!(compare(&VersionClock::new(), &VersionClock::new()), Relationship::Equal);
    }

    #[test]
    fn reverse_swaps_only_ordered_cases() {
        assert_eq!(Relationship::Before.reverse(), Relationship::After);
        assert_eq!(Relationship::Equal.reverse(), Relationship::Equal);
        assert_eq!(Relationship::Concurrent.reverse(), Relationship::Concurrent);
    }

    fn clock_strategy() -> impl Strategy<Value = VersionClock> {
        prop::collection::btree_map("[A-D]", 0i64..6, 0..4)
            .prop_map(|m| VersionClock::from_counters(m).unwrap())
    }

    proptest! {
        #[test]
        fn reflexive(a in clock_strategy()) {
            prop_assert_eq!(compare(&a, &a), Relationship::Equal);
        }

        #[test]
        fn antisymmetric(a in clock_strategy(), b in clock_strategy()) {
            prop_assert_eq!(compare(&a, &b), compare(&b, &a).reverse());
        }

        #[test]
        fn merged_clock_follows_both(a in clock_strategy(), b in clock_strategy()) {
            let m = VersionClock::merge(&a, &b);
            prop_assert!(matches!(compare(&a, &m), Relationship::Before | Relationship::Equal));
            prop_assert!(matches!(compare(&b, &m), Relationship::Before | Relationship::Equal));
        }
    }
}
