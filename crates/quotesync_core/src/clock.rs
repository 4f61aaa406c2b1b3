//! Per-device version clocks.
//!
//! A [`VersionClock`] maps device identifiers to edit counters. A device only
//! ever increments its own counter; counters for other devices are only raised
//! to values observed on records received from them. Clocks never shrink.
//!
//! Absent devices read as zero, and zero entries are never stored, so two
//! clocks that differ only by explicit zeros compare equal.

use crate::error::{MergeError, MergeResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Causal counters, one per device that has edited the record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, i64>", into = "BTreeMap<String, u64>")]
pub struct VersionClock {
    counters: BTreeMap<String, u64>,
}

impl VersionClock {
    /// Creates an empty clock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the clock of a freshly created record: the originating device
    /// at 1, every other device at 0.
    pub fn origin(device: impl Into<String>) -> Self {
        let mut clock = Self::new();
        clock.counters.insert(device.into(), 1);
        clock
    }

    /// Builds a clock from raw counters as received from a collaborator.
    ///
    /// # Errors
    ///
    /// Returns [`MergeError::MalformedClock`] for a negative counter or an
    /// empty device id. Nothing is clamped.
    pub fn from_counters<I, S>(counters: I) -> MergeResult<Self>
    where
        I: IntoIterator<Item = (S, i64)>,
        S: Into<String>,
    {
        let mut clock = Self::new();
        for (device, counter) in counters {
            let device = device.into();
            if device.is_empty() {
                return Err(MergeError::malformed_clock(device, "empty device id"));
            }
            if counter < 0 {
                return Err(MergeError::malformed_clock(
                    device,
                    format!("negative counter {counter}"),
                ));
            }
            if counter > 0 {
                clock.counters.insert(device, counter as u64);
            }
        }
        Ok(clock)
    }

    /// Returns the counter for `device`, zero if it has never edited.
    pub fn get(&self, device: &str) -> u64 {
        self.counters.get(device).copied().unwrap_or(0)
    }

    /// Records one local edit on `device` and returns the new counter.
    pub fn increment(&mut self, device: &str) -> u64 {
        let counter = self.counters.entry(device.to_string()).or_insert(0);
        *counter += 1;
        *counter
    }

    /// Records one local edit and returns the [`Dot`] naming it.
    pub fn tick(&mut self, device: &str) -> Dot {
        let counter = self.increment(device);
        Dot::new(device, counter)
    }

    /// Raises `device`'s counter to an observed value. Lower observations are
    /// stale and leave the clock unchanged.
    pub fn observe(&mut self, device: &str, counter: u64) {
        if counter == 0 {
            return;
        }
        let current = self.counters.entry(device.to_string()).or_insert(0);
        if counter > *current {
            *current = counter;
        }
    }

    /// Coordinate-wise maximum over the union of devices in `a` and `b`.
    pub fn merge(a: &VersionClock, b: &VersionClock) -> VersionClock {
        let mut merged = a.clone();
        merged.merge_from(b);
        merged
    }

    /// In-place form of [`VersionClock::merge`].
    pub fn merge_from(&mut self, other: &VersionClock) {
        for (device, &counter) in &other.counters {
            self.observe(device, counter);
        }
    }

    /// Value equality; absent devices count as zero.
    pub fn equals(a: &VersionClock, b: &VersionClock) -> bool {
        a == b
    }

    /// True if every counter in `self` is at most the matching one in `other`.
    pub fn precedes_or_equals(&self, other: &VersionClock) -> bool {
        self.counters
            .iter()
            .all(|(device, &counter)| counter <= other.get(device))
    }

    /// True if `self` has seen everything `other` has.
    pub fn dominates(&self, other: &VersionClock) -> bool {
        other.precedes_or_equals(self)
    }

    /// True if the edit named by `dot` is contained in this clock's history.
    pub fn covers(&self, dot: &Dot) -> bool {
        self.get(&dot.device) >= dot.counter
    }

    /// Devices with a non-zero counter, in ascending order.
    pub fn devices(&self) -> impl Iterator<Item = &str> {
        self.counters.keys().map(String::as_str)
    }

    /// Iterates `(device, counter)` pairs in ascending device order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counters.iter().map(|(d, &c)| (d.as_str(), c))
    }

    /// Number of devices with a non-zero counter.
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    /// True if no device has edited.
    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    /// Sum of all counters; the total number of edits this clock has seen.
    pub fn total_edits(&self) -> u64 {
        self.counters.values().sum()
    }
}

impl TryFrom<BTreeMap<String, i64>> for VersionClock {
    type Error = MergeError;

    fn try_from(counters: BTreeMap<String, i64>) -> MergeResult<Self> {
        Self::from_counters(counters)
    }
}

impl From<VersionClock> for BTreeMap<String, u64> {
    fn from(clock: VersionClock) -> Self {
        clock.counters
    }
}

impl fmt::Display for VersionClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (device, counter)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{device}:{counter}")?;
        }
        f.write_str("}")
    }
}

/// One edit event: the `counter`-th edit made on `device`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Dot {
    /// Device that made the edit.
    pub device: String,
    /// That device's counter after the edit.
    pub counter: u64,
}

impl Dot {
    /// Creates a dot.
    pub fn new(device: impl Into<String>, counter: u64) -> Self {
        Self {
            device: device.into(),
            counter,
        }
    }
}

impl fmt::Display for Dot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.device, self.counter)
    }
}
