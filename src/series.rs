//! Step-function time series.
//!
//! Counters are rebuilt from signed delta events. Deltas are sorted by
//! timestamp, partitioned by group key and summed up in order within each
//! group. Every resulting row holds the counter value from its timestamp until
//! the next row of the same group, so a series only contains points where the
//! value changes.
//!
//! ```
//! use trace_counters::series::{accumulate, DeltaEvent};
//!
//! let deltas = vec![
//!     DeltaEvent::new(10, 0, 1, 1, 1),
//!     DeltaEvent::new(15, 0, 1, 1, -1),
//! ];
//!
//! let series = accumulate(deltas);
//! let values: Vec<i64> = series.points().iter().map(|p| p.value).collect();
//!
//! assert_eq!(values, &[1, 0]);
//! ```

use std::{collections::BTreeMap, fmt::Debug, ops::AddAssign};

use serde::Serialize;
use tracing::trace;

use crate::events::Timestamp;

/// Signed counter update.
#[derive(Debug, Clone, PartialEq)]
pub struct DeltaEvent<K, V> {
    pub ts: Timestamp,
    pub key: K,
    pub pid: i64,
    pub tid: i64,
    pub delta: V,
}

impl<K, V> DeltaEvent<K, V> {
    pub fn new(ts: Timestamp, key: K, pid: i64, tid: i64, delta: V) -> Self {
        Self {
            ts,
            key,
            pid,
            tid,
            delta,
        }
    }
}

/// Counter value from `ts` on, for the group `key`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeriesPoint<K, V> {
    pub ts: Timestamp,
    pub pid: i64,
    pub tid: i64,
    pub key: K,
    pub value: V,
}

/// A set of step functions, one per group key.
///
/// Rows are stored group by group in ascending key order. Within a group, rows
/// are sorted by timestamp.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct TimeSeries<K, V> {
    points: Vec<TimeSeriesPoint<K, V>>,
}

impl<K, V> TimeSeries<K, V>
where
    K: PartialEq,
{
    pub fn points(&self) -> &[TimeSeriesPoint<K, V>] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Iterates over the groups of the series, in key order.
    pub fn groups(&self) -> impl Iterator<Item = (&K, &[TimeSeriesPoint<K, V>])> + '_ {
        self.points
            .chunk_by(|a, b| a.key == b.key)
            .map(|rows| (&rows[0].key, rows))
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.groups().map(|(k, _)| k)
    }

    /// Rows of the `key` group. Empty if the group never received a delta.
    pub fn group(&self, key: &K) -> &[TimeSeriesPoint<K, V>] {
        self.groups()
            .find(|(k, _)| *k == key)
            .map(|(_, rows)| rows)
            .unwrap_or_default()
    }

    /// Final value of the `key` group.
    pub fn last_value(&self, key: &K) -> Option<&V> {
        self.group(key).last().map(|p| &p.value)
    }
}

/// Rebuilds per-group step functions from a batch of deltas.
///
/// Deltas sharing a timestamp keep the order they were supplied in.
pub fn accumulate<K, V>(mut deltas: Vec<DeltaEvent<K, V>>) -> TimeSeries<K, V>
where
    K: Ord + Clone + Debug,
    V: AddAssign + Default + Copy,
{
    let total = deltas.len();

    // Stable: ties are resolved by construction order.
    deltas.sort_by_key(|d| d.ts);

    let mut groups: BTreeMap<K, Vec<DeltaEvent<K, V>>> = BTreeMap::new();
    for d in deltas {
        groups.entry(d.key.clone()).or_default().push(d);
    }

    let mut points = Vec::with_capacity(total);

    for (key, group) in groups {
        trace!("accumulating {} deltas for group {:?}", group.len(), key);

        let mut value = V::default();
        points.extend(group.into_iter().map(|d| {
            value += d.delta;
            TimeSeriesPoint {
                ts: d.ts,
                pid: d.pid,
                tid: d.tid,
                key: d.key,
                value,
            }
        }));
    }

    TimeSeries { points }
}
