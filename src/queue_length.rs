//! Stream queue length counter.
//!
//! The queue length of a stream is the number of operations enqueued on it
//! that have not started executing yet. It is incremented by each runtime call
//! enqueuing work (kernel launch, asynchronous memcpy or memset) and
//! decremented when the corresponding operation shows up on the device.
//!
//! Runtime calls run on the host and do not know their stream. The stream, as
//! well as the pid and tid of the row, is taken from the device event sharing
//! the call's correlation id. Calls whose correlation id matches no device
//! event cannot be placed and are dropped.

use std::collections::HashMap;

use tracing::debug;

use crate::{
    events::{Rank, StreamId, TraceEvent},
    series::{accumulate, DeltaEvent, TimeSeries},
    EventSource,
};

/// Queue length per stream, keyed by stream id.
pub type QueueLengthSeries = TimeSeries<StreamId, i64>;

#[derive(Debug, Clone, Copy, PartialEq)]
struct DeviceSlot {
    stream: StreamId,
    pid: i64,
    tid: i64,
}

impl From<&TraceEvent> for DeviceSlot {
    fn from(ev: &TraceEvent) -> Self {
        Self {
            stream: ev.stream,
            pid: ev.pid,
            tid: ev.tid,
        }
    }
}

/// Maps correlation ids to the device event they designate. The first device
/// event wins if several share a correlation id.
fn correlation_map(events: &[TraceEvent]) -> HashMap<i64, DeviceSlot> {
    let mut slots = HashMap::new();

    for ev in events.iter().filter(|ev| ev.is_device_event()) {
        if let Some(correlation) = ev.correlation_id() {
            slots.entry(correlation).or_insert_with(|| DeviceSlot::from(ev));
        }
    }

    slots
}

/// Builds the queue length deltas of a rank table.
///
/// Enqueue deltas are all placed before execution deltas so that an enqueue
/// and an execution sharing a timestamp count the enqueue first.
fn queue_deltas(events: &[TraceEvent], enqueue_ids: &[i64]) -> Vec<DeltaEvent<StreamId, i64>> {
    let slots = correlation_map(events);

    let mut deltas = Vec::new();
    let mut missed = 0usize;

    for call in events
        .iter()
        .filter(|ev| enqueue_ids.contains(&ev.name) && ev.correlation_id().is_some())
    {
        match slots.get(&call.correlation) {
            Some(slot) => deltas.push(DeltaEvent::new(call.ts, slot.stream, slot.pid, slot.tid, 1)),
            None => missed += 1,
        }
    }

    if missed > 0 {
        debug!("{} enqueue call(s) without a matching device event", missed);
    }

    deltas.extend(
        events
            .iter()
            .filter(|ev| ev.is_device_event())
            .map(|ev| DeltaEvent::new(ev.ts, ev.stream, ev.pid, ev.tid, -1)),
    );

    deltas
}

/// Returns the queue length time series of every stream of `rank`, or `None`
/// if the rank has no device activity.
pub fn queue_length_time_series_for_rank<S>(src: &S, rank: Rank) -> Option<QueueLengthSeries>
where
    S: EventSource + ?Sized,
{
    let events = src.events(rank)?;
    let enqueue_ids = src.symbols().enqueue_call_ids();

    if enqueue_ids.is_empty() {
        debug!("rank {}: trace has no enqueuing runtime call names", rank);
    }

    let series = accumulate(queue_deltas(events, &enqueue_ids));

    for (stream, rows) in series.groups() {
        debug!(
            "Processing queue_length for rank {}, stream {}: {} rows",
            rank,
            stream,
            rows.len()
        );
    }

    (!series.is_empty()).then_some(series)
}

#[cfg(test)]
mod tests {
    use crate::{
        events::TraceEvent,
        symbols::{SymbolTable, LAUNCH_KERNEL, MEMCPY_ASYNC, MEMSET_ASYNC},
        trace::Trace,
    };

    use super::queue_length_time_series_for_rank;

    fn symbols() -> SymbolTable {
        let mut table = SymbolTable::new();
        for name in [
            LAUNCH_KERNEL,
            MEMCPY_ASYNC,
            MEMSET_ASYNC,
            "void gemm()",
            "cudaStreamSynchronize",
        ] {
            table.insert(name);
        }
        table
    }

    const LAUNCH: i64 = 0;
    const MEMCPY: i64 = 1;
    const MEMSET: i64 = 2;
    const GEMM: i64 = 3;
    const SYNC: i64 = 4;

    fn values(series: &super::QueueLengthSeries, stream: i64) -> Vec<(i64, i64)> {
        series
            .group(&stream)
            .iter()
            .map(|p| (p.ts, p.value))
            .collect()
    }

    #[test]
    fn test_two_launches_on_one_stream() {
        let trace = Trace::new(symbols()).with_rank(
            0,
            vec![
                TraceEvent::host(0, 10, LAUNCH, 1),
                TraceEvent::device(1, 15, 3, 0, GEMM, 1),
                TraceEvent::host(2, 20, LAUNCH, 2),
                TraceEvent::device(3, 25, 3, 0, GEMM, 2),
            ],
        );

        let series = queue_length_time_series_for_rank(&trace, 0).unwrap();

        assert_eq!(values(&series, 0), &[(10, 1), (15, 0), (20, 1), (25, 0)]);
    }

    #[test]
    fn test_stream_pid_tid_come_from_device_event() {
        let trace = Trace::new(symbols()).with_rank(
            0,
            vec![
                TraceEvent::host(0, 10, MEMCPY, 7),
                TraceEvent::device(1, 30, 3, 20, GEMM, 7),
            ],
        );

        let series = queue_length_time_series_for_rank(&trace, 0).unwrap();
        let enqueue = &series.group(&20)[0];

        assert_eq!(enqueue.ts, 10);
        assert_eq!((enqueue.pid, enqueue.tid), (0, 20));
        assert_eq!(series.keys().copied().collect::<Vec<_>>(), &[20]);
    }

    #[test]
    fn test_correlation_miss_is_dropped() {
        let trace = Trace::new(symbols()).with_rank(
            0,
            vec![
                TraceEvent::host(0, 10, LAUNCH, 1),
                TraceEvent::host(1, 11, MEMSET, 99),
                TraceEvent::device(2, 15, 3, 4, GEMM, 1),
            ],
        );

        let series = queue_length_time_series_for_rank(&trace, 0).unwrap();

        assert_eq!(series.len(), 2);
        assert_eq!(values(&series, 4), &[(10, 1), (15, 0)]);
    }

    #[test]
    fn test_uncorrelated_and_other_calls_are_ignored() {
        let trace = Trace::new(symbols()).with_rank(
            0,
            vec![
                TraceEvent::host(0, 5, LAUNCH, 0),
                TraceEvent::host(1, 6, SYNC, 1),
                TraceEvent::host(2, 10, LAUNCH, 1),
                TraceEvent::device(3, 15, 3, 4, GEMM, 1),
            ],
        );

        let series = queue_length_time_series_for_rank(&trace, 0).unwrap();

        assert_eq!(values(&series, 4), &[(10, 1), (15, 0)]);
    }

    #[test]
    fn test_streams_are_independent() {
        let trace = Trace::new(symbols()).with_rank(
            0,
            vec![
                TraceEvent::host(0, 1, LAUNCH, 1),
                TraceEvent::host(1, 2, LAUNCH, 2),
                TraceEvent::host(2, 3, LAUNCH, 3),
                TraceEvent::device(3, 4, 1, 7, GEMM, 1),
                TraceEvent::device(4, 5, 1, 8, GEMM, 2),
                TraceEvent::device(5, 6, 1, 7, GEMM, 3),
            ],
        );

        let series = queue_length_time_series_for_rank(&trace, 0).unwrap();

        assert_eq!(values(&series, 7), &[(1, 1), (3, 2), (4, 1), (6, 0)]);
        assert_eq!(values(&series, 8), &[(2, 1), (5, 0)]);
        assert_eq!(series.last_value(&7), Some(&0));
        assert_eq!(series.last_value(&8), Some(&0));
    }

    #[test]
    fn test_enqueue_counts_first_on_ties() {
        let trace = Trace::new(symbols()).with_rank(
            0,
            vec![
                TraceEvent::device(0, 10, 1, 2, GEMM, 1),
                TraceEvent::host(1, 10, LAUNCH, 1),
            ],
        );

        let series = queue_length_time_series_for_rank(&trace, 0).unwrap();

        assert_eq!(values(&series, 2), &[(10, 1), (10, 0)]);
    }

    #[test]
    fn test_no_device_activity() {
        let trace = Trace::new(symbols())
            .with_rank(0, vec![TraceEvent::host(0, 10, LAUNCH, 1)])
            .with_rank(1, Vec::new());

        assert!(queue_length_time_series_for_rank(&trace, 0).is_none());
        assert!(queue_length_time_series_for_rank(&trace, 1).is_none());
        assert!(queue_length_time_series_for_rank(&trace, 2).is_none());
    }

    #[test]
    fn test_idempotent() {
        let trace = Trace::new(symbols()).with_rank(
            0,
            vec![
                TraceEvent::host(0, 1, LAUNCH, 1),
                TraceEvent::host(1, 1, MEMCPY, 2),
                TraceEvent::device(2, 3, 1, 7, GEMM, 2),
                TraceEvent::device(3, 3, 1, 7, GEMM, 1),
            ],
        );

        assert_eq!(
            queue_length_time_series_for_rank(&trace, 0),
            queue_length_time_series_for_rank(&trace, 0)
        );
    }
}
