//! Memory bandwidth counter.
//!
//! Every memory operation adds its achieved bandwidth to the counter of its
//! channel when it starts, and removes it when it ends. The counter of a
//! channel is thus the total bandwidth of the transfers in flight on it.

use std::collections::HashMap;

use tracing::debug;

use crate::{
    error::{Result, TraceError},
    events::{Rank, TraceEvent},
    kernel::{KernelClassifier, KernelType, MemoryKind},
    series::{accumulate, DeltaEvent, TimeSeries},
    symbols::{SymbolId, SymbolTable},
    EventSource,
};

/// Bandwidth in GB/s per memory channel.
pub type MemoryBandwidthSeries = TimeSeries<MemoryKind, f64>;

/// Caches the channel of each name id. `None` marks names that are not
/// tracked memory operations.
struct ChannelLookup<'a, C: ?Sized> {
    symbols: &'a SymbolTable,
    classifier: &'a C,
    channels: HashMap<SymbolId, Option<MemoryKind>>,
}

impl<'a, C> ChannelLookup<'a, C>
where
    C: KernelClassifier + ?Sized,
{
    fn new(symbols: &'a SymbolTable, classifier: &'a C) -> Self {
        Self {
            symbols,
            classifier,
            channels: HashMap::new(),
        }
    }

    fn channel(&mut self, rank: Rank, ev: &TraceEvent) -> Result<Option<MemoryKind>> {
        if let Some(channel) = self.channels.get(&ev.name) {
            return Ok(*channel);
        }

        let name = self
            .symbols
            .name(ev.name)
            .ok_or(TraceError::UnknownSymbol {
                rank,
                index: ev.index,
                name_id: ev.name,
            })?;

        let channel = match self.classifier.kernel_type(name) {
            KernelType::Memory => {
                let kind = self.classifier.memory_kind(name);
                if kind.is_none() {
                    debug!("rank {}: untracked memory operation {:?}", rank, name);
                }
                kind
            }
            _ => None,
        };

        self.channels.insert(ev.name, channel);
        Ok(channel)
    }
}

fn bandwidth(rank: Rank, ev: &TraceEvent) -> Result<f64> {
    match ev.memory_bw_gbps {
        None => Err(TraceError::MissingBandwidth {
            rank,
            index: ev.index,
        }),
        Some(value) if !value.is_finite() || value < 0.0 => Err(TraceError::InvalidBandwidth {
            rank,
            index: ev.index,
            value,
        }),
        Some(value) => Ok(value),
    }
}

/// Builds the bandwidth deltas of a rank table. Start deltas are all placed
/// before end deltas.
fn bandwidth_deltas<C>(
    rank: Rank,
    events: &[TraceEvent],
    symbols: &SymbolTable,
    classifier: &C,
) -> Result<Vec<DeltaEvent<MemoryKind, f64>>>
where
    C: KernelClassifier + ?Sized,
{
    let mut lookup = ChannelLookup::new(symbols, classifier);

    let mut starts = Vec::new();
    let mut ends = Vec::new();

    for ev in events.iter().filter(|ev| ev.is_device_event()) {
        let Some(channel) = lookup.channel(rank, ev)? else {
            continue;
        };

        let bw = bandwidth(rank, ev)?;
        if ev.dur < 0 {
            return Err(TraceError::NegativeDuration {
                rank,
                index: ev.index,
                dur: ev.dur,
            });
        }

        starts.push(DeltaEvent::new(ev.ts, channel, ev.pid, ev.tid, bw));
        ends.push(DeltaEvent::new(ev.end_ts(), channel, ev.pid, ev.tid, -bw));
    }

    starts.append(&mut ends);
    Ok(starts)
}

/// Returns the bandwidth time series of every memory channel of `rank`, or
/// `None` if the rank has no memory operation.
pub fn memory_bw_time_series_for_rank<S, C>(
    src: &S,
    classifier: &C,
    rank: Rank,
) -> Result<Option<MemoryBandwidthSeries>>
where
    S: EventSource + ?Sized,
    C: KernelClassifier + ?Sized,
{
    let Some(events) = src.events(rank) else {
        return Ok(None);
    };

    let deltas = bandwidth_deltas(rank, events, src.symbols(), classifier)?;
    let series = accumulate(deltas);

    for (channel, rows) in series.groups() {
        debug!(
            "Processing memory bandwidth for rank {}, {}: {} rows",
            rank,
            channel,
            rows.len()
        );
    }

    Ok((!series.is_empty()).then_some(series))
}

#[cfg(test)]
mod tests {
    use crate::{
        error::TraceError,
        events::TraceEvent,
        kernel::{KernelNameClassifier, MemoryKind},
        symbols::SymbolTable,
        trace::Trace,
    };

    use super::{memory_bw_time_series_for_rank, MemoryBandwidthSeries};

    const HTOD: i64 = 0;
    const DTOH: i64 = 1;
    const MEMSET: i64 = 2;
    const GEMM: i64 = 3;
    const PTOP: i64 = 4;

    fn symbols() -> SymbolTable {
        let mut table = SymbolTable::new();
        for name in [
            "Memcpy HtoD (Pageable -> Device)",
            "Memcpy DtoH (Device -> Pinned)",
            "Memset (Device)",
            "void gemm()",
            "Memcpy PtoP (Device -> Device)",
        ] {
            table.insert(name);
        }
        table
    }

    fn build(events: Vec<TraceEvent>) -> Option<MemoryBandwidthSeries> {
        let trace = Trace::new(symbols()).with_rank(0, events);
        memory_bw_time_series_for_rank(&trace, &KernelNameClassifier, 0).unwrap()
    }

    fn values(series: &MemoryBandwidthSeries, kind: MemoryKind) -> Vec<(i64, f64)> {
        series
            .group(&kind)
            .iter()
            .map(|p| (p.ts, p.value))
            .collect()
    }

    #[test]
    fn test_single_copy() {
        let series = build(vec![
            TraceEvent::device(0, 100, 50, 7, HTOD, 1).with_bandwidth(8.0)
        ])
        .unwrap();

        assert_eq!(
            values(&series, MemoryKind::MemcpyHtoD),
            &[(100, 8.0), (150, 0.0)]
        );
    }

    #[test]
    fn test_overlapping_copies_add_up() {
        let series = build(vec![
            TraceEvent::device(0, 0, 10, 7, HTOD, 1).with_bandwidth(4.0),
            TraceEvent::device(1, 5, 10, 8, HTOD, 2).with_bandwidth(6.0),
        ])
        .unwrap();

        assert_eq!(
            values(&series, MemoryKind::MemcpyHtoD),
            &[(0, 4.0), (5, 10.0), (10, 6.0), (15, 0.0)]
        );
    }

    #[test]
    fn test_zero_duration_ends_one_unit_later() {
        let series = build(vec![
            TraceEvent::device(0, 40, 0, 7, MEMSET, 1).with_bandwidth(2.5)
        ])
        .unwrap();

        assert_eq!(values(&series, MemoryKind::Memset), &[(40, 2.5), (41, 0.0)]);
    }

    #[test]
    fn test_channels_and_filtering() {
        let series = build(vec![
            TraceEvent::device(0, 0, 10, 7, HTOD, 1).with_bandwidth(4.0),
            TraceEvent::device(1, 2, 4, 7, DTOH, 2).with_bandwidth(3.0),
            TraceEvent::device(2, 3, 4, 7, GEMM, 3),
            TraceEvent::device(3, 3, 4, 7, PTOP, 4).with_bandwidth(9.0),
            TraceEvent::host(4, 0, HTOD, 0).with_bandwidth(1.0),
        ])
        .unwrap();

        assert_eq!(
            series.keys().copied().collect::<Vec<_>>(),
            &[MemoryKind::MemcpyDtoH, MemoryKind::MemcpyHtoD]
        );
        assert_eq!(values(&series, MemoryKind::MemcpyDtoH), &[(2, 3.0), (6, 0.0)]);
        assert_eq!(series.len(), 4);
    }

    #[test]
    fn test_start_counts_first_on_ties() {
        let series = build(vec![
            TraceEvent::device(0, 0, 10, 7, HTOD, 1).with_bandwidth(4.0),
            TraceEvent::device(1, 10, 5, 7, HTOD, 2).with_bandwidth(6.0),
        ])
        .unwrap();

        assert_eq!(
            values(&series, MemoryKind::MemcpyHtoD),
            &[(0, 4.0), (10, 10.0), (10, 6.0), (15, 0.0)]
        );
        assert!(series.points().iter().all(|p| p.value >= 0.0));
    }

    #[test]
    fn test_no_memory_operations() {
        assert!(build(vec![TraceEvent::device(0, 0, 10, 7, GEMM, 1)]).is_none());
        assert!(build(Vec::new()).is_none());

        let trace = Trace::new(symbols());
        assert_eq!(
            memory_bw_time_series_for_rank(&trace, &KernelNameClassifier, 3),
            Ok(None)
        );
    }

    #[test]
    fn test_malformed_events() {
        let trace = Trace::new(symbols())
            .with_rank(0, vec![TraceEvent::device(5, 0, 10, 7, HTOD, 1)])
            .with_rank(1, vec![TraceEvent::device(6, 0, 10, 7, 42, 1)])
            .with_rank(
                2,
                vec![TraceEvent::device(7, 0, 10, 7, DTOH, 1).with_bandwidth(f64::NAN)],
            )
            .with_rank(
                3,
                vec![TraceEvent::device(8, 20, -5, 7, MEMSET, 1).with_bandwidth(1.0)],
            );

        assert_eq!(
            memory_bw_time_series_for_rank(&trace, &KernelNameClassifier, 0),
            Err(TraceError::MissingBandwidth { rank: 0, index: 5 })
        );
        assert_eq!(
            memory_bw_time_series_for_rank(&trace, &KernelNameClassifier, 1),
            Err(TraceError::UnknownSymbol {
                rank: 1,
                index: 6,
                name_id: 42
            })
        );
        assert!(matches!(
            memory_bw_time_series_for_rank(&trace, &KernelNameClassifier, 2),
            Err(TraceError::InvalidBandwidth { rank: 2, index: 7, .. })
        ));
        assert_eq!(
            memory_bw_time_series_for_rank(&trace, &KernelNameClassifier, 3),
            Err(TraceError::NegativeDuration {
                rank: 3,
                index: 8,
                dur: -5
            })
        );
    }

    #[test]
    fn test_long_copy_at_end_of_time_range() {
        let series = build(vec![
            TraceEvent::device(0, i64::MAX - 2, 10, 7, HTOD, 1).with_bandwidth(5.0)
        ])
        .unwrap();

        assert_eq!(
            values(&series, MemoryKind::MemcpyHtoD),
            &[(i64::MAX - 2, 5.0), (i64::MAX, 0.0)]
        );
    }

    #[test]
    fn test_idempotent() {
        let events = vec![
            TraceEvent::device(0, 0, 10, 7, HTOD, 1).with_bandwidth(4.0),
            TraceEvent::device(1, 5, 0, 8, MEMSET, 2).with_bandwidth(1.5),
            TraceEvent::device(2, 5, 10, 8, DTOH, 3).with_bandwidth(6.0),
            TraceEvent::device(3, 6, 2, 7, GEMM, 4),
        ];

        let first = build(events.clone());
        assert!(first.is_some());
        assert_eq!(first, build(events));
    }
}
