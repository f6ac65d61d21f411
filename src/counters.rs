//! Trace counters facade.
//!
//! `TraceCounters` runs the per-rank counter builders over a selection of
//! ranks and assembles their results. Ranks without data are left out of the
//! results; an empty selection stands for rank 0.
//!
//! ```
//! use trace_counters::{counters::TraceCounters, symbols::SymbolTable, trace::Trace};
//!
//! let trace = Trace::new(SymbolTable::new()).with_rank(0, Vec::new());
//! let counters = TraceCounters::new(&trace);
//!
//! assert!(counters.queue_length_time_series(&[]).unwrap().is_empty());
//! assert!(counters.memory_bandwidth_summary(&[0, 1]).unwrap().is_none());
//! ```

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info, warn};

use crate::{
    error::Result,
    events::{Rank, StreamId},
    kernel::{KernelClassifier, KernelNameClassifier, MemoryKind},
    memory_bw::{memory_bw_time_series_for_rank, MemoryBandwidthSeries},
    queue_length::{queue_length_time_series_for_rank, QueueLengthSeries},
    summary::{describe_groups, SummaryTable},
    EventSource,
};

/// Per-rank results. Only ranks that produced data are present.
pub type RankMap<T> = BTreeMap<Rank, T>;

const STEP_FUNCTION_NOTICE: &str = "Please note that the time series only contains points \
    when the value changes. Once a value is observed the time series \
    stays constant until the next update.";

/// Rank selection actually processed: `ranks` deduplicated and sorted, or
/// rank 0 alone if `ranks` is empty.
pub fn selected_ranks(ranks: &[Rank]) -> Vec<Rank> {
    if ranks.is_empty() {
        return vec![0];
    }

    ranks
        .iter()
        .copied()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

pub struct TraceCounters<'a, S: ?Sized, C = KernelNameClassifier> {
    src: &'a S,
    classifier: C,
    parallel: bool,
}

impl<'a, S> TraceCounters<'a, S>
where
    S: EventSource + Sync + ?Sized,
{
    pub fn new(src: &'a S) -> Self {
        Self {
            src,
            classifier: KernelNameClassifier,
            parallel: false,
        }
    }
}

impl<'a, S, C> TraceCounters<'a, S, C>
where
    S: EventSource + Sync + ?Sized,
    C: KernelClassifier + Sync,
{
    /// Replaces the device event classifier.
    pub fn with_classifier<D>(self, classifier: D) -> TraceCounters<'a, S, D>
    where
        D: KernelClassifier + Sync,
    {
        TraceCounters {
            src: self.src,
            classifier,
            parallel: self.parallel,
        }
    }

    /// If true, ranks are processed concurrently, one thread per rank.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Runs `build` on every selected rank and gathers non-empty results.
    fn per_rank<T, F>(&self, ranks: &[Rank], build: F) -> Result<RankMap<T>>
    where
        T: Send,
        F: Fn(Rank) -> Result<Option<T>> + Sync,
    {
        let ranks = selected_ranks(ranks);

        for rank in ranks.iter().filter(|r| self.src.events(**r).is_none()) {
            warn!("rank {} not found in trace", rank);
        }

        let results: Vec<(Rank, Result<Option<T>>)> = if self.parallel && ranks.len() > 1 {
            let build = &build;
            std::thread::scope(|s| {
                let handles: Vec<_> = ranks
                    .iter()
                    .map(|&rank| (rank, s.spawn(move || build(rank))))
                    .collect();

                handles
                    .into_iter()
                    .map(|(rank, h)| {
                        let res = h.join().unwrap_or_else(|e| std::panic::resume_unwind(e));
                        (rank, res)
                    })
                    .collect()
            })
        } else {
            ranks.iter().map(|&rank| (rank, build(rank))).collect()
        };

        let mut map = RankMap::new();
        for (rank, res) in results {
            match res? {
                Some(v) => {
                    map.insert(rank, v);
                }
                None => debug!("rank {}: no data", rank),
            }
        }

        Ok(map)
    }

    /// Queue length time series of every stream, per rank.
    pub fn queue_length_time_series(&self, ranks: &[Rank]) -> Result<RankMap<QueueLengthSeries>> {
        info!("{}", STEP_FUNCTION_NOTICE);

        self.per_rank(ranks, |rank| Ok(queue_length_time_series_for_rank(self.src, rank)))
    }

    /// Queue length statistics per rank and stream.
    pub fn queue_length_summary(
        &self,
        ranks: &[Rank],
    ) -> Result<Option<SummaryTable<StreamId>>> {
        let table: SummaryTable<StreamId> = self
            .queue_length_time_series(ranks)?
            .iter()
            .flat_map(|(rank, series)| describe_groups(*rank, series, |_| true))
            .collect();

        Ok((!table.is_empty()).then_some(table))
    }

    /// Bandwidth time series of every memory channel, per rank.
    pub fn memory_bandwidth_time_series(
        &self,
        ranks: &[Rank],
    ) -> Result<RankMap<MemoryBandwidthSeries>> {
        info!("{}", STEP_FUNCTION_NOTICE);

        self.per_rank(ranks, |rank| {
            memory_bw_time_series_for_rank(self.src, &self.classifier, rank)
        })
    }

    /// Bandwidth statistics per rank and memory channel. Only points where
    /// some transfer is in flight are considered.
    pub fn memory_bandwidth_summary(
        &self,
        ranks: &[Rank],
    ) -> Result<Option<SummaryTable<MemoryKind>>> {
        let table: SummaryTable<MemoryKind> = self
            .memory_bandwidth_time_series(ranks)?
            .iter()
            .flat_map(|(rank, series)| describe_groups(*rank, series, |v| v > 0.0))
            .collect();

        Ok((!table.is_empty()).then_some(table))
    }
}
