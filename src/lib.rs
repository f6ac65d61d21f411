//! Device occupancy and memory throughput counters for accelerator traces.
//!
//! Two counters are derived from the per-rank event tables of a trace:
//! - the __queue length__ of each device stream, i.e. the number of operations
//!   enqueued by the host that did not start executing yet;
//! - the __memory bandwidth__ of each memory channel (host to device, device to
//!   host, device to device copies and memsets), i.e. the total bandwidth of
//!   the transfers in flight.
//!
//! Counters are step functions: each row of a time series gives the value of
//! the counter from its timestamp until the next row of the same group. They
//! can also be summarized per rank and group with descriptive statistics.
//!
//! Traces are provided through the `EventSource` trait. The `trace` module
//! offers an in-memory implementation that can be loaded from a trace
//! directory.

pub mod cli;
pub mod context;

pub mod error;
pub mod events;
pub mod kernel;
pub mod symbols;
pub mod trace;

pub mod series;
pub mod summary;

pub mod memory_bw;
pub mod queue_length;

pub mod counters;

use crate::{
    events::{Rank, TraceEvent},
    symbols::SymbolTable,
};

/// Provides the event tables of a trace.
pub trait EventSource {
    /// Events recorded for `rank`, in trace order. Returns `None` if the trace
    /// has no table for this rank.
    fn events(&self, rank: Rank) -> Option<&[TraceEvent]>;

    /// Name table shared by all ranks.
    fn symbols(&self) -> &SymbolTable;
}
