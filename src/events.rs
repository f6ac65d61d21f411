//! Trace events definition
//!
//! Events are produced by the trace ingestion layer, one flat table per rank.
//! They are never mutated: the counter builders only derive new rows from them.

use serde::{Deserialize, Serialize};

use crate::symbols::SymbolId;

/// Process rank in a multi-process trace.
pub type Rank = u32;

/// Trace time, in the trace time unit (microseconds for Kineto traces).
pub type Timestamp = i64;

/// Device stream identifier.
pub type StreamId = i64;

/// Stream id carried by host-side events.
pub const HOST_STREAM: StreamId = -1;

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct TraceEvent {
    /// Sequence id of the event in its rank table.
    pub index: u64,
    pub ts: Timestamp,
    pub dur: Timestamp,
    pub pid: i64,
    pub tid: i64,
    /// Device stream, or `HOST_STREAM` for host-side events.
    pub stream: StreamId,
    /// Name id, resolved through the trace `SymbolTable`.
    pub name: SymbolId,
    /// Links a runtime call to the device event it enqueued. `0` if none.
    #[serde(default)]
    pub correlation: i64,
    /// Achieved bandwidth in GB/s, attached to memory operations only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_bw_gbps: Option<f64>,
}

impl TraceEvent {
    /// Returns true if the event executed on a device stream.
    pub fn is_device_event(&self) -> bool {
        self.stream != HOST_STREAM
    }

    /// Returns the correlation id, if the event carries one.
    pub fn correlation_id(&self) -> Option<i64> {
        (self.correlation > 0).then_some(self.correlation)
    }

    /// Effective duration. Zero-length events last one time unit so that
    /// their start and end never land on the same instant.
    pub fn effective_dur(&self) -> Timestamp {
        if self.dur == 0 {
            1
        } else {
            self.dur
        }
    }

    /// End of the event, saturating at the bounds of the time range.
    pub fn end_ts(&self) -> Timestamp {
        self.ts.saturating_add(self.effective_dur())
    }
}

#[cfg(test)]
impl TraceEvent {
    /// Host-side runtime call.
    pub(crate) fn host(index: u64, ts: Timestamp, name: SymbolId, correlation: i64) -> Self {
        Self {
            index,
            ts,
            dur: 1,
            pid: 100,
            tid: 101,
            stream: HOST_STREAM,
            name,
            correlation,
            memory_bw_gbps: None,
        }
    }

    /// Device-side kernel or memory operation.
    pub(crate) fn device(
        index: u64,
        ts: Timestamp,
        dur: Timestamp,
        stream: StreamId,
        name: SymbolId,
        correlation: i64,
    ) -> Self {
        Self {
            index,
            ts,
            dur,
            pid: 0,
            tid: stream,
            stream,
            name,
            correlation,
            memory_bw_gbps: None,
        }
    }

    pub(crate) fn with_bandwidth(mut self, gbps: f64) -> Self {
        self.memory_bw_gbps = Some(gbps);
        self
    }
}
