//! Counter construction errors.
//!
//! Missing data is never an error: ranks and groups without events are simply
//! left out of the results. Errors are reserved for traces that cannot be
//! interpreted.

use thiserror::Error;

use crate::{
    events::{Rank, Timestamp},
    symbols::SymbolId,
};

#[derive(Error, Debug, PartialEq)]
pub enum TraceError {
    #[error("rank {rank}: event {index} refers to unknown name id {name_id}")]
    UnknownSymbol {
        rank: Rank,
        index: u64,
        name_id: SymbolId,
    },

    #[error("rank {rank}: memory event {index} has no `memory_bw_gbps` field")]
    MissingBandwidth { rank: Rank, index: u64 },

    #[error("rank {rank}: memory event {index} has invalid bandwidth {value}")]
    InvalidBandwidth { rank: Rank, index: u64, value: f64 },

    #[error("rank {rank}: memory event {index} has negative duration {dur}")]
    NegativeDuration {
        rank: Rank,
        index: u64,
        dur: Timestamp,
    },
}

pub type Result<T> = std::result::Result<T, TraceError>;
