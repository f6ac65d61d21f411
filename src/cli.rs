//! Command line interface.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{digit1, space0},
    combinator::{all_consuming, map, map_res},
    multi::separated_list1,
    sequence::{delimited, separated_pair},
    IResult,
};

use crate::events::Rank;

/// A list of ranks, written as comma separated ranks or inclusive ranges
/// (e.g. `0,2-4`).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RankList(pub Vec<Rank>);

fn rank(input: &str) -> IResult<&str, Rank> {
    map_res(digit1, str::parse::<Rank>)(input)
}

fn rank_item(input: &str) -> IResult<&str, (Rank, Rank)> {
    alt((
        separated_pair(rank, tag("-"), rank),
        map(rank, |r| (r, r)),
    ))(input)
}

fn rank_items(input: &str) -> IResult<&str, Vec<(Rank, Rank)>> {
    all_consuming(separated_list1(
        delimited(space0, tag(","), space0),
        rank_item,
    ))(input.trim())
}

/// Parses a rank list argument.
pub fn parse_rank_list(s: &str) -> Result<RankList, String> {
    let (_, items) = rank_items(s).map_err(|_| format!("invalid rank list: {:?}", s))?;

    let mut ranks = Vec::new();
    for (first, last) in items {
        if first > last {
            return Err(format!("invalid rank range: {}-{}", first, last));
        }
        ranks.extend(first..=last);
    }

    Ok(RankList(ranks))
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum CounterCommand {
    /// Outstanding operations per device stream.
    QueueLength {
        /// Report per-stream statistics instead of the time series.
        #[arg(long)]
        summary: bool,
    },
    /// Memory bandwidth per memory channel.
    MemoryBw {
        /// Report per-channel statistics instead of the time series.
        #[arg(long)]
        summary: bool,
    },
}

impl CounterCommand {
    pub fn summary(&self) -> bool {
        match self {
            CounterCommand::QueueLength { summary } | CounterCommand::MemoryBw { summary } => {
                *summary
            }
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Queue length and memory bandwidth counters for accelerator traces"
)]
pub struct CLI {
    /// Trace directory, holding `symbols.json` and `rank-<N>.events.json` files.
    pub trace_dir: PathBuf,

    /// Ranks to analyze (e.g. `0,2-4`). Defaults to rank 0.
    #[arg(short, long, value_parser = parse_rank_list)]
    ranks: Option<RankList>,

    /// Process ranks concurrently.
    #[arg(long)]
    parallel: bool,

    /// Pretty-print the JSON output.
    #[arg(long)]
    pretty: bool,

    /// Increase logging verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: CounterCommand,
}

impl CLI {
    pub fn ranks(&self) -> Vec<Rank> {
        self.ranks.clone().map(|r| r.0).unwrap_or_default()
    }

    pub fn parallel(&self) -> bool {
        self.parallel
    }

    pub fn pretty(&self) -> bool {
        self.pretty
    }
}
