//! Runtime parameters.
//!
//! This module defines the `CountersContext` struct containing all the
//! parameters needed at runtime. It is meant to be built from command line
//! parameters.
//! ```no_run
//! use trace_counters::{cli::CLI, context::CountersContext};
//! use clap::Parser;
//!
//! let args = CLI::parse();
//! let ctx = CountersContext::from(&args);
//! ```

use std::path::PathBuf;

use crate::cli::{CounterCommand, CLI};
use crate::events::Rank;

/// Counter requested by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    QueueLength,
    MemoryBandwidth,
}

/// What to report for the requested counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Report {
    TimeSeries,
    Summary,
}

pub struct CountersContext {
    /// Trace directory.
    pub trace_dir: PathBuf,
    /// Requested ranks. Empty means rank 0.
    pub ranks: Vec<Rank>,
    pub counter: Counter,
    pub report: Report,
    /// If true, ranks are processed concurrently.
    pub parallel: bool,
    pub pretty: bool,
    pub verbose: u8,
}

impl CountersContext {
    /// Tracing filter matching the requested verbosity.
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

impl From<&CLI> for CountersContext {
    fn from(cli_opts: &CLI) -> Self {
        let counter = match cli_opts.command {
            CounterCommand::QueueLength { .. } => Counter::QueueLength,
            CounterCommand::MemoryBw { .. } => Counter::MemoryBandwidth,
        };

        let report = if cli_opts.command.summary() {
            Report::Summary
        } else {
            Report::TimeSeries
        };

        Self {
            trace_dir: cli_opts.trace_dir.clone(),
            ranks: cli_opts.ranks(),
            counter,
            report,
            parallel: cli_opts.parallel(),
            pretty: cli_opts.pretty(),
            verbose: cli_opts.verbose,
        }
    }
}
