use std::io::{self, Write};

use anyhow::{Context, Error, Result};
use clap::Parser;
use serde::Serialize;
use tracing::{debug, trace, warn};
use trace_counters::{
    cli::CLI,
    context::{Counter, CountersContext, Report},
    counters::{selected_ranks, TraceCounters},
    summary::SummaryTable,
    trace::reader::TraceReader,
};

fn write_json<T: Serialize>(value: &T, ctx: &CountersContext) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();

    if ctx.pretty {
        serde_json::to_writer_pretty(&mut out, value)?;
    } else {
        serde_json::to_writer(&mut out, value)?;
    }

    writeln!(out)?;
    Ok(())
}

fn write_summary<K>(table: Option<SummaryTable<K>>, ctx: &CountersContext) -> Result<()>
where
    K: Serialize,
{
    if table.is_none() {
        warn!("No data found for the requested ranks.");
    }

    write_json(&table.unwrap_or_default(), ctx)
}

pub fn run(ctx: &CountersContext) -> Result<()> {
    let ranks = selected_ranks(&ctx.ranks);

    let trace = TraceReader::new(&ctx.trace_dir)
        .load_ranks(&ranks)
        .with_context(|| format!("Failed to load trace {}", ctx.trace_dir.display()))?;

    let counters = TraceCounters::new(&trace).with_parallel(ctx.parallel);

    match (ctx.counter, ctx.report) {
        (Counter::QueueLength, Report::TimeSeries) => {
            write_json(&counters.queue_length_time_series(&ranks)?, ctx)
        }
        (Counter::QueueLength, Report::Summary) => {
            write_summary(counters.queue_length_summary(&ranks)?, ctx)
        }
        (Counter::MemoryBandwidth, Report::TimeSeries) => {
            write_json(&counters.memory_bandwidth_time_series(&ranks)?, ctx)
        }
        (Counter::MemoryBandwidth, Report::Summary) => {
            write_summary(counters.memory_bandwidth_summary(&ranks)?, ctx)
        }
    }
}

fn main() -> Result<(), Error> {
    let opts = CLI::parse();
    let ctx = CountersContext::from(&opts);

    tracing_subscriber::fmt()
        .with_env_filter(ctx.log_filter())
        .with_writer(io::stderr)
        .with_target(ctx.verbose >= 2)
        .init();

    debug!("trace-counters started with verbosity level: {}", ctx.verbose);
    trace!("Full CLI args: {:?}", std::env::args().collect::<Vec<_>>());

    run(&ctx)
}
