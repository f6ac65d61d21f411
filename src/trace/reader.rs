//! Recorded trace reader.
//!
//! A trace directory contains a `symbols.json` file holding the name table and
//! one `rank-<N>.events.json` file per rank. Events files are JSON arrays with
//! one record per line.

use std::{
    collections::{BTreeMap, BTreeSet},
    fs::File,
    io::{BufRead, BufReader, Lines},
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use nom::{
    bytes::complete::tag,
    character::complete::digit1,
    combinator::{eof, map_res},
    sequence::{delimited, terminated},
    IResult,
};
use tracing::{debug, info};

use crate::{
    events::{Rank, TraceEvent},
    symbols::SymbolTable,
};

use super::Trace;

const SYMBOLS_FILE: &str = "symbols.json";

struct TraceEvents {
    lines: Lines<BufReader<File>>,
    line_no: usize,
}

impl TraceEvents {
    #[inline]
    fn is_start_line(line: &str) -> bool {
        line.trim() == "["
    }

    #[inline]
    fn is_end_line(line: &str) -> bool {
        line.trim() == "]"
    }

    #[inline]
    fn is_blank(line: &str) -> bool {
        line.trim().is_empty()
    }

    fn parse_line(line: &str) -> Result<TraceEvent> {
        let start = line
            .find('{')
            .ok_or_else(|| anyhow::anyhow!("Record start ('{{') not found in line: {}", line))?;
        let end = line
            .rfind('}')
            .ok_or_else(|| anyhow::anyhow!("Record end ('}}') not found in line: {}", line))?
            + 1;
        let event: TraceEvent = serde_json::from_str(&line[start..end])?;
        Ok(event)
    }

    fn next_line(&mut self) -> Option<Result<String>> {
        loop {
            let res_line = self.lines.next()?;
            self.line_no += 1;
            match res_line {
                Ok(ref line) if Self::is_start_line(line) || Self::is_blank(line) => continue,
                Ok(ref line) if Self::is_end_line(line) => return None,
                _ => return Some(res_line.map_err(anyhow::Error::from)),
            }
        }
    }
}

impl Iterator for TraceEvents {
    type Item = Result<TraceEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        let line = self.next_line()?;
        let line_no = self.line_no;

        Some(
            line.and_then(|l| Self::parse_line(&l))
                .with_context(|| format!("line {}", line_no)),
        )
    }
}

impl From<File> for TraceEvents {
    fn from(file: File) -> Self {
        Self {
            lines: BufReader::new(file).lines(),
            line_no: 0,
        }
    }
}

/// Parse the rank from an events file name.
fn parse_rank(input: &str) -> IResult<&str, Rank> {
    let rank = map_res(digit1, str::parse::<Rank>);

    terminated(delimited(tag("rank-"), rank, tag(".events.json")), eof)(input)
}

/// Returns the rank stored in the events file `fname`.
pub fn rank_from_filename(fname: &str) -> Result<Rank> {
    match parse_rank(fname) {
        Ok((_, rank)) => Ok(rank),
        Err(_) => bail!("Error parsing {}", fname),
    }
}

/// Name of the events file of `rank`.
pub fn events_filename(rank: Rank) -> String {
    format!("rank-{}.events.json", rank)
}

/// Reads a trace directory.
pub struct TraceReader {
    path: PathBuf,
}

impl TraceReader {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the events file of every rank found in the directory.
    pub fn rank_files(&self) -> Result<BTreeMap<Rank, PathBuf>> {
        let dir = glob::Pattern::escape(&self.path().to_string_lossy());
        let pattern = format!("{}/rank-*.events.json", dir);
        let mut found = BTreeMap::new();

        for p in glob::glob(pattern.as_str())?.flatten() {
            let Some(fname) = p.file_name().and_then(|f| f.to_str()) else {
                continue;
            };

            match rank_from_filename(fname) {
                Ok(rank) => {
                    if let Some(prev) = found.insert(rank, p.clone()) {
                        bail!(
                            "Both {} and {} hold the events of rank {}",
                            prev.display(),
                            p.display(),
                            rank
                        );
                    }
                }
                Err(e) => debug!("skipping {}: {}", p.display(), e),
            }
        }

        Ok(found)
    }

    /// Returns the ranks for which an events file exists.
    pub fn ranks(&self) -> Result<BTreeSet<Rank>> {
        Ok(self.rank_files()?.into_keys().collect())
    }

    pub fn read_symbols(&self) -> Result<SymbolTable> {
        let path = self.path().join(SYMBOLS_FILE);
        let file =
            File::open(&path).with_context(|| format!("Failed to open {}", path.display()))?;
        let symbols: SymbolTable = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(symbols)
    }

    fn read_events_file(path: &Path) -> Result<Vec<TraceEvent>> {
        let file =
            File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;

        TraceEvents::from(file)
            .collect::<Result<Vec<_>>>()
            .with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Reads the events of `rank`, from the file discovered for it.
    pub fn read_events(&self, rank: Rank) -> Result<Vec<TraceEvent>> {
        match self.rank_files()?.get(&rank) {
            Some(path) => Self::read_events_file(path),
            None => bail!(
                "No events file for rank {} in {}",
                rank,
                self.path().display()
            ),
        }
    }

    /// Loads the symbol table and every rank of the directory.
    pub fn load(&self) -> Result<Trace> {
        let ranks: Vec<Rank> = self.ranks()?.into_iter().collect();
        self.load_ranks(&ranks)
    }

    /// Loads the symbol table and the requested ranks. Ranks without an events
    /// file are left out of the trace.
    pub fn load_ranks(&self, ranks: &[Rank]) -> Result<Trace> {
        let files = self.rank_files()?;
        let mut trace = Trace::new(self.read_symbols()?);

        for rank in ranks {
            let Some(path) = files.get(rank) else {
                debug!("no events file for rank {}", rank);
                continue;
            };

            let events = Self::read_events_file(path)?;
            debug!("rank {}: loaded {} events", rank, events.len());
            trace.insert_rank(*rank, events);
        }

        info!(
            "loaded {} rank(s) from {}",
            trace.ranks().count(),
            self.path().display()
        );

        Ok(trace)
    }
}
