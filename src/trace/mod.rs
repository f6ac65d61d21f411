//! In-memory trace.
//!
//! A `Trace` holds one event table per rank and the symbol table shared by all
//! ranks. It is usually loaded from disk with `reader::TraceReader`, but can
//! also be assembled by hand.

pub mod reader;

use std::collections::BTreeMap;

use crate::{
    events::{Rank, TraceEvent},
    symbols::SymbolTable,
    EventSource,
};

#[derive(Debug, Default, Clone)]
pub struct Trace {
    symbols: SymbolTable,
    ranks: BTreeMap<Rank, Vec<TraceEvent>>,
}

impl Trace {
    pub fn new(symbols: SymbolTable) -> Self {
        Self {
            symbols,
            ranks: BTreeMap::new(),
        }
    }

    /// Sets the event table of `rank`, replacing any previous one.
    pub fn with_rank(mut self, rank: Rank, events: Vec<TraceEvent>) -> Self {
        self.insert_rank(rank, events);
        self
    }

    pub fn insert_rank(&mut self, rank: Rank, events: Vec<TraceEvent>) {
        self.ranks.insert(rank, events);
    }

    pub fn ranks(&self) -> impl Iterator<Item = Rank> + '_ {
        self.ranks.keys().copied()
    }
}

impl EventSource for Trace {
    fn events(&self, rank: Rank) -> Option<&[TraceEvent]> {
        self.ranks.get(&rank).map(Vec::as_slice)
    }

    fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }
}
