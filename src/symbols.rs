//! Name id to name mapping.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Name identifier used by trace events.
pub type SymbolId = i64;

/// Runtime call enqueuing a kernel.
pub const LAUNCH_KERNEL: &str = "cudaLaunchKernel";
/// Runtime call enqueuing an asynchronous memory copy.
pub const MEMCPY_ASYNC: &str = "cudaMemcpyAsync";
/// Runtime call enqueuing an asynchronous memory set.
pub const MEMSET_ASYNC: &str = "cudaMemsetAsync";

/// Runtime calls that put work on a device stream.
pub const ENQUEUE_CALLS: [&str; 3] = [LAUNCH_KERNEL, MEMCPY_ASYNC, MEMSET_ASYNC];

/// Bidirectional symbol table. The id of a name is its position in the table.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct SymbolTable {
    names: Vec<String>,
    ids: HashMap<String, SymbolId>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the id of `name`, adding it to the table if needed.
    pub fn insert(&mut self, name: &str) -> SymbolId {
        if let Some(id) = self.ids.get(name) {
            return *id;
        }

        let id = self.names.len() as SymbolId;
        self.names.push(name.to_owned());
        self.ids.insert(name.to_owned(), id);
        id
    }

    pub fn sym_id(&self, name: &str) -> Option<SymbolId> {
        self.ids.get(name).copied()
    }

    pub fn name(&self, id: SymbolId) -> Option<&str> {
        usize::try_from(id)
            .ok()
            .and_then(|i| self.names.get(i))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Ids of the enqueuing runtime calls present in this table.
    pub fn enqueue_call_ids(&self) -> Vec<SymbolId> {
        ENQUEUE_CALLS
            .iter()
            .filter_map(|name| self.sym_id(name))
            .collect()
    }
}

impl From<Vec<String>> for SymbolTable {
    fn from(names: Vec<String>) -> Self {
        // First occurrence wins on duplicated names.
        let mut ids = HashMap::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            ids.entry(name.clone()).or_insert(i as SymbolId);
        }

        Self { names, ids }
    }
}

impl From<SymbolTable> for Vec<String> {
    fn from(table: SymbolTable) -> Self {
        table.names
    }
}
