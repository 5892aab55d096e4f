//! Per-operation access declarations
//!
//! Every dispatchable operation declares, once at setup, the intent of
//! each of its array slots: read, write, or read-write. The resolver
//! consults the table on every call to decide transfers and freshness
//! updates; nothing ever mutates it after setup, so reads need no lock.

use std::collections::HashMap;

/// Declared intent of one array argument slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// The routine only reads the operand
    Read,
    /// The routine fully overwrites the operand
    Write,
    /// The routine reads and writes the operand
    ReadWrite,
}

impl AccessMode {
    /// Whether the routine observes the operand's current contents.
    pub const fn reads(self) -> bool {
        matches!(self, AccessMode::Read | AccessMode::ReadWrite)
    }

    /// Whether the routine produces new contents for the operand.
    pub const fn writes(self) -> bool {
        matches!(self, AccessMode::Write | AccessMode::ReadWrite)
    }
}

/// Immutable map from operation name to its declared slot modes
///
/// Built once through [`AccessTable::builder`] and installed by the
/// runtime's setup call; consulted, never mutated, by every dispatch.
#[derive(Debug, Default)]
pub struct AccessTable {
    entries: HashMap<&'static str, Box<[AccessMode]>>,
}

impl AccessTable {
    /// Start declaring operations.
    pub fn builder() -> AccessTableBuilder {
        AccessTableBuilder {
            entries: HashMap::new(),
        }
    }

    /// Declared slot modes of an operation, if it was declared.
    pub fn modes(&self, operation: &str) -> Option<&[AccessMode]> {
        self.entries.get(operation).map(|modes| &**modes)
    }

    /// Whether the operation was declared.
    pub fn contains(&self, operation: &str) -> bool {
        self.entries.contains_key(operation)
    }

    /// Number of declared operations.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no operations were declared.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Builder for [`AccessTable`]
#[derive(Debug)]
pub struct AccessTableBuilder {
    entries: HashMap<&'static str, Box<[AccessMode]>>,
}

impl AccessTableBuilder {
    /// Declare one operation's ordered slot modes.
    ///
    /// Re-declaring an operation replaces its entry; last declaration
    /// wins, which only matters before the table is built.
    pub fn operation(mut self, name: &'static str, modes: &[AccessMode]) -> Self {
        self.entries.insert(name, modes.into());
        self
    }

    /// Freeze the declarations.
    pub fn build(self) -> AccessTable {
        AccessTable { entries: self.entries }
    }
}
