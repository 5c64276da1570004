//! # Query Metadata
//!
//! Columns referenced by a query are registered once in the memo's `Metadata` and referred
//! to everywhere else by a small `ColumnId`. Expression records and privates store only
//! ids, which keeps them pointer-free and hashable.

use crate::error::{OptError, Result};
use crate::types::Type;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Identifier of a column registered in [`Metadata`]. Ids start at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnId(pub u32);

impl fmt::Display for ColumnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

/// Ordered set of columns, used for output and outer columns.
pub type ColSet = BTreeSet<ColumnId>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMeta {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: Type,
}

/// Column registry of one query compilation.
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    columns: Vec<ColumnMeta>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a column and return its id.
    pub fn add_column(&mut self, name: impl Into<String>, ty: Type) -> ColumnId {
        self.columns.push(ColumnMeta {
            name: name.into(),
            ty,
        });
        ColumnId(self.columns.len() as u32)
    }

    pub fn column(&self, id: ColumnId) -> Result<&ColumnMeta> {
        id.0
            .checked_sub(1)
            .and_then(|i| self.columns.get(i as usize))
            .ok_or_else(|| OptError::UnknownColumn(id.to_string()))
    }

    pub fn column_type(&self, id: ColumnId) -> Result<&Type> {
        Ok(&self.column(id)?.ty)
    }

    /// Find a column by name. If several columns share a name the first one wins.
    pub fn find(&self, name: &str) -> Option<ColumnId> {
        self.columns
            .iter()
            .position(|c| c.name == name)
            .map(|i| ColumnId(i as u32 + 1))
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }
}
