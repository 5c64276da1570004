//! # Interning Stores
//!
//! Variable-length child lists and private payloads are deduplicated by content. Interning
//! a value that was seen before returns the reference handed out the first time, so two
//! references are equal exactly when their contents are equal. Entries are append-only and
//! live as long as the memo.

use crate::expr::{GroupId, ListId, PrivateId};
use crate::private::Private;
use std::collections::HashMap;

/// Interned lists of group ids, stored back to back in one vector.
#[derive(Debug, Default)]
pub struct ListStore {
    storage: Vec<GroupId>,
    index: HashMap<Vec<GroupId>, ListId>,
}

impl ListStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, items: &[GroupId]) -> ListId {
        if items.is_empty() {
            return ListId::EMPTY;
        }
        if let Some(id) = self.index.get(items) {
            return *id;
        }
        let id = ListId {
            offset: self.storage.len() as u32,
            len: items.len() as u32,
        };
        self.storage.extend_from_slice(items);
        self.index.insert(items.to_vec(), id);
        id
    }

    /// # Panics
    ///
    /// Panics if `id` was not returned by this store.
    pub fn lookup(&self, id: ListId) -> &[GroupId] {
        let start = id.offset as usize;
        &self.storage[start..start + id.len as usize]
    }

    /// Whether `id` addresses a range inside the store.
    pub fn contains(&self, id: ListId) -> bool {
        (id.offset as usize)
            .checked_add(id.len as usize)
            .map_or(false, |end| end <= self.storage.len())
    }

    /// Number of distinct non-empty lists.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

/// Interned private payloads.
#[derive(Debug, Default)]
pub struct PrivateStore {
    values: Vec<Private>,
    index: HashMap<Private, PrivateId>,
}

impl PrivateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, value: Private) -> PrivateId {
        if let Some(id) = self.index.get(&value) {
            return *id;
        }
        let id = PrivateId(self.values.len() as u32);
        self.values.push(value.clone());
        self.index.insert(value, id);
        id
    }

    /// # Panics
    ///
    /// Panics if `id` was not returned by this store.
    pub fn lookup(&self, id: PrivateId) -> &Private {
        &self.values[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
