//! Ordered key-value substrate for the range index
//!
//! The index needs two things from its backing store: plain key/value
//! storage for record payloads, and sorted sets ("indexes") of
//! `(score, member)` pairs that can answer "greatest score at or below X".
//! Writes are grouped into a [`WriteBatch`] and committed together.
//!
//! Two backends ship with the crate:
//!
//! - [`MemoryStore`]: everything in a `BTreeMap`/`HashMap` behind a lock
//! - [`FileStore`]: a `MemoryStore` rebuilt from an append-only log on open,
//!   with every commit appended to that log
//!
//! An index holds at most one member per score. Adding a member that is
//! already present moves it to the new score.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One `(score, member)` pair from a sorted index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    /// Sort key
    pub score: u32,
    /// Member, usually the key of a value in the same store
    pub member: String,
}

/// A single write inside a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WriteOp {
    /// Store `value` under `key`, replacing any previous value
    Set {
        /// Key
        key: String,
        /// Value bytes
        value: Vec<u8>,
    },
    /// Add `member` to the sorted index `index` with `score`
    IndexAdd {
        /// Index key
        index: String,
        /// Sort key
        score: u32,
        /// Member
        member: String,
    },
    /// Remove `key`, whether it names a value or a whole index
    Delete {
        /// Key
        key: String,
    },
}

/// Writes that are committed to the store as one unit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    /// Empty batch
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty batch with room for `capacity` operations
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            ops: Vec::with_capacity(capacity),
        }
    }

    /// Queue a value write
    pub fn set(&mut self, key: impl Into<String>, value: Vec<u8>) -> &mut Self {
        self.ops.push(WriteOp::Set {
            key: key.into(),
            value,
        });
        self
    }

    /// Queue a sorted index insertion
    pub fn index_add(
        &mut self,
        index: impl Into<String>,
        score: u32,
        member: impl Into<String>,
    ) -> &mut Self {
        self.ops.push(WriteOp::IndexAdd {
            index: index.into(),
            score,
            member: member.into(),
        });
        self
    }

    /// Queue a deletion
    pub fn delete(&mut self, key: impl Into<String>) -> &mut Self {
        self.ops.push(WriteOp::Delete { key: key.into() });
        self
    }

    /// Number of queued operations
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// True if nothing is queued
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Queued operations in order
    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    /// Take the operations, leaving the batch empty
    pub fn take(&mut self) -> WriteBatch {
        std::mem::take(self)
    }

    pub(crate) fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }
}

/// Ordered key-value store with batched writes
///
/// Implementations must be safe to read from other threads while a commit
/// is in progress; a reader sees each batch either entirely or not at all.
pub trait OrderedStore: Send + Sync {
    /// Value stored under `key`
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Entry with the greatest score `<= score` in `index`
    fn index_floor(&self, index: &str, score: u32) -> Result<Option<IndexEntry>>;

    /// Entry with the lowest score in `index`
    fn index_first(&self, index: &str) -> Result<Option<IndexEntry>>;

    /// Entry with the highest score in `index`
    fn index_last(&self, index: &str) -> Result<Option<IndexEntry>>;

    /// Number of entries in `index` (0 if it does not exist)
    fn index_len(&self, index: &str) -> Result<usize>;

    /// All entries of `index` in score order
    fn index_entries(&self, index: &str) -> Result<Vec<IndexEntry>>;

    /// Value keys starting with `prefix`, in no particular order
    fn keys(&self, prefix: &str) -> Result<Vec<String>>;

    /// Remove `key` (value or index); returns whether anything was removed
    fn delete(&self, key: &str) -> Result<bool>;

    /// Apply every operation of `batch`
    fn commit(&self, batch: WriteBatch) -> Result<()>;
}

impl<S: OrderedStore + ?Sized> OrderedStore for &S {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        (**self).get(key)
    }

    fn index_floor(&self, index: &str, score: u32) -> Result<Option<IndexEntry>> {
        (**self).index_floor(index, score)
    }

    fn index_first(&self, index: &str) -> Result<Option<IndexEntry>> {
        (**self).index_first(index)
    }

    fn index_last(&self, index: &str) -> Result<Option<IndexEntry>> {
        (**self).index_last(index)
    }

    fn index_len(&self, index: &str) -> Result<usize> {
        (**self).index_len(index)
    }

    fn index_entries(&self, index: &str) -> Result<Vec<IndexEntry>> {
        (**self).index_entries(index)
    }

    fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        (**self).keys(prefix)
    }

    fn delete(&self, key: &str) -> Result<bool> {
        (**self).delete(key)
    }

    fn commit(&self, batch: WriteBatch) -> Result<()> {
        (**self).commit(batch)
    }
}

impl<S: OrderedStore + ?Sized> OrderedStore for Arc<S> {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        (**self).get(key)
    }

    fn index_floor(&self, index: &str, score: u32) -> Result<Option<IndexEntry>> {
        (**self).index_floor(index, score)
    }

    fn index_first(&self, index: &str) -> Result<Option<IndexEntry>> {
        (**self).index_first(index)
    }

    fn index_last(&self, index: &str) -> Result<Option<IndexEntry>> {
        (**self).index_last(index)
    }

    fn index_len(&self, index: &str) -> Result<usize> {
        (**self).index_len(index)
    }

    fn index_entries(&self, index: &str) -> Result<Vec<IndexEntry>> {
        (**self).index_entries(index)
    }

    fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        (**self).keys(prefix)
    }

    fn delete(&self, key: &str) -> Result<bool> {
        (**self).delete(key)
    }

    fn commit(&self, batch: WriteBatch) -> Result<()> {
        (**self).commit(batch)
    }
}
