use super::{IndexEntry, OrderedStore, WriteBatch, WriteOp};
use crate::error::Result;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

/// Sorted set with one member per score
#[derive(Debug, Clone, Default)]
struct SortedIndex {
    by_score: BTreeMap<u32, String>,
    by_member: HashMap<String, u32>,
}

impl SortedIndex {
    fn add(&mut self, score: u32, member: String) {
        if let Some(old_score) = self.by_member.get(&member).copied() {
            if old_score == score {
                return;
            }
            self.by_score.remove(&old_score);
        }
        if let Some(displaced) = self.by_score.insert(score, member.clone()) {
            self.by_member.remove(&displaced);
        }
        self.by_member.insert(member, score);
    }

    fn entry((score, member): (&u32, &String)) -> IndexEntry {
        IndexEntry {
            score: *score,
            member: member.clone(),
        }
    }
}

/// Plain data behind the lock; shared with the file store for replay
#[derive(Debug, Clone, Default)]
pub(super) struct MemoryState {
    values: HashMap<String, Vec<u8>>,
    indexes: HashMap<String, SortedIndex>,
}

impl MemoryState {
    /// Apply one operation, returning whether a delete removed something
    pub(super) fn apply(&mut self, op: WriteOp) -> bool {
        match op {
            WriteOp::Set { key, value } => {
                self.values.insert(key, value);
                false
            }
            WriteOp::IndexAdd {
                index,
                score,
                member,
            } => {
                self.indexes.entry(index).or_default().add(score, member);
                false
            }
            WriteOp::Delete { key } => {
                let value = self.values.remove(&key).is_some();
                let index = self.indexes.remove(&key).is_some();
                value || index
            }
        }
    }

    fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key) || self.indexes.contains_key(key)
    }

    /// Operations that rebuild this state from nothing
    pub(super) fn snapshot_ops(&self) -> Vec<WriteOp> {
        let mut ops = Vec::with_capacity(
            self.values.len() + self.indexes.values().map(|i| i.by_score.len()).sum::<usize>(),
        );
        for (key, value) in &self.values {
            ops.push(WriteOp::Set {
                key: key.clone(),
                value: value.clone(),
            });
        }
        for (index, sorted) in &self.indexes {
            for (score, member) in &sorted.by_score {
                ops.push(WriteOp::IndexAdd {
                    index: index.clone(),
                    score: *score,
                    member: member.clone(),
                });
            }
        }
        ops
    }
}

/// In-memory ordered store
///
/// Commits take the write lock once for the whole batch, so readers see a
/// batch either entirely or not at all.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    pub(super) fn from_state(state: MemoryState) -> Self {
        Self {
            state: RwLock::new(state),
        }
    }

    pub(super) fn snapshot_ops(&self) -> Vec<WriteOp> {
        self.state.read().snapshot_ops()
    }

    pub(super) fn contains(&self, key: &str) -> bool {
        self.state.read().contains(key)
    }

    /// Number of plain values held
    pub fn value_count(&self) -> usize {
        self.state.read().values.len()
    }
}

impl OrderedStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.state.read().values.get(key).cloned())
    }

    fn index_floor(&self, index: &str, score: u32) -> Result<Option<IndexEntry>> {
        let state = self.state.read();
        Ok(state
            .indexes
            .get(index)
            .and_then(|sorted| sorted.by_score.range(..=score).next_back())
            .map(SortedIndex::entry))
    }

    fn index_first(&self, index: &str) -> Result<Option<IndexEntry>> {
        let state = self.state.read();
        Ok(state
            .indexes
            .get(index)
            .and_then(|sorted| sorted.by_score.iter().next())
            .map(SortedIndex::entry))
    }

    fn index_last(&self, index: &str) -> Result<Option<IndexEntry>> {
        let state = self.state.read();
        Ok(state
            .indexes
            .get(index)
            .and_then(|sorted| sorted.by_score.iter().next_back())
            .map(SortedIndex::entry))
    }

    fn index_len(&self, index: &str) -> Result<usize> {
        Ok(self
            .state
            .read()
            .indexes
            .get(index)
            .map_or(0, |sorted| sorted.by_score.len()))
    }

    fn index_entries(&self, index: &str) -> Result<Vec<IndexEntry>> {
        let state = self.state.read();
        Ok(state
            .indexes
            .get(index)
            .map(|sorted| sorted.by_score.iter().map(SortedIndex::entry).collect())
            .unwrap_or_default())
    }

    fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .state
            .read()
            .values
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }

    fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.state.write().apply(WriteOp::Delete {
            key: key.to_string(),
        }))
    }

    fn commit(&self, batch: WriteBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut state = self.state.write();
        for op in batch.into_ops() {
            state.apply(op);
        }
        Ok(())
    }
}
