//! Dirty chunk tracking
//!
//! Edits mark the chunks they touch; a scheduling cycle drains everything
//! marked so far in one go. Marks that arrive after the drain start the next
//! cycle's set.

use std::collections::{BTreeMap, BTreeSet};

use log::debug;

use crate::chunk::{chunks_overlapping, ChunkKey};
use crate::geometry::TileRect;

/// Dirty chunk keys grouped by priority level.
#[derive(Debug)]
pub struct DirtyTracker {
    levels: BTreeMap<i32, BTreeSet<ChunkKey>>,
    chunk_size: u32,
}

impl DirtyTracker {
    pub fn new(chunk_size: u32) -> Self {
        Self {
            levels: BTreeMap::new(),
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    /// Mark every chunk `rect` overlaps at `level`. Returns how many chunks
    /// were not already dirty.
    pub fn mark(&mut self, rect: &TileRect, level: i32) -> usize {
        let set = self.levels.entry(level).or_default();
        let before = set.len();
        for key in chunks_overlapping(rect, level, self.chunk_size) {
            set.insert(key);
        }
        let added = set.len() - before;
        debug!(
            "mark_dirty: {:?} at z{} -> {} new chunks (total {})",
            rect,
            level,
            added,
            set.len()
        );
        added
    }

    pub fn is_empty(&self) -> bool {
        self.levels.values().all(|s| s.is_empty())
    }

    /// Number of dirty chunks across all levels.
    pub fn len(&self) -> usize {
        self.levels.values().map(|s| s.len()).sum()
    }

    /// Levels that currently hold dirty chunks.
    pub fn levels(&self) -> Vec<i32> {
        self.levels
            .iter()
            .filter(|(_, s)| !s.is_empty())
            .map(|(&z, _)| z)
            .collect()
    }

    pub fn is_dirty(&self, key: &ChunkKey) -> bool {
        self.levels.get(&key.level).is_some_and(|s| s.contains(key))
    }

    /// Drain all dirty chunks, lowest level first.
    pub fn take(&mut self) -> Vec<ChunkKey> {
        let levels = std::mem::take(&mut self.levels);
        levels.into_values().flatten().collect()
    }
}
