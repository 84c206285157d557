//! Table cache - materialized row snapshot of one table
//!
//! **Purpose**: serve full-table reads without a store round trip
//!
//! The cache starts cold. The first full read (or engine warm-up) loads it;
//! afterwards every INSERT/UPDATE/DELETE/RESET the executor performs is
//! mirrored here right after the store call resolves, so the snapshot always
//! equals the store contents. Mutations on a cold cache are dropped, the
//! next load picks them up from the store.

use crate::storage::StoreKey;
use crate::types::Row;
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// Cache statistics
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CacheStats {
    /// Snapshot reads served from memory
    pub hits: u64,
    /// Snapshot reads that found the cache cold
    pub misses: u64,
    /// Rows currently held
    pub size: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Default)]
struct CacheState {
    loaded: bool,
    rows: BTreeMap<StoreKey, Row>,
}

#[derive(Debug, Default)]
pub struct TableCache {
    state: RwLock<CacheState>,
    stats: RwLock<CacheStats>,
}

impl TableCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loaded(&self) -> bool {
        self.state.read().loaded
    }

    /// Replace the snapshot with rows fetched from the store
    pub fn load(&self, rows: impl IntoIterator<Item = (StoreKey, Row)>) {
        let mut state = self.state.write();
        state.rows = rows.into_iter().collect();
        state.loaded = true;
        self.stats.write().size = state.rows.len();
    }

    /// All rows in key order, or `None` while cold
    pub fn snapshot(&self) -> Option<Vec<Row>> {
        let state = self.state.read();
        let mut stats = self.stats.write();
        if state.loaded {
            stats.hits += 1;
            Some(state.rows.values().cloned().collect())
        } else {
            stats.misses += 1;
            None
        }
    }

    pub fn upsert(&self, key: StoreKey, row: Row) {
        let mut state = self.state.write();
        if !state.loaded {
            return;
        }
        state.rows.insert(key, row);
        self.stats.write().size = state.rows.len();
    }

    pub fn remove(&self, key: &StoreKey) {
        let mut state = self.state.write();
        if !state.loaded {
            return;
        }
        state.rows.remove(key);
        self.stats.write().size = state.rows.len();
    }

    /// Empty snapshot that mirrors a cleared store
    pub fn clear(&self) {
        let mut state = self.state.write();
        state.rows.clear();
        state.loaded = true;
        self.stats.write().size = 0;
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.read().clone()
    }
}
