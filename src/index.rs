//! Key to multi-value storage used for auxiliary lookups (e.g. node locations
//! by node id). The encoders do not depend on it.

use std::mem::size_of;

/// Storage mapping one integer-like key to any number of values.
pub trait Multimap<K, V> {
    /// Record `value` under `key`. Existing values for `key` are kept.
    fn set(&mut self, key: K, value: V);

    /// Approximate number of stored entries.
    fn size(&self) -> usize;

    /// Approximate bytes of memory (or disk, for disk-backed stores) in use.
    fn used_memory(&self) -> usize;

    /// Drop all entries and release their memory.
    fn clear(&mut self);

    /// Prepare for lookups after all `set` calls. Most stores need nothing.
    fn sort(&mut self) {}
}

/// In-memory multimap backed by a flat vector of pairs.
///
/// Inserts are appends; [`sort`](Multimap::sort) orders by key (stably, so
/// values under one key keep insertion order) and enables binary-search
/// lookups. Lookups before sorting fall back to a linear scan.
#[derive(Clone, Debug)]
pub struct VecMultimap<K, V> {
    entries: Vec<(K, V)>,
    sorted: bool,
}

impl<K: Ord, V> VecMultimap<K, V> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            sorted: true,
        }
    }

    /// All values stored under `key`.
    pub fn get_all(&self, key: &K) -> Vec<&V> {
        if self.sorted {
            let start = self.entries.partition_point(|(k, _)| k < key);
            let end = self.entries.partition_point(|(k, _)| k <= key);
            self.entries[start..end].iter().map(|(_, v)| v).collect()
        } else {
            self.entries
                .iter()
                .filter(|(k, _)| k == key)
                .map(|(_, v)| v)
                .collect()
        }
    }

    pub fn is_sorted(&self) -> bool {
        self.sorted
    }
}

impl<K: Ord, V> Default for VecMultimap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord, V> Multimap<K, V> for VecMultimap<K, V> {
    fn set(&mut self, key: K, value: V) {
        if let Some((last, _)) = self.entries.last()
            && *last > key
        {
            self.sorted = false;
        }
        self.entries.push((key, value));
    }

    fn size(&self) -> usize {
        self.entries.len()
    }

    fn used_memory(&self) -> usize {
        size_of::<Self>() + self.entries.capacity() * size_of::<(K, V)>()
    }

    fn clear(&mut self) {
        self.entries = Vec::new();
        self.sorted = true;
    }

    fn sort(&mut self) {
        if !self.sorted {
            self.entries.sort_by(|a, b| a.0.cmp(&b.0));
            self.sorted = true;
        }
    }
}
