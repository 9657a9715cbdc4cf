//! Bounded top-k max-heap (C2): maintains the `k` largest `(key, id)` pairs
//! seen. `k <= 10` in every use case in this crate, so a sorted `Vec` with
//! `O(k)` insertion (matching the reference `MaxK_List`) is preferable to a
//! binary-heap data structure.

use serde::{Deserialize, Serialize};

/// A `(key, id)` pair: a heap entry (§C2) or a hash-table row (§C5/C6),
/// key = projected/true distance, id = object id.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FnResult {
    pub key: f32,
    pub id: i32,
}

impl FnResult {
    #[must_use]
    pub fn new(key: f32, id: i32) -> Self {
        Self { key, id }
    }
}

/// Bounded max-heap over `FnResult`, holding at most `k` entries sorted
/// descending by key. `ith_key(0)` is the largest, `min_key()` the
/// smallest (the current k-th largest, or `-inf` while underfull).
#[derive(Debug, Clone)]
pub struct TopKHeap {
    k: usize,
    entries: Vec<FnResult>,
}

impl TopKHeap {
    #[must_use]
    pub fn new(k: usize) -> Self {
        Self {
            k,
            entries: Vec::with_capacity(k),
        }
    }

    /// Restore to the empty state in O(k) (reuses the allocation).
    pub fn reset(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.k
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.k
    }

    /// 0-based i-th largest key. Monotone non-increasing in `i`. Returns
    /// `-inf` for out-of-range `i` (an underfull heap).
    #[must_use]
    pub fn ith_key(&self, i: usize) -> f32 {
        self.entries.get(i).map_or(f32::NEG_INFINITY, |e| e.key)
    }

    #[must_use]
    pub fn ith(&self, i: usize) -> Option<FnResult> {
        self.entries.get(i).copied()
    }

    /// Smallest currently-stored key, or `-inf` if underfull.
    #[must_use]
    pub fn min_key(&self) -> f32 {
        if self.entries.len() < self.k {
            f32::NEG_INFINITY
        } else {
            self.entries.last().map_or(f32::NEG_INFINITY, |e| e.key)
        }
    }

    /// Inserts `(key, id)` iff `key > min_key()` (or the heap is not yet
    /// full); ties with `min_key()` are rejected. Returns the new
    /// `min_key()`.
    pub fn insert(&mut self, key: f32, id: i32) -> f32 {
        if self.entries.len() < self.k {
            let pos = self.entries.partition_point(|e| e.key > key);
            self.entries.insert(pos, FnResult::new(key, id));
        } else if key > self.min_key() {
            let pos = self.entries.partition_point(|e| e.key > key);
            self.entries.insert(pos, FnResult::new(key, id));
            self.entries.pop();
        }
        self.min_key()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[FnResult] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_heap_min_key_is_neg_infinity() {
        let h = TopKHeap::new(3);
        assert_eq!(h.min_key(), f32::NEG_INFINITY);
        assert_eq!(h.ith_key(0), f32::NEG_INFINITY);
    }

    #[test]
    fn insert_keeps_descending_order() {
        let mut h = TopKHeap::new(3);
        for (k, id) in [(1.0, 1), (5.0, 2), (3.0, 3), (9.0, 4), (0.5, 5)] {
            h.insert(k, id);
        }
        assert_eq!(h.len(), 3);
        let keys: Vec<f32> = h.as_slice().iter().map(|e| e.key).collect();
        assert_eq!(keys, vec![9.0, 5.0, 3.0]);
        for i in 0..h.len() - 1 {
            assert!(h.ith_key(i) >= h.ith_key(i + 1));
        }
    }

    #[test]
    fn ties_with_min_key_are_rejected() {
        let mut h = TopKHeap::new(2);
        h.insert(5.0, 1);
        h.insert(3.0, 2);
        // heap full, min_key() == 3.0; inserting an exact tie must be rejected
        let before = h.as_slice().to_vec();
        h.insert(3.0, 99);
        assert_eq!(h.as_slice(), before.as_slice());
    }

    #[test]
    fn reset_empties_without_reallocating_capacity() {
        let mut h = TopKHeap::new(4);
        h.insert(1.0, 1);
        h.insert(2.0, 2);
        h.reset();
        assert!(h.is_empty());
        assert_eq!(h.min_key(), f32::NEG_INFINITY);
    }

    #[test]
    fn underfull_heap_accepts_any_key() {
        let mut h = TopKHeap::new(5);
        h.insert(-100.0, 1);
        assert_eq!(h.len(), 1);
        assert!(!h.is_full());
    }
}
