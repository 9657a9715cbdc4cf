//! `QueryContext` (§9 "Global mutable state"): the reference implementation
//! uses process globals (`g_memory`, `g_io`, `g_runtime`, `g_start_time`);
//! this crate instead threads an explicit, per-query context through every
//! `kfn` call, owned and aggregated by the benchmark harness (`driver.rs`).

use std::time::Instant;

use crate::heap::TopKHeap;

/// Per-query scratch and counters. Each query must own its own context (and
/// its own heap) — the index itself holds no per-query state, so
/// concurrent queries against one built index are safe as long as each
/// gets its own `QueryContext`.
pub struct QueryContext {
    pub heap: TopKHeap,
    /// Number of true Euclidean-distance evaluations performed.
    pub dist_count: usize,
    /// Number of page reads performed (external mode only).
    pub io_count: usize,
    start: Instant,
}

impl QueryContext {
    #[must_use]
    pub fn new(top_k: usize) -> Self {
        Self {
            heap: TopKHeap::new(top_k),
            dist_count: 0,
            io_count: 0,
            start: Instant::now(),
        }
    }

    /// Resets the heap and counters, restarting the wall-clock timer. Reuse
    /// one `QueryContext` across many queries of the same `top_k`.
    pub fn reset(&mut self) {
        self.heap.reset();
        self.dist_count = 0;
        self.io_count = 0;
        self.start = Instant::now();
    }

    #[must_use]
    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_clears_counters_and_heap() {
        let mut ctx = QueryContext::new(3);
        ctx.heap.insert(1.0, 1);
        ctx.dist_count = 5;
        ctx.io_count = 7;
        ctx.reset();
        assert!(ctx.heap.is_empty());
        assert_eq!(ctx.dist_count, 0);
        assert_eq!(ctx.io_count, 0);
    }
}
