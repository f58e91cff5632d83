//! Process-wide monotonic id counters for `mask` and `shading` elements.
//!
//! Modeled as a shared value passed into the interpreter rather than true
//! global state. Cloning a [`Counters`] shares the same underlying atomics,
//! so multiple pages rendered from the same [`Counters`] handle never
//! collide in `defs` ids even if run concurrently across threads.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct Counters {
    mask_count: Arc<AtomicU32>,
    shading_count: Arc<AtomicU32>,
}

impl Counters {
    pub fn new() -> Counters {
        Counters::default()
    }

    /// Returns the next unique mask id, e.g. `mask0`, `mask1`, ...
    pub fn next_mask_id(&self) -> String {
        let n = self.mask_count.fetch_add(1, Ordering::Relaxed);
        format!("mask{}", n)
    }

    /// Returns the next unique shading id, e.g. `shading0`, `shading1`, ...
    /// Used for gradients, tiling patterns, and shading fills alike — they
    /// all share `defs` id-space under the `shading` prefix.
    pub fn next_shading_id(&self) -> String {
        let n = self.shading_count.fetch_add(1, Ordering::Relaxed);
        format!("shading{}", n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_are_monotonic_and_shared_across_clones() {
        let counters = Counters::new();
        let clone = counters.clone();
        assert_eq!(counters.next_mask_id(), "mask0");
        assert_eq!(clone.next_mask_id(), "mask1");
        assert_eq!(counters.next_shading_id(), "shading0");
    }
}
