//! Work-group execution model for CPU kernels
//!
//! Kernels are written against the GPU model they were designed for: a
//! dispatch is split into work-groups, each work-group runs `local_size`
//! lanes, and lanes of one group share a small local memory.
//!
//! - Lanes of one stage run in parallel on the rayon pool.
//! - [`WorkGroup::run_stage`] returns only after every lane of the stage has
//!   finished. That join is the group barrier: a lane of stage `s + 1`
//!   observes every store made during stage `s`.
//! - [`LocalMemory`] is atomic, so lanes of a stage may touch it concurrently
//!   without unsynchronized shared state. Within a stage, lanes must write
//!   disjoint cells.
//! - Local memory is created per work-group and dropped with it; nothing is
//!   shared across groups.

use std::sync::atomic::{AtomicU32, Ordering};

use rayon::prelude::*;

/// One work-group of a dispatch
#[derive(Debug, Clone, Copy)]
pub struct WorkGroup {
    group_id: usize,
    local_size: usize,
}

impl WorkGroup {
    pub fn new(group_id: usize, local_size: usize) -> Self {
        Self {
            group_id,
            local_size,
        }
    }

    pub fn group_id(&self) -> usize {
        self.group_id
    }

    pub fn local_size(&self) -> usize {
        self.local_size
    }

    /// Run `lane` once per local id, then wait for all of them (barrier)
    pub fn run_stage<F>(&self, lane: F)
    where
        F: Fn(usize) + Sync + Send,
    {
        (0..self.local_size).into_par_iter().for_each(lane);
    }

    /// Run `lane` once per local id and gather the per-lane results in lane order
    pub fn map_lanes<T, F>(&self, lane: F) -> Vec<T>
    where
        T: Send,
        F: Fn(usize) -> T + Sync + Send,
    {
        (0..self.local_size).into_par_iter().map(lane).collect()
    }
}

/// Reduce per-lane partial sums into one value visible to every lane.
///
/// Partials are combined in lane order so the result does not depend on
/// scheduling.
pub fn subgroup_reduce_add(partials: &[f32]) -> f32 {
    partials.iter().sum()
}

/// Fixed-capacity local memory of one work-group.
///
/// Cells hold `i32` values, e.g. the index permutation of a sort row.
#[derive(Debug)]
pub struct LocalMemory {
    cells: Vec<AtomicU32>,
}

impl LocalMemory {
    pub fn new(capacity: usize) -> Self {
        Self {
            cells: (0..capacity).map(|_| AtomicU32::new(0)).collect(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.cells.len()
    }

    // Relaxed suffices: cross-stage visibility comes from the stage join.
    #[inline]
    pub fn load_i32(&self, index: usize) -> i32 {
        self.cells[index].load(Ordering::Relaxed) as i32
    }

    #[inline]
    pub fn store_i32(&self, index: usize, value: i32) {
        self.cells[index].store(value as u32, Ordering::Relaxed);
    }

    /// Exchange two cells. Callers guarantee no other lane touches either
    /// cell during the current stage.
    #[inline]
    pub fn swap(&self, a: usize, b: usize) {
        let va = self.cells[a].load(Ordering::Relaxed);
        let vb = self.cells[b].load(Ordering::Relaxed);
        self.cells[a].store(vb, Ordering::Relaxed);
        self.cells[b].store(va, Ordering::Relaxed);
    }

    pub fn to_i32_vec(&self, len: usize) -> Vec<i32> {
        (0..len).map(|i| self.load_i32(i)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_lanes_preserves_lane_order() {
        let group = WorkGroup::new(0, 16);
        let ids = group.map_lanes(|lane| lane * 2);
        assert_eq!(ids, (0..16).map(|l| l * 2).collect::<Vec<_>>());
    }

    #[test]
    fn test_stage_join_acts_as_barrier() {
        // Each stage reads a neighbour written in the previous stage.
        let group = WorkGroup::new(0, 64);
        let local = LocalMemory::new(64);
        group.run_stage(|lane| local.store_i32(lane, lane as i32));
        let next = LocalMemory::new(64);
        group.run_stage(|lane| {
            let neighbour = local.load_i32((lane + 1) % 64);
            next.store_i32(lane, neighbour);
        });
        for lane in 0..64 {
            assert_eq!(next.load_i32(lane), ((lane + 1) % 64) as i32);
        }
    }

    #[test]
    fn test_local_memory_starts_zeroed() {
        let local = LocalMemory::new(4);
        local.store_i32(2, -5);
        assert_eq!(local.to_i32_vec(4), vec![0, 0, -5, 0]);
        assert_eq!(local.capacity(), 4);
    }

    #[test]
    fn test_local_memory_swap() {
        let local = LocalMemory::new(2);
        local.store_i32(0, 7);
        local.store_i32(1, -3);
        local.swap(0, 1);
        assert_eq!(local.to_i32_vec(2), vec![-3, 7]);
    }

    #[test]
    fn test_subgroup_reduce_add() {
        assert_eq!(subgroup_reduce_add(&[1.0, 2.0, 3.5]), 6.5);
        assert_eq!(subgroup_reduce_add(&[]), 0.0);
    }
}
