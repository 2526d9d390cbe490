//! Spawn point allocation.

use crate::error::{ArenaError, Result};
use arena_shared::Vec3;
use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Hands out arena spawn points without repetition until the pool is refilled.
///
/// `available + assigned == total` holds between refills; `release_all`
/// forgets every outstanding assignment.
pub struct SpawnAllocator {
    points: Vec<Vec3>,
    free: Vec<Vec3>,
    rng: StdRng,
}

impl SpawnAllocator {
    pub fn new(points: Vec<Vec3>) -> Self {
        Self::with_rng(points, StdRng::from_entropy())
    }

    pub fn with_seed(points: Vec<Vec3>, seed: u64) -> Self {
        Self::with_rng(points, StdRng::seed_from_u64(seed))
    }

    fn with_rng(points: Vec<Vec3>, rng: StdRng) -> Self {
        Self {
            free: points.clone(),
            points,
            rng,
        }
    }

    /// Removes a uniformly random point from the pool.
    pub fn take(&mut self) -> Result<Vec3> {
        if self.free.is_empty() {
            return Err(ArenaError::PoolExhausted);
        }
        let index = self.rng.gen_range(0..self.free.len());
        Ok(self.free.swap_remove(index))
    }

    /// Restores the pool to the full configured set.
    pub fn release_all(&mut self) {
        self.free.clear();
        self.free.extend_from_slice(&self.points);
        debug!("Spawn pool refilled ({} points)", self.points.len());
    }

    pub fn available(&self) -> usize {
        self.free.len()
    }

    pub fn assigned(&self) -> usize {
        self.points.len() - self.free.len()
    }

    pub fn total(&self) -> usize {
        self.points.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points(count: usize) -> Vec<Vec3> {
        (0..count).map(|i| Vec3::new(i as f32, 0.0, 0.0)).collect()
    }

    #[test]
    fn test_take_until_exhausted() {
        let mut pool = SpawnAllocator::with_seed(points(3), 1);

        for expected_free in (0..3).rev() {
            assert!(pool.take().is_ok());
            assert_eq!(pool.available(), expected_free);
            assert_eq!(pool.available() + pool.assigned(), pool.total());
        }

        assert_eq!(pool.take(), Err(ArenaError::PoolExhausted));
    }

    #[test]
    fn test_taken_points_are_unique() {
        let mut pool = SpawnAllocator::with_seed(points(16), 7);
        let mut taken: Vec<Vec3> = (0..16).map(|_| pool.take().unwrap()).collect();

        taken.sort_by(|a, b| a.x.total_cmp(&b.x));
        taken.dedup();
        assert_eq!(taken.len(), 16);
    }

    #[test]
    fn test_release_all_refills() {
        let mut pool = SpawnAllocator::with_seed(points(4), 3);
        pool.take().unwrap();
        pool.take().unwrap();

        pool.release_all();

        assert_eq!(pool.available(), 4);
        assert_eq!(pool.assigned(), 0);
    }

    #[test]
    fn test_no_duplicates_across_release_cycles() {
        let mut pool = SpawnAllocator::with_seed(points(5), 11);

        for round in 0..20 {
            let mut held = Vec::new();
            for _ in 0..(round % 5 + 1) {
                let point = pool.take().unwrap();
                assert!(!held.contains(&point));
                held.push(point);
            }
            pool.release_all();
            assert_eq!(pool.available(), 5);
        }
    }
}
