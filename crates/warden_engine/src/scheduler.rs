//! # Category Scheduler
//!
//! One shuffled queue per category. Each cycle draws consecutive entries,
//! so every check in a pool is served once before any is served twice.
//!
//! ```text
//! order:  [ 4, 9, 1, 7, 3 ]      next_batch(2) -> [4, 9]
//!                ^cursor         next_batch(2) -> [1, 7]
//!                                next_batch(2) -> [3]        (remainder)
//!                                next_batch(2) -> reshuffle, [7, 1]
//! ```
//!
//! Each connection owns its own scheduler, so clients cannot learn the
//! order of one another's checks.

use rand::seq::SliceRandom;
use rand_chacha::ChaCha20Rng;
use tracing::trace;
use warden_catalog::{Category, CheckCatalog};

/// Shuffled order of one category pool.
#[derive(Clone, Debug)]
pub struct CategoryQueue {
    category: Category,
    order: Vec<u16>,
    cursor: usize,
}

impl CategoryQueue {
    /// Category served by this queue.
    #[must_use]
    pub const fn category(&self) -> Category {
        self.category
    }

    /// Entries left before the next reshuffle.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.order.len() - self.cursor
    }

    /// Number of checks in the pool.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns true if the pool is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Per-connection check order.
#[derive(Debug)]
pub struct CategoryScheduler {
    queues: [CategoryQueue; 3],
    rng: ChaCha20Rng,
}

impl CategoryScheduler {
    /// Creates a scheduler over the catalog pools, shuffling each.
    #[must_use]
    pub fn new(catalog: &CheckCatalog, mut rng: ChaCha20Rng) -> Self {
        let queues = Category::ALL.map(|category| {
            let mut order = catalog.ids_in(category).to_vec();
            order.shuffle(&mut rng);
            CategoryQueue {
                category,
                order,
                cursor: 0,
            }
        });
        Self { queues, rng }
    }

    /// Draws up to `max_count` checks of a category.
    ///
    /// A queue that was exhausted by an earlier call is reshuffled first. A
    /// queue that runs out during this call returns only what was left.
    pub fn next_batch(&mut self, category: Category, max_count: usize) -> Vec<u16> {
        let queue = &mut self.queues[category.index()];
        if queue.order.is_empty() || max_count == 0 {
            return Vec::new();
        }

        if queue.cursor >= queue.order.len() {
            queue.order.shuffle(&mut self.rng);
            queue.cursor = 0;
            trace!(%category, "reshuffled check queue");
        }

        let end = queue.order.len().min(queue.cursor + max_count);
        let batch = queue.order[queue.cursor..end].to_vec();
        queue.cursor = end;
        batch
    }

    /// Queue of a category.
    #[must_use]
    pub fn queue(&self, category: Category) -> &CategoryQueue {
        &self.queues[category.index()]
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use rand::SeedableRng;
    use warden_catalog::{Action, CheckKind, CheckRow};

    fn catalog(mem_ids: &[u32]) -> CheckCatalog {
        let rows: Vec<_> = mem_ids
            .iter()
            .map(|&id| CheckRow {
                id,
                kind: CheckKind::Mem.code(),
                length: 1,
                result: "00".to_string(),
                ..CheckRow::default()
            })
            .collect();
        CheckCatalog::load(&rows, Action::Log).unwrap()
    }

    #[test]
    fn test_full_pass_without_repetition() {
        let catalog = catalog(&[1, 2, 3, 4, 5]);
        let mut scheduler = CategoryScheduler::new(&catalog, ChaCha20Rng::seed_from_u64(7));

        let mut seen = HashSet::new();
        let sizes: Vec<_> = (0..3)
            .map(|_| {
                let batch = scheduler.next_batch(Category::Modded, 2);
                for id in &batch {
                    assert!(seen.insert(*id), "check {id} served twice in one pass");
                }
                batch.len()
            })
            .collect();

        assert_eq!(sizes, vec![2, 2, 1]);
        assert_eq!(seen.len(), 5);
        assert_eq!(scheduler.queue(Category::Modded).remaining(), 0);

        // Exhausted: the next call reshuffles and starts over
        let batch = scheduler.next_batch(Category::Modded, 2);
        assert_eq!(batch.len(), 2);
        assert_eq!(scheduler.queue(Category::Modded).remaining(), 3);
    }

    #[test]
    fn test_empty_pool_yields_nothing() {
        let catalog = catalog(&[1]);
        let mut scheduler = CategoryScheduler::new(&catalog, ChaCha20Rng::seed_from_u64(1));
        assert!(scheduler.next_batch(Category::Inject, 9).is_empty());
        assert!(scheduler.queue(Category::Inject).is_empty());
    }

    #[test]
    fn test_zero_count_leaves_cursor() {
        let catalog = catalog(&[1, 2]);
        let mut scheduler = CategoryScheduler::new(&catalog, ChaCha20Rng::seed_from_u64(1));
        assert!(scheduler.next_batch(Category::Modded, 0).is_empty());
        assert_eq!(scheduler.queue(Category::Modded).remaining(), 2);
    }

    #[test]
    fn test_same_seed_same_order() {
        let catalog = catalog(&[10, 20, 30, 40, 50, 60]);
        let mut a = CategoryScheduler::new(&catalog, ChaCha20Rng::seed_from_u64(99));
        let mut b = CategoryScheduler::new(&catalog, ChaCha20Rng::seed_from_u64(99));
        assert_eq!(a.next_batch(Category::Modded, 6), b.next_batch(Category::Modded, 6));
        assert_eq!(a.queue(Category::Modded).len(), 6);
    }
}
