//! Logical connection pool for the remote compile service.
//!
//! Slots model connection affinity, not exclusive ownership: when every slot
//! is taken, [`ConnectionPool::acquire`] reclaims the least recently used one
//! instead of waiting.

use std::time::Instant;

use tracing::{debug, warn};

/// One pool entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionSlot {
    /// Last time the slot was handed out; `None` if never.
    pub last_used: Option<Instant>,
    /// Free to be handed out.
    pub is_available: bool,
    /// The service behind this slot has been warmed up.
    pub warmed_up: bool,
}

impl Default for ConnectionSlot {
    fn default() -> Self {
        Self {
            last_used: None,
            is_available: true,
            warmed_up: false,
        }
    }
}

/// Fixed-size set of [`ConnectionSlot`]s.
#[derive(Debug, Clone)]
pub struct ConnectionPool {
    slots: Vec<ConnectionSlot>,
}

impl ConnectionPool {
    /// Create a pool of `size` cold slots. A size of zero is raised to one.
    pub fn new(size: usize) -> Self {
        Self {
            slots: vec![ConnectionSlot::default(); size.max(1)],
        }
    }

    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Hand out a slot and return its index.
    ///
    /// Prefers a warm free slot, then any free slot. With none free, the least
    /// recently used slot is reclaimed even though it may still be in use.
    pub fn acquire(&mut self) -> usize {
        let index = self
            .slots
            .iter()
            .position(|slot| slot.is_available && slot.warmed_up)
            .or_else(|| self.slots.iter().position(|slot| slot.is_available))
            .unwrap_or_else(|| {
                let index = self.least_recently_used();
                warn!(slot = index, "Connection pool exhausted, reclaiming LRU slot");
                index
            });

        let slot = &mut self.slots[index];
        slot.is_available = false;
        slot.last_used = Some(Instant::now());
        debug!(slot = index, warmed_up = slot.warmed_up, "Connection slot acquired");
        index
    }

    /// Return a slot to the pool. Warmup state is kept.
    pub fn release(&mut self, index: usize) {
        if let Some(slot) = self.slots.get_mut(index) {
            slot.is_available = true;
        }
    }

    /// Mark every slot warmed up.
    pub fn mark_all_warmed(&mut self) {
        for slot in &mut self.slots {
            slot.warmed_up = true;
        }
    }

    /// Returns `true` once warmup has succeeded.
    pub fn is_warmed(&self) -> bool {
        self.slots.iter().all(|slot| slot.warmed_up)
    }

    /// Number of slots free to hand out.
    pub fn available(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_available).count()
    }

    /// Copy of the slot at `index`.
    pub fn slot(&self, index: usize) -> Option<ConnectionSlot> {
        self.slots.get(index).copied()
    }

    fn least_recently_used(&self) -> usize {
        self.slots
            .iter()
            .enumerate()
            .min_by_key(|(_, slot)| slot.last_used)
            .map_or(0, |(index, _)| index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_pool_is_cold_and_free() {
        let pool = ConnectionPool::new(3);
        assert_eq!(pool.capacity(), 3);
        assert_eq!(pool.available(), 3);
        assert!(!pool.is_warmed());
        assert_eq!(pool.slot(0), Some(ConnectionSlot::default()));
    }

    #[test]
    fn test_zero_size_is_raised() {
        assert_eq!(ConnectionPool::new(0).capacity(), 1);
    }

    #[test]
    fn test_acquire_prefers_warm_slot() {
        let mut pool = ConnectionPool::new(3);
        let first = pool.acquire();
        pool.mark_all_warmed();
        pool.release(first);

        // All warm now; the released slot is the first warm free one.
        assert_eq!(pool.acquire(), first);
    }

    #[test]
    fn test_fourth_acquire_reclaims_lru() {
        let mut pool = ConnectionPool::new(3);
        let a = pool.acquire();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = pool.acquire();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let c = pool.acquire();
        assert_eq!(pool.available(), 0);
        assert_eq!([a, b, c], [0, 1, 2]);

        let reclaimed = pool.acquire();
        assert_eq!(reclaimed, a);
        assert_eq!(pool.available(), 0);
    }

    #[test]
    fn test_release_keeps_warmup() {
        let mut pool = ConnectionPool::new(2);
        let index = pool.acquire();
        pool.mark_all_warmed();
        pool.release(index);

        let slot = pool.slot(index).unwrap();
        assert!(slot.is_available);
        assert!(slot.warmed_up);
        assert!(slot.last_used.is_some());
    }

    #[test]
    fn test_release_out_of_range_is_ignored() {
        let mut pool = ConnectionPool::new(1);
        pool.release(7);
        assert_eq!(pool.available(), 1);
    }
}
