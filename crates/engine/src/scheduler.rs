//! Round-robin rotation over the polling set, with a backlog guard.

use poolwatch_core::PoolId;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Claim on the single tick slot; dropping it releases the slot.
#[derive(Debug)]
pub struct TickGuard<'a> {
    scheduler: &'a PollScheduler,
}

impl Drop for TickGuard<'_> {
    fn drop(&mut self) {
        self.scheduler.busy.store(false, Ordering::Release);
    }
}

/// Rotates through the active polling set one pool per tick.
///
/// Every pool gets an equal turn per full cycle; there is no priority
/// beyond insertion order. At most one tick runs at a time: if the
/// previous tick is still in flight, the next one is skipped instead of
/// queueing (bounded backlog, drop the newest schedule, never drop data).
#[derive(Debug, Default)]
pub struct PollScheduler {
    queue: Mutex<VecDeque<PoolId>>,
    busy: AtomicBool,
}

impl PollScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the tick slot. `None` means a previous tick is still running.
    pub fn begin_tick(&self) -> Option<TickGuard<'_>> {
        if self.busy.swap(true, Ordering::AcqRel) {
            None
        } else {
            Some(TickGuard { scheduler: self })
        }
    }

    /// Atomically replace the polling set. Surviving pools keep their
    /// current rotation order; new pools join at the tail.
    pub fn replace(&self, pools: Vec<PoolId>) {
        let incoming: HashSet<PoolId> = pools.iter().cloned().collect();
        let mut queue = self.queue.lock().unwrap_or_else(|e| e.into_inner());
        let mut next: VecDeque<PoolId> = queue
            .iter()
            .filter(|pool| incoming.contains(*pool))
            .cloned()
            .collect();
        let mut present: HashSet<PoolId> = next.iter().cloned().collect();
        for pool in pools {
            if present.insert(pool.clone()) {
                next.push_back(pool);
            }
        }
        *queue = next;
    }

    /// Advance the cursor: pop the head and requeue it at the tail.
    pub fn next_pool(&self) -> Option<PoolId> {
        let mut queue = self.queue.lock().unwrap_or_else(|e| e.into_inner());
        let pool = queue.pop_front()?;
        queue.push_back(pool.clone());
        Some(pool)
    }

    /// Drop a pool from the rotation (e.g. the feed is gone).
    pub fn remove(&self, pool: &PoolId) {
        let mut queue = self.queue.lock().unwrap_or_else(|e| e.into_inner());
        queue.retain(|p| p != pool);
    }

    pub fn len(&self) -> usize {
        self.queue.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current rotation order, head first.
    pub fn snapshot(&self) -> Vec<PoolId> {
        self.queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn pools(ids: &[&str]) -> Vec<PoolId> {
        ids.iter().map(|id| PoolId::new(id)).collect()
    }

    #[test]
    fn test_full_cycle_visits_every_pool_once() {
        let scheduler = PollScheduler::new();
        scheduler.replace(pools(&["a", "b", "c"]));

        let mut visited = Vec::new();
        for _ in 0..3 {
            visited.push(scheduler.next_pool().unwrap());
        }
        assert_eq!(visited, pools(&["a", "b", "c"]));

        // Second cycle repeats the same order.
        let mut second = Vec::new();
        for _ in 0..3 {
            second.push(scheduler.next_pool().unwrap());
        }
        assert_eq!(second, pools(&["a", "b", "c"]));
    }

    #[test]
    fn test_empty_set_is_noop() {
        let scheduler = PollScheduler::new();
        assert_eq!(scheduler.next_pool(), None);
        assert!(scheduler.is_empty());
    }

    #[test]
    fn test_replace_preserves_survivor_order() {
        let scheduler = PollScheduler::new();
        scheduler.replace(pools(&["a", "b", "c"]));
        // Advance so rotation order is b, c, a.
        scheduler.next_pool();

        // b dropped; d added.
        scheduler.replace(pools(&["a", "c", "d"]));
        assert_eq!(scheduler.snapshot(), pools(&["c", "a", "d"]));
    }

    #[test]
    fn test_replace_dedups_incoming() {
        let scheduler = PollScheduler::new();
        scheduler.replace(pools(&["a", "a", "b"]));
        assert_eq!(scheduler.snapshot(), pools(&["a", "b"]));
    }

    #[test]
    fn test_remove_drops_pool() {
        let scheduler = PollScheduler::new();
        scheduler.replace(pools(&["a", "b"]));
        scheduler.remove(&PoolId::new("a"));
        assert_eq!(scheduler.snapshot(), pools(&["b"]));
    }

    #[test]
    fn test_backlog_guard_allows_one_tick() {
        let scheduler = PollScheduler::new();

        let guard = scheduler.begin_tick().unwrap();
        assert!(scheduler.begin_tick().is_none());
        drop(guard);
        assert!(scheduler.begin_tick().is_some());
    }
}
