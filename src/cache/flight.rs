//! Per-key in-flight guards.
//!
//! A caller that holds the guard for a key is the only one fetching that key;
//! everyone else waits on the same slot and re-checks the store once it frees up.

use std::{hash::Hash, sync::Arc};

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

type Slot = Arc<Mutex<()>>;

pub struct InFlight<K: Eq + Hash> {
    slots: Arc<DashMap<K, Slot>>,
}

impl<K> InFlight<K>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self {
            slots: Arc::new(DashMap::new()),
        }
    }

    /// Wait until no other caller holds `key`, then hold it until the guard drops.
    pub async fn acquire(&self, key: K) -> FlightGuard<K> {
        let slot = self
            .slots
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let permit = slot.lock_owned().await;

        FlightGuard {
            key,
            permit: Some(permit),
            slots: Arc::clone(&self.slots),
        }
    }

    /// Number of keys currently held or waited on.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl<K> Default for InFlight<K>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

pub struct FlightGuard<K: Eq + Hash> {
    key: K,
    permit: Option<OwnedMutexGuard<()>>,
    slots: Arc<DashMap<K, Slot>>,
}

impl<K: Eq + Hash> Drop for FlightGuard<K> {
    fn drop(&mut self) {
        self.permit.take();
        // Only the map's own reference left means nobody is queued behind us.
        self.slots
            .remove_if(&self.key, |_, slot| Arc::strong_count(slot) == 1);
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    use super::*;

    #[tokio::test]
    async fn released_keys_are_forgotten() {
        let flights = InFlight::new();
        {
            let _guard = flights.acquire("posts:1:50").await;
            assert_eq!(flights.len(), 1);
        }
        assert!(flights.is_empty());
    }

    #[tokio::test]
    async fn distinct_keys_do_not_block_each_other() {
        let flights = InFlight::new();
        let _first = flights.acquire(1_u32).await;
        let second = tokio::time::timeout(Duration::from_secs(1), flights.acquire(2_u32)).await;
        assert!(second.is_ok());
        assert_eq!(flights.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn same_key_holders_run_one_at_a_time() {
        let flights = Arc::new(InFlight::new());
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let flights = Arc::clone(&flights);
            let active = Arc::clone(&active);
            let peak = Arc::clone(&peak);
            tasks.push(tokio::spawn(async move {
                let _guard = flights.acquire("same").await;
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for task in tasks {
            task.await.expect("task should finish");
        }

        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert!(flights.is_empty());
    }
}
