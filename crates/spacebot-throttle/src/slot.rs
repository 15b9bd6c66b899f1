use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::time::Instant;

use crate::key::Key;
use crate::timer::{TimerHandle, TimerService};

/// What to do when a key already holds a live timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OnOccupied {
    /// Cancel the live timer and arm a new one in its place
    Replace,
    /// Leave the live timer untouched
    Keep,
}

/// Result of [`SlotTable::install`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Installed {
    /// Slot was empty; a timer is now armed
    Fresh,
    /// Slot held a timer which was cancelled and superseded
    Replaced,
    /// Slot held a timer which was left running
    Kept,
}

struct Slot {
    generation: u64,
    deadline: Instant,
    timer: TimerHandle,
}

/// One pending timer per key.
///
/// Every armed timer carries a generation number. On firing, the timer
/// task removes its slot only if the generation still matches, and runs its
/// deferred work only if that removal succeeded. A timer that was superseded
/// or cancelled after it woke up therefore finds a different generation (or
/// none) and does nothing.
pub(crate) struct SlotTable<K: Key> {
    slots: DashMap<K, Slot>,
    next_generation: AtomicU64,
}

impl<K: Key> SlotTable<K> {
    pub(crate) fn new() -> Self {
        Self {
            slots: DashMap::new(),
            next_generation: AtomicU64::new(0),
        }
    }

    /// Arm a timer for `key`, deciding atomically against any live timer.
    ///
    /// `deferred` runs after the slot is released when the timer fires; it is
    /// dropped unrun if the timer is superseded, cancelled, or never armed.
    pub(crate) fn install(
        self: &Arc<Self>,
        key: K,
        timer: &dyn TimerService,
        delay: Duration,
        on_occupied: OnOccupied,
        deferred: Option<BoxFuture<'static, ()>>,
    ) -> Installed {
        // The entry guard holds the shard lock until the new slot is in place,
        // so a timer firing early blocks in `release` until then.
        match self.slots.entry(key) {
            Entry::Occupied(mut entry) => match on_occupied {
                OnOccupied::Keep => Installed::Kept,
                OnOccupied::Replace => {
                    let slot = self.arm(entry.key().clone(), timer, delay, deferred);
                    let previous = entry.insert(slot);
                    previous.timer.cancel();
                    Installed::Replaced
                }
            },
            Entry::Vacant(entry) => {
                let slot = self.arm(entry.key().clone(), timer, delay, deferred);
                entry.insert(slot);
                Installed::Fresh
            }
        }
    }

    fn arm(
        self: &Arc<Self>,
        key: K,
        timer: &dyn TimerService,
        delay: Duration,
        deferred: Option<BoxFuture<'static, ()>>,
    ) -> Slot {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let table = Arc::clone(self);

        let task = async move {
            if !table.release(&key, generation) {
                tracing::debug!(key = ?key, generation, "stale timer woke up, skipping");
                return;
            }
            if let Some(deferred) = deferred {
                deferred.await;
            }
        }
        .boxed();

        Slot {
            generation,
            deadline: Instant::now() + delay,
            timer: timer.schedule(delay, task),
        }
    }

    /// Remove the slot for `key` if it still belongs to `generation`.
    pub(crate) fn release(&self, key: &K, generation: u64) -> bool {
        self.slots
            .remove_if(key, |_, slot| slot.generation == generation)
            .is_some()
    }

    /// Cancel and clear the live timer for `key`, if any.
    pub(crate) fn cancel(&self, key: &K) -> bool {
        match self.slots.remove(key) {
            Some((_, slot)) => {
                slot.timer.cancel();
                true
            }
            None => false,
        }
    }

    pub(crate) fn is_pending(&self, key: &K) -> bool {
        self.slots.contains_key(key)
    }

    pub(crate) fn remaining(&self, key: &K) -> Option<Duration> {
        self.slots
            .get(key)
            .map(|slot| slot.deadline.saturating_duration_since(Instant::now()))
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    #[cfg(test)]
    fn generation_of(&self, key: &K) -> Option<u64> {
        self.slots.get(key).map(|slot| slot.generation)
    }
}
