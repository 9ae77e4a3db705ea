use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rail_core::TripId;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

struct Slot {
    mutex: Arc<Mutex<()>>,
    /// Holders plus waiters.
    users: usize,
}

/// Registry of per-trip async mutexes.
///
/// Reservations for the same trip queue on one mutex; different trips never share one.
/// Slots are created on first use and dropped again once nobody holds or waits on them.
#[derive(Default)]
pub struct TripLocks {
    slots: DashMap<TripId, Slot>,
}

impl TripLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `trip_id`.
    ///
    /// Cancel-safe: dropping the future while it waits leaves nothing held.
    pub async fn acquire(&self, trip_id: TripId) -> TripLockGuard<'_> {
        let lease = self.lease(trip_id);
        let guard = lease.mutex.clone().lock_owned().await;

        TripLockGuard {
            guard: Some(guard),
            lease,
        }
    }

    /// Non-blocking variant of [`acquire`](Self::acquire).
    pub fn try_acquire(&self, trip_id: TripId) -> Option<TripLockGuard<'_>> {
        let lease = self.lease(trip_id);
        let guard = lease.mutex.clone().try_lock_owned().ok()?;

        Some(TripLockGuard {
            guard: Some(guard),
            lease,
        })
    }

    /// Number of trips with a live slot.
    pub fn tracked(&self) -> usize {
        self.slots.len()
    }

    fn lease(&self, trip_id: TripId) -> Lease<'_> {
        // The shard guard must not live across an await.
        let mut slot = self.slots.entry(trip_id).or_insert_with(|| Slot {
            mutex: Arc::default(),
            users: 0,
        });
        slot.users += 1;
        let mutex = slot.mutex.clone();
        drop(slot);

        Lease {
            locks: self,
            trip_id,
            mutex,
        }
    }
}

/// One registered user of a slot. The slot is removed when the last lease drops.
struct Lease<'a> {
    locks: &'a TripLocks,
    trip_id: TripId,
    mutex: Arc<Mutex<()>>,
}

impl Drop for Lease<'_> {
    fn drop(&mut self) {
        if let Entry::Occupied(mut slot) = self.locks.slots.entry(self.trip_id) {
            slot.get_mut().users -= 1;
            if slot.get().users == 0 {
                slot.remove();
            }
        }
    }
}

/// Exclusive access to one trip. Released on drop.
pub struct TripLockGuard<'a> {
    guard: Option<OwnedMutexGuard<()>>,
    lease: Lease<'a>,
}

impl TripLockGuard<'_> {
    pub fn trip_id(&self) -> TripId {
        self.lease.trip_id
    }
}

impl Drop for TripLockGuard<'_> {
    fn drop(&mut self) {
        // Unlock before the lease can retire the slot.
        drop(self.guard.take());
    }
}
