use ahash::AHashMap as HashMap;
use log::trace;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::conflict::detection::ConflictType;
use crate::data_store::versioned_value::{Value, VersionedValue};
use crate::waiter::Waiter;

/// Source of process-unique variable ids.
static NEXT_VAR_ID: AtomicU64 = AtomicU64::new(0);

/// Spins on a locked cell before falling back to yielding the thread.
pub(crate) const DEFAULT_LOCK_SPIN_LIMIT: u32 = 64;

/// State of the shared slot.
///
/// While a commit holds the lock the previously committed value stays in
/// place, so releasing without installing restores the cell untouched.
struct Slot {
    committed: VersionedValue,
    /// Id of the committing transaction that owns the slot, if any.
    locked_by: Option<u64>,
}

/// The shared cell behind every `TVar`.
///
/// Each mutex here guards exactly one variable and is only held for a single
/// compare/lock/install step, never while acquiring another cell.
pub(crate) struct VarCell {
    id: u64,
    slot: Mutex<Slot>,
    /// Transactions blocked in `retry` until this cell changes, keyed by transaction id.
    waiters: Mutex<HashMap<u64, Arc<Waiter>>>,
}

impl VarCell {
    pub(crate) fn new(data: Value) -> Self {
        Self {
            id: NEXT_VAR_ID.fetch_add(1, Ordering::Relaxed),
            slot: Mutex::new(Slot {
                committed: VersionedValue::new(data, 0),
                locked_by: None,
            }),
            waiters: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    /// Returns the committed value, or `None` while a commit holds the lock.
    pub(crate) fn try_load(&self) -> Option<VersionedValue> {
        let slot = self.slot.lock();
        match slot.locked_by {
            Some(_) => None,
            None => Some(slot.committed.clone()),
        }
    }

    /// Returns the committed value, waiting out any in-flight commit.
    ///
    /// The wait only covers the short install window of another commit, so
    /// it spins for `spin_limit` rounds and then yields the thread between polls.
    pub(crate) fn load(&self, spin_limit: u32) -> VersionedValue {
        let mut spins = 0u32;
        loop {
            if let Some(value) = self.try_load() {
                return value;
            }
            if spins < spin_limit {
                spins += 1;
                std::hint::spin_loop();
            } else {
                std::thread::yield_now();
            }
        }
    }

    /// Locks the cell for `owner` if it is unlocked and still at `expected_version`.
    pub(crate) fn try_lock(&self, owner: u64, expected_version: u64) -> Result<(), ConflictType> {
        let mut slot = self.slot.lock();
        if slot.locked_by.is_some() {
            return Err(ConflictType::Locked);
        }
        if slot.committed.version() != expected_version {
            return Err(ConflictType::WriteWrite);
        }
        slot.locked_by = Some(owner);
        trace!("Tx {} locked var {}", owner, self.id);
        Ok(())
    }

    /// Checks that the cell is unlocked and still at `expected_version`.
    pub(crate) fn validate(&self, expected_version: u64) -> Result<(), ConflictType> {
        let slot = self.slot.lock();
        if slot.locked_by.is_some() {
            Err(ConflictType::Locked)
        } else if slot.committed.version() != expected_version {
            Err(ConflictType::ReadWrite)
        } else {
            Ok(())
        }
    }

    /// Installs `data` as the next committed value and unlocks the cell.
    ///
    /// Returns `false` without touching the slot if `owner` does not hold the lock.
    pub(crate) fn install(&self, owner: u64, data: Value) -> bool {
        let mut slot = self.slot.lock();
        if slot.locked_by != Some(owner) {
            return false;
        }
        slot.committed = slot.committed.next(data);
        slot.locked_by = None;
        trace!(
            "Tx {} installed var {} at version {}",
            owner,
            self.id,
            slot.committed.version()
        );
        true
    }

    /// Unlocks the cell without changing its value.
    pub(crate) fn release(&self, owner: u64) {
        let mut slot = self.slot.lock();
        if slot.locked_by == Some(owner) {
            slot.locked_by = None;
            trace!("Tx {} released var {}", owner, self.id);
        }
    }

    pub(crate) fn register_waiter(&self, waiter: &Arc<Waiter>) {
        self.waiters.lock().insert(waiter.id(), Arc::clone(waiter));
    }

    pub(crate) fn unregister_waiter(&self, waiter_id: u64) {
        self.waiters.lock().remove(&waiter_id);
    }

    /// Wakes and forgets every waiter currently registered on the cell.
    pub(crate) fn wake_waiters(&self) {
        let woken: Vec<Arc<Waiter>> = {
            let mut waiters = self.waiters.lock();
            if waiters.is_empty() {
                return;
            }
            waiters.drain().map(|(_, waiter)| waiter).collect()
        };
        for waiter in woken {
            trace!("Var {} waking Tx {}", self.id, waiter.id());
            waiter.notify();
        }
    }

    #[cfg(test)]
    pub(crate) fn waiter_count(&self) -> usize {
        self.waiters.lock().len()
    }
}
