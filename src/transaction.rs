use ahash::AHashMap as HashMap;
use log::debug;
use std::collections::hash_map::Entry;
use std::error::Error as StdError;
use std::mem;
use std::sync::Arc;

use crate::conflict::detection::{lock_write_set, release_all, validate_log, validate_read_set};
use crate::data_store::var_cell::VarCell;
use crate::data_store::versioned_value::{Value, VersionedValue};
use crate::errors::{Result, StmError};
use crate::tvar::TVar;
use crate::waiter::Waiter;

/// One variable's record in a transaction log.
#[derive(Clone)]
pub(crate) struct LogEntry {
    pub(crate) cell: Arc<VarCell>,
    /// Committed value and version seen on first access.
    pub(crate) observed: VersionedValue,
    /// Value the transaction currently sees: the observed one, or its own latest write.
    pub(crate) current: Value,
    pub(crate) written: bool,
}

impl LogEntry {
    fn observed(cell: Arc<VarCell>, observed: VersionedValue) -> Self {
        let current = Arc::clone(observed.data());
        Self {
            cell,
            observed,
            current,
            written: false,
        }
    }

    /// Drops any pending write, keeping only what was observed.
    fn into_read_only(self) -> Self {
        let current = Arc::clone(self.observed.data());
        Self {
            current,
            written: false,
            ..self
        }
    }
}

/// Represents a single attempt of a transaction body.
///
/// A transaction is the private log of every variable the body touched:
/// the committed version seen on first access and any value written
/// since. Nothing in the log is visible to other threads until the runner
/// commits it. The runner creates a fresh `Transaction` for every attempt
/// and hands it to the body as `&mut Transaction`; functions that want to
/// compose into larger transactions take the same parameter and return
/// [`Result`].
pub struct Transaction {
    /// Process-unique identifier of the attempt.
    id: u64,
    /// Reads and writes keyed by variable id.
    log: HashMap<u64, LogEntry>,
    /// Spins on a locked variable before yielding the thread.
    lock_spin_limit: u32,
}

impl Transaction {
    pub(crate) fn new(id: u64, lock_spin_limit: u32) -> Self {
        Self {
            id,
            log: HashMap::new(),
            lock_spin_limit,
        }
    }

    /// Returns the unique identifier of the transaction attempt.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Reads a variable.
    ///
    /// The first read of a variable takes its committed value (waiting out a
    /// commit that is installing a new one) and records it in the log. Every
    /// later read in the same attempt returns the logged value, or the value
    /// this transaction last wrote.
    pub fn read<T: Clone + Send + Sync + 'static>(&mut self, var: &TVar<T>) -> Result<T> {
        let entry = self.entry(var.cell());
        entry.current.downcast_ref::<T>().cloned().ok_or_else(|| {
            StmError::InvalidArgument(format!("TVar {} holds a value of a foreign type", var.id()))
        })
    }

    /// Stages `value` for `var`.
    ///
    /// The shared variable is untouched until commit. Writing a variable that
    /// was never read still records the committed version it replaces, so a
    /// concurrent change to it makes this transaction run again.
    pub fn write<T: Clone + Send + Sync + 'static>(&mut self, var: &TVar<T>, value: T) -> Result<()> {
        let entry = self.entry(var.cell());
        entry.current = Arc::new(value);
        entry.written = true;
        Ok(())
    }

    /// Replaces the value of `var` with `f` applied to it.
    pub fn modify<T, F>(&mut self, var: &TVar<T>, f: F) -> Result<()>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce(T) -> T,
    {
        let value = self.read(var)?;
        self.write(var, f(value))
    }

    /// Writes `value` to `var` and returns the previous value.
    pub fn swap<T: Clone + Send + Sync + 'static>(&mut self, var: &TVar<T>, value: T) -> Result<T> {
        let old = self.read(var)?;
        self.write(var, value)?;
        Ok(old)
    }

    /// Creates a variable as part of this transaction.
    ///
    /// The variable is logged as written, so it behaves exactly like a
    /// variable that was created and then written by this attempt. If the
    /// attempt does not commit, the variable is simply dropped.
    pub fn new_tvar<T: Clone + Send + Sync + 'static>(&mut self, value: T) -> TVar<T> {
        let var = TVar::new(value);
        self.entry(var.cell()).written = true;
        var
    }

    /// Aborts the attempt and blocks until a variable it read changes.
    ///
    /// Returns the [`StmError::Retry`] signal; propagate it with `?`.
    pub fn retry<T>(&self) -> Result<T> {
        Err(StmError::Retry)
    }

    /// Retries unless `condition` holds.
    pub fn check(&self, condition: bool) -> Result<()> {
        if condition { Ok(()) } else { self.retry() }
    }

    /// Aborts the whole transaction with an application error.
    ///
    /// Nothing the transaction wrote is committed. The error surfaces from
    /// `atomically` as [`StmError::Aborted`] unless a surrounding
    /// [`Transaction::catch`] handles it.
    pub fn abort<T, E>(&self, err: E) -> Result<T>
    where
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        Err(StmError::aborted(err))
    }

    /// Runs `left`, and `right` instead if `left` retries.
    ///
    /// Writes made by a retrying `left` are rolled back before `right` runs.
    /// Its reads stay in the log as read-only entries: they are validated at
    /// commit, and if `right` retries as well the transaction also wakes up
    /// when one of them changes. A retry from `right` propagates to the
    /// caller.
    pub fn or_else<T, L, R>(&mut self, left: L, right: R) -> Result<T>
    where
        L: FnOnce(&mut Transaction) -> Result<T>,
        R: FnOnce(&mut Transaction) -> Result<T>,
    {
        let snapshot = self.log.clone();
        match left(self) {
            Err(StmError::Retry) => {
                self.rollback_to(snapshot);
                right(self)
            }
            other => other,
        }
    }

    /// Runs `body`, handing an abort error to `handler` after rolling `body` back.
    ///
    /// Only [`StmError::Aborted`] is caught; retries and every other error
    /// pass through unchanged.
    pub fn catch<T, F, H>(&mut self, body: F, handler: H) -> Result<T>
    where
        F: FnOnce(&mut Transaction) -> Result<T>,
        H: FnOnce(&mut Transaction, Box<dyn StdError + Send + Sync>) -> Result<T>,
    {
        let snapshot = self.log.clone();
        match body(self) {
            Err(StmError::Aborted(err)) => {
                self.rollback_to(snapshot);
                handler(self, err)
            }
            other => other,
        }
    }

    fn entry(&mut self, cell: &Arc<VarCell>) -> &mut LogEntry {
        let spin_limit = self.lock_spin_limit;
        match self.log.entry(cell.id()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let observed = cell.load(spin_limit);
                entry.insert(LogEntry::observed(Arc::clone(cell), observed))
            }
        }
    }

    /// Restores the log to `snapshot`, keeping what the abandoned branch read.
    fn rollback_to(&mut self, snapshot: HashMap<u64, LogEntry>) {
        let branch = mem::replace(&mut self.log, snapshot);
        for (var_id, entry) in branch {
            self.log
                .entry(var_id)
                .or_insert_with(|| entry.into_read_only());
        }
    }

    /// Whether the attempt touched no variable at all.
    pub(crate) fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    /// Registers `waiter` on every logged variable.
    ///
    /// Returns `true` if the log is still current afterwards, meaning it is
    /// safe to sleep: any later commit to one of the variables will find the
    /// waiter. Returns `false` if something already changed.
    pub(crate) fn watch(&self, waiter: &Arc<Waiter>) -> bool {
        for entry in self.log.values() {
            entry.cell.register_waiter(waiter);
        }
        match validate_log(&self.log) {
            Ok(()) => true,
            Err(conflict) => {
                debug!(
                    "Tx {} not blocking: var {} changed ({:?})",
                    self.id, conflict.var_id, conflict.kind
                );
                false
            }
        }
    }

    pub(crate) fn unwatch(&self, waiter_id: u64) {
        for entry in self.log.values() {
            entry.cell.unregister_waiter(waiter_id);
        }
    }

    /// Validates and installs the log.
    ///
    /// Written variables are locked first, then read-only variables are
    /// validated, then the new values are installed and the waiters of the
    /// written variables are woken. Any failure releases the locks taken and
    /// returns [`StmError::Conflict`] with no effect on shared state.
    pub(crate) fn commit(self) -> Result<()> {
        let Transaction { id, log, .. } = self;

        let locked = lock_write_set(id, &log).map_err(|conflict| {
            debug!(
                "Tx {} conflict on var {} while locking ({:?})",
                id, conflict.var_id, conflict.kind
            );
            StmError::Conflict
        })?;

        if let Err(conflict) = validate_read_set(&log) {
            release_all(id, &locked);
            debug!(
                "Tx {} conflict on var {} while validating ({:?})",
                id, conflict.var_id, conflict.kind
            );
            return Err(StmError::Conflict);
        }

        let writes = locked.len();
        for (_, entry) in log.into_iter().filter(|(_, entry)| entry.written) {
            entry.cell.install(id, entry.current);
        }
        for cell in &locked {
            cell.wake_waiters();
        }

        debug!("Tx {} committed {} writes", id, writes);
        Ok(())
    }

    pub(crate) fn rollback(self) {
        debug!("Tx {} rolled back ({} logged vars)", self.id, self.log.len());
    }
}
