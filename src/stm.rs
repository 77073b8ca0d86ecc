use futures::future::poll_fn;
use log::debug;
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use crate::config::StmConfig;
use crate::errors::{Result, StmError};
use crate::transaction::Transaction;
use crate::waiter::Waiter;

/// Seshat Prelude
pub mod prelude {
    pub use crate::config::*;
    pub use crate::conflict::resolution::*;
    pub use crate::containers::*;
    pub use crate::errors::*;
    pub use crate::stm::{Stm, StmStats, atomically, atomically_async};
    pub use crate::transaction::*;
    pub use crate::tvar::*;
}

/// Process-wide source of transaction ids. Ids key waiter sets and lock
/// owners on variables, which may be shared between `Stm` instances.
static TRANSACTION_COUNTER: AtomicU64 = AtomicU64::new(0);

static DEFAULT_STM: OnceLock<Stm> = OnceLock::new();

thread_local!(static TRANSACTION_RUNNING: Cell<bool> = const { Cell::new(false) });

/// Marks the current thread as running a transaction body.
struct TransactionGuard;

impl TransactionGuard {
    fn enter() -> Result<Self> {
        TRANSACTION_RUNNING.with(|running| {
            if running.replace(true) {
                Err(StmError::NestedTransaction)
            } else {
                Ok(TransactionGuard)
            }
        })
    }
}

impl Drop for TransactionGuard {
    fn drop(&mut self) {
        TRANSACTION_RUNNING.with(|running| running.set(false));
    }
}

/// A blocked attempt registered as a waiter on its variables.
/// Dropping it unregisters the waiter, also when an async caller is cancelled.
struct Watch {
    txn: Transaction,
    waiter: Arc<Waiter>,
}

impl Watch {
    /// Registers the attempt; `None` if the attempt is already stale and
    /// must run again right away.
    fn register(txn: Transaction) -> Option<Self> {
        let watch = Watch {
            waiter: Waiter::new(txn.id()),
            txn,
        };
        if watch.txn.watch(&watch.waiter) {
            Some(watch)
        } else {
            None
        }
    }
}

impl Drop for Watch {
    fn drop(&mut self) {
        self.txn.unwatch(self.waiter.id());
    }
}

/// Outcome of one attempt that the runner loops on.
enum Step<T> {
    Done(T),
    Restart,
    Block(Transaction),
}

/// Counters describing what an [`Stm`] instance has done so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StmStats {
    /// Attempts that committed.
    pub commits: u64,
    /// Attempts that lost a commit race and ran again.
    pub conflicts: u64,
    /// Times an attempt went to sleep in `retry`.
    pub blocked_waits: u64,
}

/// The transaction runner.
///
/// `Stm` drives transaction bodies to completion: it runs a body against a
/// fresh [`Transaction`], commits the log, and runs the body again after a
/// conflict or after a `retry` once a variable it read has changed.
/// Variables are not owned by an `Stm`; any instance can run transactions
/// over any `TVar`. The free [`atomically`] function uses a process-wide
/// instance with the default configuration.
pub struct Stm {
    config: StmConfig,
    commits: AtomicU64,
    conflicts: AtomicU64,
    blocked_waits: AtomicU64,
}

impl Default for Stm {
    fn default() -> Self {
        Self::new(StmConfig::default())
    }
}

impl Stm {
    /// Creates a new runner with the given configuration.
    pub fn new(config: StmConfig) -> Self {
        Self {
            config,
            commits: AtomicU64::new(0),
            conflicts: AtomicU64::new(0),
            blocked_waits: AtomicU64::new(0),
        }
    }

    /// Returns the configuration the runner was created with.
    pub fn config(&self) -> &StmConfig {
        &self.config
    }

    /// Returns a snapshot of the runner's counters.
    ///
    /// The counters are read one by one without synchronizing with running
    /// transactions, so a snapshot taken under load is only approximate.
    pub fn stats(&self) -> StmStats {
        StmStats {
            commits: self.commits.load(Ordering::Relaxed),
            conflicts: self.conflicts.load(Ordering::Relaxed),
            blocked_waits: self.blocked_waits.load(Ordering::Relaxed),
        }
    }

    /// Runs `body` as one atomic transaction and returns its result.
    ///
    /// The body may run several times: after losing a commit race, and
    /// after calling [`Transaction::retry`], in which case the calling thread
    /// sleeps until one of the variables the body read is changed by another
    /// commit. Keep side effects out of the body.
    ///
    /// # Errors
    ///
    /// - [`StmError::Aborted`] if the body aborted; nothing is committed.
    /// - [`StmError::BlockedIndefinitely`] if the body retried without
    ///   reading any variable.
    /// - [`StmError::NestedTransaction`] if called from inside a body.
    /// - Any other error the body returned.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use seshat::prelude::*;
    ///
    /// let stm = Stm::default();
    /// let from = TVar::new(100);
    /// let to = TVar::new(0);
    ///
    /// stm.atomically(|tx| {
    ///     let balance = tx.read(&from)?;
    ///     tx.check(balance >= 40)?;
    ///     tx.write(&from, balance - 40)?;
    ///     tx.modify(&to, |b| b + 40)
    /// })
    /// .unwrap();
    /// ```
    pub fn atomically<T, F>(&self, mut body: F) -> Result<T>
    where
        F: FnMut(&mut Transaction) -> Result<T>,
    {
        let _guard = TransactionGuard::enter()?;
        loop {
            match self.attempt(&mut body)? {
                Step::Done(value) => return Ok(value),
                Step::Restart => self.config.conflict_backoff.pause(),
                Step::Block(txn) => {
                    if let Some(watch) = Watch::register(txn) {
                        self.blocked_waits.fetch_add(1, Ordering::Relaxed);
                        debug!("Tx {} blocked in retry", watch.txn.id());
                        watch.waiter.wait();
                    }
                }
            }
        }
    }

    /// Async counterpart of [`Stm::atomically`].
    ///
    /// A body that retries suspends the task instead of parking the thread;
    /// the task is woken by the commit that changes one of its variables.
    /// Dropping the future while it waits unregisters it.
    pub async fn atomically_async<T, F>(&self, mut body: F) -> Result<T>
    where
        F: FnMut(&mut Transaction) -> Result<T>,
    {
        loop {
            let step = {
                let _guard = TransactionGuard::enter()?;
                self.attempt(&mut body)?
            };
            match step {
                Step::Done(value) => return Ok(value),
                Step::Restart => self.config.conflict_backoff.pause(),
                Step::Block(txn) => {
                    if let Some(watch) = Watch::register(txn) {
                        self.blocked_waits.fetch_add(1, Ordering::Relaxed);
                        debug!("Tx {} suspended in retry", watch.txn.id());
                        poll_fn(|cx| watch.waiter.poll_notified(cx)).await;
                    }
                }
            }
        }
    }

    fn start_transaction(&self) -> Transaction {
        let id = TRANSACTION_COUNTER.fetch_add(1, Ordering::Relaxed);
        Transaction::new(id, self.config.lock_spin_limit)
    }

    /// Runs the body once and commits its log.
    fn attempt<T, F>(&self, body: &mut F) -> Result<Step<T>>
    where
        F: FnMut(&mut Transaction) -> Result<T>,
    {
        let mut txn = self.start_transaction();
        match body(&mut txn) {
            Ok(value) => match txn.commit() {
                Ok(()) => {
                    self.commits.fetch_add(1, Ordering::Relaxed);
                    Ok(Step::Done(value))
                }
                Err(StmError::Conflict) => {
                    self.conflicts.fetch_add(1, Ordering::Relaxed);
                    Ok(Step::Restart)
                }
                Err(err) => Err(err),
            },
            Err(StmError::Retry) if txn.is_empty() => {
                txn.rollback();
                Err(StmError::BlockedIndefinitely)
            }
            Err(StmError::Retry) => Ok(Step::Block(txn)),
            Err(StmError::Conflict) => {
                txn.rollback();
                self.conflicts.fetch_add(1, Ordering::Relaxed);
                Ok(Step::Restart)
            }
            Err(err) => {
                debug!("Tx {} aborted: {}", txn.id(), err);
                txn.rollback();
                Err(err)
            }
        }
    }
}

/// The runner behind the free [`atomically`] functions.
pub fn default_stm() -> &'static Stm {
    DEFAULT_STM.get_or_init(Stm::default)
}

/// Runs `body` atomically on the process-wide default runner.
///
/// See [`Stm::atomically`].
pub fn atomically<T, F>(body: F) -> Result<T>
where
    F: FnMut(&mut Transaction) -> Result<T>,
{
    default_stm().atomically(body)
}

/// Runs `body` atomically on the process-wide default runner without blocking the thread.
///
/// See [`Stm::atomically_async`].
pub async fn atomically_async<T, F>(body: F) -> Result<T>
where
    F: FnMut(&mut Transaction) -> Result<T>,
{
    default_stm().atomically_async(body).await
}
