use crate::errors::{Result, StmError};
use crate::transaction::Transaction;
use crate::tvar::TVar;

/// A counting semaphore.
///
/// Permits are a plain `usize` in one variable, so the count can never go
/// negative and there is no upper bound on releases.
///
/// # Examples
///
/// ```no_run
/// use seshat::prelude::*;
///
/// let sem = TSemaphore::new(5);
/// atomically(|tx| sem.acquire(tx, 3)).unwrap();
/// assert_eq!(atomically(|tx| sem.available(tx)).unwrap(), 2);
/// atomically(|tx| sem.release(tx, 1)).unwrap();
/// assert_eq!(atomically(|tx| sem.available(tx)).unwrap(), 3);
/// ```
#[derive(Clone)]
pub struct TSemaphore {
    permits: TVar<usize>,
}

impl TSemaphore {
    /// Creates a semaphore holding `permits` permits.
    pub fn new(permits: usize) -> Self {
        Self {
            permits: TVar::new(permits),
        }
    }

    /// Creates a semaphore as part of a transaction.
    pub fn new_in(tx: &mut Transaction, permits: usize) -> Self {
        Self {
            permits: tx.new_tvar(permits),
        }
    }

    /// Number of permits currently available.
    pub fn available(&self, tx: &mut Transaction) -> Result<usize> {
        tx.read(&self.permits)
    }

    /// Takes `n` permits, retrying until that many are available.
    pub fn acquire(&self, tx: &mut Transaction, n: usize) -> Result<()> {
        let available = tx.read(&self.permits)?;
        tx.check(available >= n)?;
        tx.write(&self.permits, available - n)
    }

    /// Takes a single permit, retrying until one is available.
    pub fn acquire_one(&self, tx: &mut Transaction) -> Result<()> {
        self.acquire(tx, 1)
    }

    /// Takes `n` permits if available, returning `false` instead of retrying.
    pub fn try_acquire(&self, tx: &mut Transaction, n: usize) -> Result<bool> {
        tx.or_else(|tx| self.acquire(tx, n).map(|_| true), |_| Ok(false))
    }

    /// Takes a single permit if one is available.
    pub fn try_acquire_one(&self, tx: &mut Transaction) -> Result<bool> {
        self.try_acquire(tx, 1)
    }

    /// Returns `n` permits.
    ///
    /// # Errors
    ///
    /// [`StmError::InvalidArgument`] if the count would overflow `usize`.
    pub fn release(&self, tx: &mut Transaction, n: usize) -> Result<()> {
        if n == 0 {
            return Ok(());
        }
        let available = tx.read(&self.permits)?;
        let released = available.checked_add(n).ok_or_else(|| {
            StmError::InvalidArgument(format!(
                "cannot release {n} permits: {available} are already available"
            ))
        })?;
        tx.write(&self.permits, released)
    }

    /// Returns a single permit.
    pub fn release_one(&self, tx: &mut Transaction) -> Result<()> {
        self.release(tx, 1)
    }
}
