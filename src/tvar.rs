use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::Arc;

use crate::data_store::var_cell::{DEFAULT_LOCK_SPIN_LIMIT, VarCell};

/// A transactional variable.
///
/// A `TVar` is a cheap, clonable handle to a shared cell. Inside a
/// transaction it is read and written through
/// [`Transaction::read`](crate::Transaction::read) and
/// [`Transaction::write`](crate::Transaction::write); those accesses are
/// logged and only become visible to other threads when the transaction
/// commits.
///
/// # Examples
///
/// ```no_run
/// use seshat::prelude::*;
///
/// let balance = TVar::new(100);
/// atomically(|tx| tx.modify(&balance, |b| b - 30)).unwrap();
/// assert_eq!(balance.read_committed(), 70);
/// ```
pub struct TVar<T> {
    cell: Arc<VarCell>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Clone + Send + Sync + 'static> TVar<T> {
    /// Creates a new variable holding `value`.
    ///
    /// No synchronization is involved: nothing else can see the variable
    /// before this handle is shared.
    pub fn new(value: T) -> Self {
        Self {
            cell: Arc::new(VarCell::new(Arc::new(value))),
            _marker: PhantomData,
        }
    }

    /// Reads the committed value outside of any transaction.
    ///
    /// Waits out a commit that is installing a new value, if there is one.
    /// Two calls give no consistency guarantee with each other or with other
    /// variables; use a transaction for that.
    pub fn read_committed(&self) -> T {
        match self.cell.load(DEFAULT_LOCK_SPIN_LIMIT).downcast::<T>() {
            Some(value) => value,
            None => unreachable!("TVar {} holds a value of a foreign type", self.cell.id()),
        }
    }
}

impl<T> TVar<T> {
    /// Process-unique identity of the variable.
    pub fn id(&self) -> u64 {
        self.cell.id()
    }

    pub(crate) fn cell(&self) -> &Arc<VarCell> {
        &self.cell
    }
}

impl<T> Clone for TVar<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
            _marker: PhantomData,
        }
    }
}

impl<T> PartialEq for TVar<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl<T> Eq for TVar<T> {}

impl<T> Hash for TVar<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl<T> fmt::Debug for TVar<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TVar").field("id", &self.id()).finish()
    }
}
