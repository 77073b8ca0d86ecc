use crate::errors::Result;
use crate::transaction::Transaction;
use crate::tvar::TVar;

/// A transactional slot that is either empty or holds one value.
///
/// `take` and `put` block (retry) on an empty and a full slot respectively,
/// which makes a `TMVar` usable as a one-element channel or as a lock.
///
/// # Examples
///
/// ```no_run
/// use seshat::prelude::*;
///
/// let slot = TMVar::empty();
/// atomically(|tx| slot.put(tx, "ready")).unwrap();
/// assert_eq!(atomically(|tx| slot.take(tx)).unwrap(), "ready");
/// assert!(atomically(|tx| slot.is_empty(tx)).unwrap());
/// ```
pub struct TMVar<A> {
    slot: TVar<Option<A>>,
}

impl<A> Clone for TMVar<A> {
    fn clone(&self) -> Self {
        Self {
            slot: self.slot.clone(),
        }
    }
}

impl<A: Clone + Send + Sync + 'static> TMVar<A> {
    /// Creates a full slot holding `value`.
    pub fn new(value: A) -> Self {
        Self {
            slot: TVar::new(Some(value)),
        }
    }

    /// Creates an empty slot.
    pub fn empty() -> Self {
        Self {
            slot: TVar::new(None),
        }
    }

    /// Creates a full slot as part of a transaction.
    pub fn new_in(tx: &mut Transaction, value: A) -> Self {
        Self {
            slot: tx.new_tvar(Some(value)),
        }
    }

    /// Creates an empty slot as part of a transaction.
    pub fn empty_in(tx: &mut Transaction) -> Self {
        Self {
            slot: tx.new_tvar(None),
        }
    }

    /// Removes and returns the value, retrying while the slot is empty.
    pub fn take(&self, tx: &mut Transaction) -> Result<A> {
        match tx.read(&self.slot)? {
            Some(value) => {
                tx.write(&self.slot, None)?;
                Ok(value)
            }
            None => tx.retry(),
        }
    }

    /// Fills the slot, retrying while it is full.
    pub fn put(&self, tx: &mut Transaction, value: A) -> Result<()> {
        match tx.read(&self.slot)? {
            Some(_) => tx.retry(),
            None => tx.write(&self.slot, Some(value)),
        }
    }

    /// Returns the value without removing it, retrying while the slot is empty.
    pub fn read(&self, tx: &mut Transaction) -> Result<A> {
        match tx.read(&self.slot)? {
            Some(value) => Ok(value),
            None => tx.retry(),
        }
    }

    /// Replaces the value and returns the old one, retrying while the slot is empty.
    pub fn swap(&self, tx: &mut Transaction, value: A) -> Result<A> {
        match tx.read(&self.slot)? {
            Some(old) => {
                tx.write(&self.slot, Some(value))?;
                Ok(old)
            }
            None => tx.retry(),
        }
    }

    /// Like [`TMVar::take`], but returns `None` instead of retrying.
    pub fn try_take(&self, tx: &mut Transaction) -> Result<Option<A>> {
        let value = tx.read(&self.slot)?;
        if value.is_some() {
            tx.write(&self.slot, None)?;
        }
        Ok(value)
    }

    /// Fills the slot if it is empty. Returns whether the value was stored.
    pub fn try_put(&self, tx: &mut Transaction, value: A) -> Result<bool> {
        match tx.read(&self.slot)? {
            Some(_) => Ok(false),
            None => tx.write(&self.slot, Some(value)).map(|_| true),
        }
    }

    /// Like [`TMVar::read`], but returns `None` instead of retrying.
    pub fn try_read(&self, tx: &mut Transaction) -> Result<Option<A>> {
        tx.read(&self.slot)
    }

    /// Whether the slot is empty.
    pub fn is_empty(&self, tx: &mut Transaction) -> Result<bool> {
        Ok(tx.read(&self.slot)?.is_none())
    }

    /// Whether the slot holds a value.
    pub fn is_not_empty(&self, tx: &mut Transaction) -> Result<bool> {
        Ok(tx.read(&self.slot)?.is_some())
    }
}
