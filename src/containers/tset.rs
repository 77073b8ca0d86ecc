use ahash::RandomState;
use std::hash::Hash;

use crate::containers::hamt::Hamt;
use crate::errors::Result;
use crate::transaction::Transaction;

/// A transactional hash set, sharing the trie layout of [`TMap`](crate::TMap).
///
/// # Examples
///
/// ```no_run
/// use seshat::prelude::*;
///
/// let set = TSet::new();
/// atomically(|tx| set.insert(tx, 'x')).unwrap();
/// assert!(atomically(|tx| set.member(tx, &'x')).unwrap());
/// ```
pub struct TSet<A> {
    hamt: Hamt<A>,
    hasher: RandomState,
}

impl<A> Clone for TSet<A> {
    fn clone(&self) -> Self {
        Self {
            hamt: self.hamt.clone(),
            hasher: self.hasher.clone(),
        }
    }
}

impl<A: Eq + Hash + Clone + Send + Sync + 'static> Default for TSet<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: Eq + Hash + Clone + Send + Sync + 'static> TSet<A> {
    /// Creates an empty set with a randomly seeded hasher.
    pub fn new() -> Self {
        Self {
            hamt: Hamt::new(),
            hasher: RandomState::new(),
        }
    }

    /// Creates an empty set as part of a transaction.
    pub fn new_in(tx: &mut Transaction) -> Self {
        Self {
            hamt: Hamt::new_in(tx),
            hasher: RandomState::new(),
        }
    }

    /// Whether `value` is in the set.
    pub fn member(&self, tx: &mut Transaction, value: &A) -> Result<bool> {
        let found = self
            .hamt
            .lookup(tx, self.hasher.hash_one(value), |a| a == value)?;
        Ok(found.is_some())
    }

    /// Adds `value`; inserting an element already present keeps a single copy.
    pub fn insert(&self, tx: &mut Transaction, value: A) -> Result<()> {
        let hash = self.hasher.hash_one(&value);
        let probe = value.clone();
        self.hamt
            .alter(tx, hash, |a| *a == probe, move |_| Some(value))
    }

    /// Removes `value` if it is present.
    pub fn remove(&self, tx: &mut Transaction, value: &A) -> Result<()> {
        self.hamt
            .alter(tx, self.hasher.hash_one(value), |a| a == value, |_| None)
    }

    /// All elements, in no particular order.
    pub fn elements(&self, tx: &mut Transaction) -> Result<Vec<A>> {
        self.hamt.entries(tx)
    }
}
