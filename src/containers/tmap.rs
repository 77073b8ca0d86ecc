use ahash::RandomState;
use std::hash::{BuildHasher, Hash};

use crate::containers::hamt::Hamt;
use crate::errors::Result;
use crate::transaction::Transaction;

/// A transactional hash map.
///
/// Backed by a hash array mapped trie whose nodes are `TVar`s: an update
/// writes only the node that holds its key, so transactions touching keys
/// in different parts of the trie do not conflict with each other.
///
/// Keys are hashed with `S`, an [`ahash::RandomState`] unless the map was
/// built with [`TMap::with_hasher`].
///
/// # Examples
///
/// ```no_run
/// use seshat::prelude::*;
///
/// let map = TMap::new();
/// atomically(|tx| map.insert(tx, "answer", 42)).unwrap();
/// assert_eq!(atomically(|tx| map.lookup(tx, &"answer")).unwrap(), Some(42));
/// ```
pub struct TMap<K, V, S = RandomState> {
    hamt: Hamt<(K, V)>,
    hasher: S,
}

impl<K, V, S: Clone> Clone for TMap<K, V, S> {
    fn clone(&self) -> Self {
        Self {
            hamt: self.hamt.clone(),
            hasher: self.hasher.clone(),
        }
    }
}

impl<K, V> Default for TMap<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> TMap<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Creates an empty map with a randomly seeded hasher.
    pub fn new() -> Self {
        Self::with_hasher(RandomState::new())
    }

    /// Creates an empty map as part of a transaction.
    pub fn new_in(tx: &mut Transaction) -> Self {
        Self::with_hasher_in(tx, RandomState::new())
    }
}

impl<K, V, S> TMap<K, V, S>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    S: BuildHasher,
{
    /// Creates an empty map that hashes keys with `hasher`.
    ///
    /// The position of a key in the trie follows its hash, so a
    /// deterministic hasher makes the layout (and which updates can
    /// conflict) reproducible.
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            hamt: Hamt::new(),
            hasher,
        }
    }

    /// Creates an empty map that hashes keys with `hasher`, as part of a transaction.
    pub fn with_hasher_in(tx: &mut Transaction, hasher: S) -> Self {
        Self {
            hamt: Hamt::new_in(tx),
            hasher,
        }
    }

    fn hash_of(&self, key: &K) -> u64 {
        self.hasher.hash_one(key)
    }

    /// Returns the value for `key`, or `None` if the map has no such key.
    ///
    /// Reads only the nodes on the path to `key`.
    pub fn lookup(&self, tx: &mut Transaction, key: &K) -> Result<Option<V>> {
        let found = self
            .hamt
            .lookup(tx, self.hash_of(key), |(k, _)| k == key)?;
        Ok(found.map(|(_, value)| value))
    }

    /// Whether the map holds a value for `key`.
    pub fn member(&self, tx: &mut Transaction, key: &K) -> Result<bool> {
        Ok(self.lookup(tx, key)?.is_some())
    }

    /// Inserts or replaces the value for `key`.
    pub fn insert(&self, tx: &mut Transaction, key: K, value: V) -> Result<()> {
        let hash = self.hash_of(&key);
        let probe = key.clone();
        self.hamt
            .alter(tx, hash, |(k, _)| *k == probe, move |_| Some((key, value)))
    }

    /// Applies `f` to the value for `key`, if there is one.
    pub fn update<F>(&self, tx: &mut Transaction, key: &K, f: F) -> Result<()>
    where
        F: FnOnce(V) -> V,
    {
        self.hamt.alter(
            tx,
            self.hash_of(key),
            |(k, _)| k == key,
            |current| current.map(|(k, v)| (k.clone(), f(v.clone()))),
        )
    }

    /// Removes `key` and its value. Removing an absent key writes nothing.
    pub fn remove(&self, tx: &mut Transaction, key: &K) -> Result<()> {
        self.hamt
            .alter(tx, self.hash_of(key), |(k, _)| k == key, |_| None)
    }

    /// All key/value pairs, in no particular order.
    ///
    /// Reads every node of the trie, so it conflicts with any concurrent update.
    pub fn entries(&self, tx: &mut Transaction) -> Result<Vec<(K, V)>> {
        self.hamt.entries(tx)
    }
}
