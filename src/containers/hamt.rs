//! Hash array mapped trie whose nodes live in `TVar`s.
//!
//! Each node is one variable holding 32 slots, indexed by 5 bits of a 64-bit
//! hash per level. A slot is empty, points to a child node, or is a leaf
//! holding every entry that shares one full hash. An update reads the nodes
//! on its path and writes only the last one (plus new nodes when a leaf
//! splits), so updates under different slots never write the same variable.

use std::sync::Arc;

use crate::errors::Result;
use crate::transaction::Transaction;
use crate::tvar::TVar;

const BITS_PER_LEVEL: u32 = 5;
const BRANCH_FACTOR: usize = 1 << BITS_PER_LEVEL;
const LEVEL_MASK: u64 = (BRANCH_FACTOR as u64) - 1;

type Slots<E> = Arc<Vec<Option<Branch<E>>>>;

enum Branch<E> {
    Node(Hamt<E>),
    Leaf { hash: u64, entries: Arc<Vec<E>> },
}

impl<E> Clone for Branch<E> {
    fn clone(&self) -> Self {
        match self {
            Branch::Node(node) => Branch::Node(node.clone()),
            Branch::Leaf { hash, entries } => Branch::Leaf {
                hash: *hash,
                entries: Arc::clone(entries),
            },
        }
    }
}

pub(crate) struct Hamt<E> {
    slots: TVar<Slots<E>>,
}

impl<E> Clone for Hamt<E> {
    fn clone(&self) -> Self {
        Self {
            slots: self.slots.clone(),
        }
    }
}

fn empty_slots<E>() -> Slots<E> {
    Arc::new(vec![None; BRANCH_FACTOR])
}

/// Slot index of `hash` at `depth`. Every level consumes the next 5 bits;
/// the last level (depth 12) only has the 4 topmost bits left.
fn index_at(hash: u64, depth: u32) -> usize {
    let shift = depth * BITS_PER_LEVEL;
    if shift >= u64::BITS {
        0
    } else {
        ((hash >> shift) & LEVEL_MASK) as usize
    }
}

fn with_slot<E>(slots: &Slots<E>, index: usize, branch: Option<Branch<E>>) -> Slots<E> {
    let mut updated: Vec<Option<Branch<E>>> = slots.as_ref().clone();
    updated[index] = branch;
    Arc::new(updated)
}

impl<E: Clone + Send + Sync + 'static> Hamt<E> {
    pub(crate) fn new() -> Self {
        Self {
            slots: TVar::new(empty_slots()),
        }
    }

    pub(crate) fn new_in(tx: &mut Transaction) -> Self {
        Self {
            slots: tx.new_tvar(empty_slots()),
        }
    }

    /// Finds the entry with `hash` for which `matches` returns `true`.
    pub(crate) fn lookup<P>(&self, tx: &mut Transaction, hash: u64, mut matches: P) -> Result<Option<E>>
    where
        P: FnMut(&E) -> bool,
    {
        let mut node = self.clone();
        let mut depth = 0;
        loop {
            let slots = tx.read(&node.slots)?;
            match &slots[index_at(hash, depth)] {
                None => return Ok(None),
                Some(Branch::Node(child)) => {
                    node = child.clone();
                    depth += 1;
                }
                Some(Branch::Leaf { hash: leaf_hash, entries }) => {
                    if *leaf_hash != hash {
                        return Ok(None);
                    }
                    return Ok(entries.iter().find(|entry| matches(entry)).cloned());
                }
            }
        }
    }

    /// Replaces the entry with `hash` matching `matches` by `f(current)`.
    ///
    /// `f` receives the current entry, if any; returning `None` removes it.
    pub(crate) fn alter<P, F>(&self, tx: &mut Transaction, hash: u64, matches: P, f: F) -> Result<()>
    where
        P: FnMut(&E) -> bool,
        F: FnOnce(Option<&E>) -> Option<E>,
    {
        self.alter_at(tx, hash, 0, matches, f)
    }

    fn alter_at<P, F>(&self, tx: &mut Transaction, hash: u64, depth: u32, mut matches: P, f: F) -> Result<()>
    where
        P: FnMut(&E) -> bool,
        F: FnOnce(Option<&E>) -> Option<E>,
    {
        let slots = tx.read(&self.slots)?;
        let index = index_at(hash, depth);
        match &slots[index] {
            None => match f(None) {
                None => Ok(()),
                Some(entry) => {
                    let leaf = Branch::Leaf {
                        hash,
                        entries: Arc::new(vec![entry]),
                    };
                    tx.write(&self.slots, with_slot(&slots, index, Some(leaf)))
                }
            },
            Some(Branch::Node(child)) => child.alter_at(tx, hash, depth + 1, matches, f),
            Some(Branch::Leaf { hash: leaf_hash, entries }) if *leaf_hash == hash => {
                let position = entries.iter().position(|entry| matches(entry));
                let current = position.map(|p| &entries[p]);
                let mut updated: Vec<E> = entries.as_ref().clone();
                match (position, f(current)) {
                    (None, None) => return Ok(()),
                    (None, Some(entry)) => updated.push(entry),
                    (Some(p), Some(entry)) => updated[p] = entry,
                    (Some(p), None) => {
                        updated.remove(p);
                    }
                }
                let branch = if updated.is_empty() {
                    None
                } else {
                    Some(Branch::Leaf {
                        hash,
                        entries: Arc::new(updated),
                    })
                };
                tx.write(&self.slots, with_slot(&slots, index, branch))
            }
            Some(existing @ Branch::Leaf { hash: leaf_hash, .. }) => match f(None) {
                None => Ok(()),
                Some(entry) => {
                    // Two different hashes share this slot: push the old leaf one
                    // level down and insert the new entry next to it.
                    let child = Hamt::new_in(tx);
                    let child_slots = with_slot(
                        &empty_slots(),
                        index_at(*leaf_hash, depth + 1),
                        Some(existing.clone()),
                    );
                    tx.write(&child.slots, child_slots)?;
                    tx.write(&self.slots, with_slot(&slots, index, Some(Branch::Node(child.clone()))))?;
                    child.insert_new(tx, hash, depth + 1, entry)
                }
            },
        }
    }

    /// Inserts an entry whose hash is known to be absent from this subtree.
    fn insert_new(&self, tx: &mut Transaction, hash: u64, depth: u32, entry: E) -> Result<()> {
        let slots = tx.read(&self.slots)?;
        let index = index_at(hash, depth);
        match &slots[index] {
            None => {
                let leaf = Branch::Leaf {
                    hash,
                    entries: Arc::new(vec![entry]),
                };
                tx.write(&self.slots, with_slot(&slots, index, Some(leaf)))
            }
            Some(Branch::Node(child)) => child.insert_new(tx, hash, depth + 1, entry),
            Some(existing @ Branch::Leaf { hash: leaf_hash, .. }) => {
                let child = Hamt::new_in(tx);
                let child_slots = with_slot(
                    &empty_slots(),
                    index_at(*leaf_hash, depth + 1),
                    Some(existing.clone()),
                );
                tx.write(&child.slots, child_slots)?;
                tx.write(&self.slots, with_slot(&slots, index, Some(Branch::Node(child.clone()))))?;
                child.insert_new(tx, hash, depth + 1, entry)
            }
        }
    }

    /// Collects every entry of the trie, in no particular order.
    pub(crate) fn entries(&self, tx: &mut Transaction) -> Result<Vec<E>> {
        let mut collected = Vec::new();
        let mut pending = vec![self.clone()];
        while let Some(node) = pending.pop() {
            let slots = tx.read(&node.slots)?;
            for branch in slots.iter().flatten() {
                match branch {
                    Branch::Node(child) => pending.push(child.clone()),
                    Branch::Leaf { entries, .. } => collected.extend(entries.iter().cloned()),
                }
            }
        }
        Ok(collected)
    }
}
