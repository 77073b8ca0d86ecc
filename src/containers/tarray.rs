use std::sync::Arc;

use crate::errors::{Result, StmError};
use crate::transaction::Transaction;
use crate::tvar::TVar;

/// A fixed-size array with one variable per element.
///
/// Transactions that touch different indices do not conflict.
pub struct TArray<A> {
    vars: Arc<[TVar<A>]>,
}

impl<A> Clone for TArray<A> {
    fn clone(&self) -> Self {
        Self {
            vars: Arc::clone(&self.vars),
        }
    }
}

impl<A: Clone + Send + Sync + 'static> TArray<A> {
    /// Creates an array of `size` elements, all equal to `init`.
    pub fn new(size: usize, init: A) -> Self {
        Self::from_vec(vec![init; size])
    }

    /// Creates an array holding `values`, one variable per element.
    pub fn from_vec(values: Vec<A>) -> Self {
        Self {
            vars: values.into_iter().map(TVar::new).collect(),
        }
    }

    /// Creates an array from `values` as part of a transaction.
    pub fn from_vec_in(tx: &mut Transaction, values: Vec<A>) -> Self {
        Self {
            vars: values.into_iter().map(|value| tx.new_tvar(value)).collect(),
        }
    }

    /// Number of elements. Fixed at construction, so no transaction is needed.
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Whether the array has no elements.
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    fn var(&self, index: usize) -> Result<&TVar<A>> {
        self.vars.get(index).ok_or_else(|| {
            StmError::InvalidArgument(format!(
                "index {index} out of bounds for TArray of length {}",
                self.vars.len()
            ))
        })
    }

    /// Reads the element at `index`.
    ///
    /// # Errors
    ///
    /// [`StmError::InvalidArgument`] if `index` is out of bounds.
    pub fn get(&self, tx: &mut Transaction, index: usize) -> Result<A> {
        tx.read(self.var(index)?)
    }

    /// Writes the element at `index`.
    ///
    /// # Errors
    ///
    /// [`StmError::InvalidArgument`] if `index` is out of bounds.
    pub fn set(&self, tx: &mut Transaction, index: usize, value: A) -> Result<()> {
        tx.write(self.var(index)?, value)
    }

    /// Replaces every element with `f` applied to it.
    pub fn transform<F>(&self, tx: &mut Transaction, mut f: F) -> Result<()>
    where
        F: FnMut(A) -> A,
    {
        for var in self.vars.iter() {
            tx.modify(var, &mut f)?;
        }
        Ok(())
    }

    /// Folds over the elements in index order.
    pub fn fold<B, F>(&self, tx: &mut Transaction, init: B, mut f: F) -> Result<B>
    where
        F: FnMut(B, A) -> B,
    {
        let mut acc = init;
        for var in self.vars.iter() {
            acc = f(acc, tx.read(var)?);
        }
        Ok(acc)
    }
}
