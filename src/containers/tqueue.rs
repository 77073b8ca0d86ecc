use crate::containers::plist::PList;
use crate::errors::Result;
use crate::transaction::Transaction;
use crate::tvar::TVar;

/// An unbounded FIFO queue.
///
/// The queue keeps two persistent lists in two variables: a read end
/// holding elements in order, and a write end holding new elements in
/// reverse. Writers only touch the write end, so they do not conflict with
/// readers that are served from the read end. When the read end runs dry,
/// the write end is reversed into it.
///
/// # Examples
///
/// ```no_run
/// use seshat::prelude::*;
///
/// let queue = TQueue::new();
/// atomically(|tx| {
///     queue.write(tx, 1)?;
///     queue.write(tx, 2)
/// })
/// .unwrap();
/// assert_eq!(atomically(|tx| queue.read(tx)).unwrap(), 1);
/// ```
pub struct TQueue<A> {
    reads: TVar<PList<A>>,
    writes: TVar<PList<A>>,
}

impl<A> Clone for TQueue<A> {
    fn clone(&self) -> Self {
        Self {
            reads: self.reads.clone(),
            writes: self.writes.clone(),
        }
    }
}

impl<A: Clone + Send + Sync + 'static> Default for TQueue<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: Clone + Send + Sync + 'static> TQueue<A> {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self {
            reads: TVar::new(PList::nil()),
            writes: TVar::new(PList::nil()),
        }
    }

    /// Creates an empty queue as part of a transaction.
    pub fn new_in(tx: &mut Transaction) -> Self {
        Self {
            reads: tx.new_tvar(PList::nil()),
            writes: tx.new_tvar(PList::nil()),
        }
    }

    /// Appends `value` to the back of the queue.
    pub fn write(&self, tx: &mut Transaction, value: A) -> Result<()> {
        tx.modify(&self.writes, |xs| xs.cons(value))
    }

    /// Puts `value` at the front of the queue, so it is the next element read.
    pub fn write_front(&self, tx: &mut Transaction, value: A) -> Result<()> {
        tx.modify(&self.reads, |xs| xs.cons(value))
    }

    /// Removes and returns the front element, retrying while the queue is empty.
    pub fn read(&self, tx: &mut Transaction) -> Result<A> {
        let xs = tx.read(&self.reads)?;
        if let Some((head, tail)) = xs.uncons() {
            tx.write(&self.reads, tail)?;
            return Ok(head);
        }

        let ys = tx.read(&self.writes)?;
        match ys.reverse().uncons() {
            None => tx.retry(),
            Some((head, tail)) => {
                tx.write(&self.writes, PList::nil())?;
                tx.write(&self.reads, tail)?;
                Ok(head)
            }
        }
    }

    /// Like [`TQueue::read`], but returns `None` instead of retrying.
    pub fn try_read(&self, tx: &mut Transaction) -> Result<Option<A>> {
        tx.or_else(|tx| self.read(tx).map(Some), |_| Ok(None))
    }

    /// Returns the front element without removing it, retrying while the queue is empty.
    pub fn peek(&self, tx: &mut Transaction) -> Result<A> {
        let value = self.read(tx)?;
        self.write_front(tx, value.clone())?;
        Ok(value)
    }

    /// Like [`TQueue::peek`], but returns `None` instead of retrying.
    pub fn try_peek(&self, tx: &mut Transaction) -> Result<Option<A>> {
        match self.try_read(tx)? {
            Some(value) => {
                self.write_front(tx, value.clone())?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Removes every element and returns them in queue order. Never retries.
    pub fn flush(&self, tx: &mut Transaction) -> Result<Vec<A>> {
        let xs = tx.read(&self.reads)?;
        if !xs.is_empty() {
            tx.write(&self.reads, PList::nil())?;
        }
        let ys = tx.read(&self.writes)?;
        if !ys.is_empty() {
            tx.write(&self.writes, PList::nil())?;
        }

        let mut drained = xs.to_vec();
        drained.extend(ys.reverse().to_vec());
        Ok(drained)
    }

    /// Keeps only the elements for which `keep` returns `true`.
    ///
    /// Touches both ends of the queue, so it conflicts with concurrent
    /// readers and writers alike.
    pub fn retain<P>(&self, tx: &mut Transaction, mut keep: P) -> Result<()>
    where
        P: FnMut(&A) -> bool,
    {
        tx.modify(&self.reads, |xs| xs.filter(&mut keep))?;
        tx.modify(&self.writes, |ys| ys.filter(&mut keep))
    }

    /// Filters the queue, removing every element for which `pred` returns `false`.
    ///
    /// Same as [`TQueue::retain`].
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use seshat::prelude::*;
    ///
    /// let queue = TQueue::new();
    /// atomically(|tx| {
    ///     queue.write(tx, 0)?;
    ///     queue.write(tx, 1)?;
    ///     queue.remove_all(tx, |x| *x != 0)
    /// })
    /// .unwrap();
    /// assert_eq!(atomically(|tx| queue.flush(tx)).unwrap(), vec![1]);
    /// ```
    pub fn remove_all<P>(&self, tx: &mut Transaction, pred: P) -> Result<()>
    where
        P: FnMut(&A) -> bool,
    {
        self.retain(tx, pred)
    }

    /// Number of queued elements. Touches both ends of the queue.
    pub fn size(&self, tx: &mut Transaction) -> Result<usize> {
        Ok(tx.read(&self.reads)?.len() + tx.read(&self.writes)?.len())
    }

    /// Whether the queue holds no element.
    pub fn is_empty(&self, tx: &mut Transaction) -> Result<bool> {
        Ok(tx.read(&self.reads)?.is_empty() && tx.read(&self.writes)?.is_empty())
    }

    /// Negation of [`TQueue::is_empty`].
    pub fn is_not_empty(&self, tx: &mut Transaction) -> Result<bool> {
        self.is_empty(tx).map(|empty| !empty)
    }
}
