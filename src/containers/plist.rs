use std::sync::Arc;

struct Node<A> {
    value: A,
    next: Option<Arc<Node<A>>>,
}

/// Immutable singly-linked list with shared tails.
///
/// Cloning is O(1), so the list can live inside a `TVar` and be copied in
/// and out of transaction logs freely.
pub(crate) struct PList<A> {
    head: Option<Arc<Node<A>>>,
}

impl<A> PList<A> {
    pub(crate) fn nil() -> Self {
        Self { head: None }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    pub(crate) fn iter(&self) -> Iter<'_, A> {
        Iter {
            next: self.head.as_deref(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.iter().count()
    }
}

impl<A: Clone> PList<A> {
    pub(crate) fn cons(&self, value: A) -> Self {
        Self {
            head: Some(Arc::new(Node {
                value,
                next: self.head.clone(),
            })),
        }
    }

    /// Splits the list into its head and tail.
    pub(crate) fn uncons(&self) -> Option<(A, PList<A>)> {
        self.head.as_ref().map(|node| {
            (
                node.value.clone(),
                PList {
                    head: node.next.clone(),
                },
            )
        })
    }

    pub(crate) fn reverse(&self) -> Self {
        self.iter()
            .fold(PList::nil(), |acc, value| acc.cons(value.clone()))
    }

    /// Keeps the elements for which `keep` returns `true`, preserving order.
    pub(crate) fn filter<P>(&self, mut keep: P) -> Self
    where
        P: FnMut(&A) -> bool,
    {
        self.iter()
            .filter(|value| keep(value))
            .fold(PList::nil(), |acc, value| acc.cons(value.clone()))
            .reverse()
    }

    pub(crate) fn to_vec(&self) -> Vec<A> {
        self.iter().cloned().collect()
    }
}

impl<A> Clone for PList<A> {
    fn clone(&self) -> Self {
        Self {
            head: self.head.clone(),
        }
    }
}

impl<A> Default for PList<A> {
    fn default() -> Self {
        Self::nil()
    }
}

// Unlinks uniquely owned nodes one by one so long lists do not overflow the stack.
impl<A> Drop for PList<A> {
    fn drop(&mut self) {
        let mut next = self.head.take();
        while let Some(node) = next {
            match Arc::try_unwrap(node) {
                Ok(mut node) => next = node.next.take(),
                Err(_) => break,
            }
        }
    }
}

pub(crate) struct Iter<'a, A> {
    next: Option<&'a Node<A>>,
}

impl<'a, A> Iterator for Iter<'a, A> {
    type Item = &'a A;

    fn next(&mut self) -> Option<Self::Item> {
        self.next.map(|node| {
            self.next = node.next.as_deref();
            &node.value
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(values: &[i32]) -> PList<i32> {
        values.iter().rev().fold(PList::nil(), |acc, v| acc.cons(*v))
    }

    #[test]
    fn cons_and_uncons() {
        let xs = list(&[1, 2, 3]);
        let (head, tail) = xs.uncons().unwrap();
        assert_eq!(head, 1);
        assert_eq!(tail.to_vec(), vec![2, 3]);
        assert_eq!(xs.len(), 3);
        assert!(PList::<i32>::nil().uncons().is_none());
    }

    #[test]
    fn reverse_and_filter_keep_sharing_intact() {
        let xs = list(&[1, 2, 3, 4]);
        assert_eq!(xs.reverse().to_vec(), vec![4, 3, 2, 1]);
        assert_eq!(xs.filter(|v| v % 2 == 0).to_vec(), vec![2, 4]);
        assert_eq!(xs.to_vec(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn dropping_a_long_list_does_not_overflow() {
        let mut xs = PList::nil();
        for i in 0..200_000 {
            xs = xs.cons(i);
        }
        assert_eq!(xs.len(), 200_000);
        drop(xs);
    }
}
