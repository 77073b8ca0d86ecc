//! Suspension handles for transactions blocked in `retry`.
//!
//! A [`Waiter`] is registered on every variable a blocked attempt touched.
//! The first commit that changes one of them calls [`Waiter::notify`], which
//! resumes either a parked thread or an async task. The notification is
//! sticky: a `notify` that lands before the waiting side starts waiting is
//! not lost.

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

#[derive(Default)]
struct WaitState {
    notified: bool,
    waker: Option<Waker>,
}

pub(crate) struct Waiter {
    /// Id of the blocked transaction.
    id: u64,
    state: Mutex<WaitState>,
    ready: Condvar,
}

impl Waiter {
    pub(crate) fn new(id: u64) -> Arc<Self> {
        Arc::new(Self {
            id,
            state: Mutex::new(WaitState::default()),
            ready: Condvar::new(),
        })
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn notify(&self) {
        let waker = {
            let mut state = self.state.lock();
            state.notified = true;
            state.waker.take()
        };
        self.ready.notify_all();
        if let Some(waker) = waker {
            waker.wake();
        }
    }

    pub(crate) fn is_notified(&self) -> bool {
        self.state.lock().notified
    }

    /// Parks the calling thread until [`Waiter::notify`] has been called.
    pub(crate) fn wait(&self) {
        let mut state = self.state.lock();
        while !state.notified {
            self.ready.wait(&mut state);
        }
    }

    /// Async counterpart of [`Waiter::wait`], meant for `futures::future::poll_fn`.
    pub(crate) fn poll_notified(&self, cx: &mut Context<'_>) -> Poll<()> {
        let mut state = self.state.lock();
        if state.notified {
            Poll::Ready(())
        } else {
            state.waker = Some(cx.waker().clone());
            Poll::Pending
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::task::noop_waker;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn notify_before_wait_is_not_lost() {
        let waiter = Waiter::new(1);
        waiter.notify();
        waiter.wait();
        assert!(waiter.is_notified());
    }

    #[test]
    fn notify_wakes_parked_thread() {
        let waiter = Waiter::new(2);
        let remote = Arc::clone(&waiter);
        let handle = thread::spawn(move || remote.wait());

        thread::sleep(Duration::from_millis(20));
        waiter.notify();
        handle.join().expect("waiting thread panicked");
    }

    #[test]
    fn poll_is_pending_until_notified() {
        let waiter = Waiter::new(3);
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);

        assert!(waiter.poll_notified(&mut cx).is_pending());
        waiter.notify();
        assert!(waiter.poll_notified(&mut cx).is_ready());
    }
}
