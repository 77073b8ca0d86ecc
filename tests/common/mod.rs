//! Common utilities for Seshat integration tests.
#![allow(dead_code)]

use seshat::{ConflictBackoff, Stm, StmConfig};
use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// Helper function to create a runner shared between test threads.
pub fn setup_stm() -> Arc<Stm> {
    Arc::new(Stm::new(StmConfig::default()))
}

/// Helper function to create a runner that restarts conflicted attempts without pausing.
pub fn setup_eager_stm() -> Arc<Stm> {
    Arc::new(Stm::new(
        StmConfig::default().with_conflict_backoff(ConflictBackoff::Immediate),
    ))
}

/// Runs `f` on its own thread and returns its result if it finishes within `timeout_ms`.
///
/// A thread that never finishes is left behind; it dies with the test process.
pub fn run_with_timeout<T, F>(timeout_ms: u64, f: F) -> Option<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (sender, receiver) = mpsc::channel();
    thread::spawn(move || {
        let _ = sender.send(f());
    });
    receiver.recv_timeout(Duration::from_millis(timeout_ms)).ok()
}

/// Whether `f` finishes within `timeout_ms`.
pub fn terminates<F>(timeout_ms: u64, f: F) -> bool
where
    F: FnOnce() + Send + 'static,
{
    run_with_timeout(timeout_ms, f).is_some()
}

pub fn sleep_ms(ms: u64) {
    thread::sleep(Duration::from_millis(ms));
}
