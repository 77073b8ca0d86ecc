use serde::{Deserialize, Serialize};

/// Defines what the runner does between a conflicted attempt and the next one.
///
/// Conflicts are always resolved by running the transaction again; this only
/// controls how eagerly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConflictBackoff {
    /// Start the next attempt right away.
    Immediate,
    /// Yield the thread to the OS scheduler first.
    #[default]
    Yield,
    /// Spin for the given number of rounds first.
    Spin(u32),
}

impl ConflictBackoff {
    pub(crate) fn pause(&self) {
        match *self {
            ConflictBackoff::Immediate => {}
            ConflictBackoff::Yield => std::thread::yield_now(),
            ConflictBackoff::Spin(rounds) => {
                for _ in 0..rounds {
                    std::hint::spin_loop();
                }
            }
        }
    }
}
