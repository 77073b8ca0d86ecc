use serde::{Deserialize, Serialize};

use crate::conflict::resolution::ConflictBackoff;
use crate::data_store::var_cell::DEFAULT_LOCK_SPIN_LIMIT;

/// Runtime settings of an [`Stm`](crate::Stm) instance.
///
/// None of the settings change what a transaction computes; they only tune
/// how the runner behaves under contention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StmConfig {
    /// How many times a read spins on a variable locked by a committing
    /// transaction before it starts yielding the thread between polls.
    pub lock_spin_limit: u32,
    /// What the runner does between a conflicted attempt and the next one.
    pub conflict_backoff: ConflictBackoff,
}

impl Default for StmConfig {
    fn default() -> Self {
        Self {
            lock_spin_limit: DEFAULT_LOCK_SPIN_LIMIT,
            conflict_backoff: ConflictBackoff::default(),
        }
    }
}

impl StmConfig {
    /// Sets [`StmConfig::lock_spin_limit`].
    pub fn with_lock_spin_limit(mut self, lock_spin_limit: u32) -> Self {
        self.lock_spin_limit = lock_spin_limit;
        self
    }

    /// Sets [`StmConfig::conflict_backoff`].
    ///
    /// # Examples
    ///
    /// ```
    /// use seshat::{ConflictBackoff, StmConfig};
    ///
    /// let config = StmConfig::default().with_conflict_backoff(ConflictBackoff::Spin(32));
    /// assert_eq!(config.conflict_backoff, ConflictBackoff::Spin(32));
    /// ```
    pub fn with_conflict_backoff(mut self, conflict_backoff: ConflictBackoff) -> Self {
        self.conflict_backoff = conflict_backoff;
        self
    }
}
