use std::error::Error as StdError;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StmError {
    /// An optimistic lock or read validation failed at commit time.
    /// The runner restarts the attempt; `atomically` never returns it.
    #[error("Transaction conflict detected")]
    Conflict,

    /// Control signal raised by [`crate::Transaction::retry`].
    #[error("Transaction requested a retry")]
    Retry,

    /// The body called `retry` without having read any variable, so no
    /// commit could ever wake it up.
    #[error("Transaction retried without reading any variable and can never be woken up")]
    BlockedIndefinitely,

    /// `atomically` was called from inside a transaction body on the same
    /// thread. Compose through `&mut Transaction` instead.
    #[error("Nested transaction: atomically was called inside a running transaction")]
    NestedTransaction,

    /// An operation was called with an argument it cannot honour, such as
    /// an out-of-bounds index.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The body aborted with an application error; nothing was committed.
    #[error("Transaction aborted: {0}")]
    Aborted(Box<dyn StdError + Send + Sync>),
}

impl StmError {
    /// Wraps an application error so that it aborts the running transaction.
    pub fn aborted<E>(err: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        StmError::Aborted(err.into())
    }

    /// Whether this error is one of the runner's internal control signals.
    pub fn is_control(&self) -> bool {
        matches!(self, StmError::Conflict | StmError::Retry)
    }
}

pub type Result<T> = std::result::Result<T, StmError>;
