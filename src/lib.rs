//! Seshat: composable software transactional memory.
//!
//! Shared state lives in [`TVar`]s. A transaction is a closure over
//! `&mut Transaction` that reads and writes variables; [`atomically`] runs
//! it so that all of its writes become visible at once or not at all.
//! Transactions compose: a function taking `&mut Transaction` and returning
//! [`Result`] can be called from any other transaction body.
//!
//! - [`Transaction::retry`] blocks the transaction until one of the
//!   variables it read changes, then runs it again.
//! - [`Transaction::or_else`] runs an alternative when the first branch retries.
//! - [`Transaction::abort`] and [`Transaction::catch`] carry application errors.
//!
//! The [`containers`] module builds queues, maps, sets, semaphores and
//! synchronized slots out of the same primitives.
//!
//! ```no_run
//! use seshat::prelude::*;
//!
//! let queue: TQueue<u32> = TQueue::new();
//! let consumer = {
//!     let queue = queue.clone();
//!     std::thread::spawn(move || atomically(|tx| queue.read(tx)))
//! };
//! atomically(|tx| queue.write(tx, 7)).unwrap();
//! assert_eq!(consumer.join().unwrap().unwrap(), 7);
//! ```

pub mod config;
pub mod conflict;
pub mod containers;
mod data_store;
pub mod errors;
pub mod stm;
pub mod transaction;
pub mod tvar;
mod waiter;

// Re-export key types and structs for easier access
pub use config::StmConfig;
pub use conflict::resolution::ConflictBackoff;
pub use containers::{TArray, TMVar, TMap, TQueue, TSemaphore, TSet};
pub use errors::{Result, StmError};
pub use stm::{Stm, StmStats, atomically, atomically_async, default_stm, prelude};
pub use transaction::Transaction;
pub use tvar::TVar;
