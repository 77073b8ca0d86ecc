//! Concurrent data structures built from `TVar`s and transaction combinators.
//!
//! Every operation takes the running transaction, so container operations
//! compose with each other and with plain variable accesses into a single
//! atomic transaction.

mod hamt;
mod plist;

pub mod tarray;
pub mod tmap;
pub mod tmvar;
pub mod tqueue;
pub mod tsemaphore;
pub mod tset;

pub use tarray::TArray;
pub use tmap::TMap;
pub use tmvar::TMVar;
pub use tqueue::TQueue;
pub use tsemaphore::TSemaphore;
pub use tset::TSet;
