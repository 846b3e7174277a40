//! The imperative shell around the pure core.
//!
//! - `context`: ambient transaction id carried across awaits
//! - `store`: the dispatch boundary and the single-writer state holder
//! - `coordinator`: opens transactions and races commit, cancel and timeout

pub mod context;
mod coordinator;
mod store;

pub use coordinator::{Canceller, Coordinator, TransactionError, TransactionHandle};
pub use store::{Dispatch, Store};
