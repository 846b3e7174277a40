//! Pure core of the transaction machinery.
//!
//! - `value`: immutable, structurally shared state trees
//! - `table`: open transactions and the root state carrying them
//! - `action`: the lifecycle action catalogue and application actions
//! - `merge`: three-way optimistic merge
//! - `reducer`: routes actions to root or to transaction working copies
//! - `router`: stamps ambient ids and drops stale actions
//! - `phase`: lifecycle phases
//!
//! Nothing in this module performs I/O, spawns tasks or reads clocks except
//! through values handed in by the caller.

mod action;
mod merge;
mod phase;
mod reducer;
mod router;
mod table;
mod value;

pub use action::{
    Action, ActionDecodeError, AppAction, CANCEL_TRANSACTION, COMMIT_TRANSACTION,
    REJECT_TRANSACTION, START_TRANSACTION, TIMEOUT_TRANSACTION,
};
pub use merge::{merge, MergeError};
pub use phase::{PhaseTimeline, PhaseTransition, TransactionPhase};
pub use reducer::{Reducer, TransactionReducer};
pub use router::{route, Route};
pub use table::{
    RootState, Transaction, TransactionId, TransactionTable, TRANSACTIONS_KEY,
};
pub use value::{Map, Value};
