//! Optimist: optimistic, cancelable, nestable transactions over an immutable
//! state tree.
//!
//! Optimist follows a "pure core, imperative shell" split. The core holds
//! the state tree, the transaction table, the branch-aware reducer and the
//! three-way merge, all as pure functions over immutable values. The shell
//! holds the store that serializes reductions, the ambient transaction
//! context and the coordinator that races commit, cancel and timeout.
//!
//! # Core Concepts
//!
//! - **Transaction**: isolated working copy of the state, merged back on commit
//! - **Three-way merge**: reconciles a transaction's changes with concurrent ones
//! - **Ambient context**: the current transaction id, visible across awaits
//! - **Router**: stamps that id onto actions and drops stale ones
//!
//! # Example
//!
//! ```rust
//! use optimist::core::{Action, AppAction, TransactionPhase, Value, TRANSACTIONS_KEY};
//! use optimist::effects::{Coordinator, Dispatch, Store};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! fn counter(state: &Value, action: &AppAction) -> Value {
//!     match action.kind.as_str() {
//!         "increment" => {
//!             let n = state.get("counter").and_then(Value::as_i64).unwrap_or(0);
//!             state.with("counter", n + 1)
//!         }
//!         _ => state.clone(),
//!     }
//! }
//!
//! let store = Arc::new(Store::new(counter, Value::from(json!({"counter": 0}))));
//! let coordinator = Coordinator::new(store.clone());
//!
//! let dispatcher = store.clone();
//! let handle = coordinator.begin_sync("t1", move || {
//!     dispatcher.dispatch(Action::app("increment"))?;
//!     // isolated until commit
//!     assert_eq!(dispatcher.tree().get("counter"), Some(&Value::from(0)));
//!     Ok::<_, optimist::core::MergeError>(())
//! });
//!
//! assert_eq!(handle.phase(), TransactionPhase::Committed);
//! assert_eq!(store.tree().get("counter"), Some(&Value::from(1)));
//! assert!(serde_json::to_value(store.state()).unwrap().get(TRANSACTIONS_KEY).is_none());
//! ```

pub mod builder;
pub mod core;
pub mod effects;

// Re-export commonly used types
pub use crate::builder::{set_default_timeout, CoordinatorBuilder, TransactionOptions};
pub use crate::core::{merge, Action, AppAction, MergeError, TransactionId, TransactionPhase, Value};
pub use crate::effects::{Coordinator, Dispatch, Store, TransactionError, TransactionHandle};
