//! The dispatch boundary and the store behind it.

use crate::core::{route, Action, MergeError, Reducer, RootState, Route, TransactionReducer, Value};
use crate::effects::context;
use parking_lot::Mutex;
use tracing::{debug, warn};

/// Something actions can be dispatched to.
///
/// Returns the action as it was handed to the reducer (stamped with the
/// ambient transaction id where applicable). A stale action is absorbed and
/// still returned `Ok`; only a failed commit merge is an error.
pub trait Dispatch: Send + Sync {
    fn dispatch(&self, action: Action) -> Result<Action, MergeError>;
}

/// Holds the current [`RootState`] and reduces actions one at a time.
///
/// The lock is held only for the synchronous reduce step. Readers receive
/// snapshots that share structure with the live state and never change.
pub struct Store<R> {
    reducer: TransactionReducer<R>,
    state: Mutex<RootState>,
}

impl<R: Reducer> Store<R> {
    pub fn new(reducer: R, initial: Value) -> Self {
        Self {
            reducer: TransactionReducer::new(reducer),
            state: Mutex::new(RootState::new(initial)),
        }
    }

    /// Snapshot of the full state, including open transactions.
    pub fn state(&self) -> RootState {
        self.state.lock().clone()
    }

    /// Snapshot of the application tree only.
    pub fn tree(&self) -> Value {
        self.state.lock().tree().clone()
    }
}

impl<R: Reducer> Dispatch for Store<R> {
    fn dispatch(&self, action: Action) -> Result<Action, MergeError> {
        let ambient = context::current();
        let mut state = self.state.lock();
        match route(action, ambient, &state) {
            Route::Drop(action) => {
                debug!(
                    action = action.kind(),
                    transaction_id = ?action.transaction_id(),
                    "ignoring action on a transaction that no longer exists"
                );
                Ok(action)
            }
            Route::Forward(action) => match self.reducer.reduce(&state, &action) {
                Ok(next) => {
                    *state = next;
                    Ok(action)
                }
                Err(err) => {
                    warn!(
                        action = action.kind(),
                        transaction_id = ?action.transaction_id(),
                        error = %err,
                        "reduce failed, state left unchanged"
                    );
                    Err(err)
                }
            },
        }
    }
}
