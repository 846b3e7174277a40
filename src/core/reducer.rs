//! State-branching reducer.
//!
//! [`TransactionReducer`] wraps a pure application [`Reducer`] and routes each
//! action either to the root tree or to the working copy of the transaction
//! it targets. Terminal lifecycle actions remove the transaction; a commit
//! first merges its working copy into the parent transaction or into root.

use crate::core::action::{Action, AppAction};
use crate::core::merge::{merge, MergeError};
use crate::core::table::{RootState, Transaction, TransactionId, TRANSACTIONS_KEY};
use crate::core::value::Value;
use tracing::{debug, trace};

/// Application state transition function.
///
/// Implementations must be pure: same input, same output, no side effects.
/// Returning the input (a clone of it) signals "nothing changed".
pub trait Reducer: Send + Sync {
    fn reduce(&self, state: &Value, action: &AppAction) -> Value;
}

impl<F> Reducer for F
where
    F: Fn(&Value, &AppAction) -> Value + Send + Sync,
{
    fn reduce(&self, state: &Value, action: &AppAction) -> Value {
        self(state, action)
    }
}

/// Wraps an application reducer with transaction branching.
pub struct TransactionReducer<R> {
    inner: R,
}

impl<R: Reducer> TransactionReducer<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Reduce one action.
    ///
    /// Only a commit can fail. On failure nothing is applied and the caller
    /// keeps its current state.
    pub fn reduce(&self, state: &RootState, action: &Action) -> Result<RootState, MergeError> {
        trace!(action = action.kind(), "reducing");
        match action {
            Action::App(app) => Ok(match app.transaction_id {
                None => self.reduce_root(state, app),
                Some(id) => self.reduce_in_transaction(state, id, app),
            }),
            Action::StartTransaction {
                id,
                parent_id,
                name,
            } => Ok(start(state, *id, *parent_id, name)),
            Action::CommitTransaction { id } => commit(state, *id),
            Action::RejectTransaction { id, .. }
            | Action::CancelTransaction { id }
            | Action::TimeoutTransaction { id } => Ok(discard(state, *id)),
        }
    }

    fn reduce_root(&self, state: &RootState, action: &AppAction) -> RootState {
        let tree = self.inner.reduce(state.tree(), action);
        if tree.is_identical(state.tree()) {
            state.clone()
        } else {
            state.with_tree(tree)
        }
    }

    fn reduce_in_transaction(
        &self,
        state: &RootState,
        id: TransactionId,
        action: &AppAction,
    ) -> RootState {
        let Some(transaction) = state.transaction(id) else {
            return state.clone();
        };
        let working = self.inner.reduce(transaction.effective_state(), action);
        state.update_table(|table| {
            if let Some(entry) = table.get_mut(&id) {
                entry.working_state = Some(working);
            }
        })
    }
}

fn start(
    state: &RootState,
    id: TransactionId,
    parent_id: Option<TransactionId>,
    name: &str,
) -> RootState {
    if state.contains(id) {
        return state.clone();
    }
    let snapshot = match parent_id {
        None => state.tree(),
        Some(parent_id) => match state.transaction(parent_id) {
            Some(parent) => parent.effective_state(),
            None => {
                debug!(
                    transaction_id = %id,
                    parent_id = %parent_id,
                    "dropping start of transaction whose parent already terminated"
                );
                return state.clone();
            }
        },
    };
    let entry = Transaction {
        id,
        name: name.to_string(),
        parent_id,
        before_state: snapshot.without(TRANSACTIONS_KEY),
        working_state: None,
    };
    state.update_table(|table| {
        table.insert(id, entry);
    })
}

fn discard(state: &RootState, id: TransactionId) -> RootState {
    if !state.contains(id) {
        return state.clone();
    }
    state.update_table(|table| {
        table.remove(&id);
    })
}

fn commit(state: &RootState, id: TransactionId) -> Result<RootState, MergeError> {
    let Some(transaction) = state.transaction(id) else {
        return Ok(state.clone());
    };
    let Some(working) = &transaction.working_state else {
        return Ok(discard(state, id));
    };

    // A parent that already terminated is treated as absent: merge into root.
    let parent = transaction
        .parent_id
        .and_then(|parent_id| state.transaction(parent_id));
    let target = parent.map_or(state.tree(), Transaction::effective_state);
    let merged = merge(target, &transaction.before_state, working)?;

    Ok(match parent.map(|parent| parent.id) {
        Some(parent_id) => state.update_table(|table| {
            table.remove(&id);
            if let Some(parent) = table.get_mut(&parent_id) {
                parent.working_state = Some(merged);
            }
        }),
        None => state.with_tree(merged).update_table(|table| {
            table.remove(&id);
        }),
    })
}
