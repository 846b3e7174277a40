//! Routing of actions before they reach the reducer.
//!
//! The router stamps the ambient transaction id onto application actions
//! that do not already name one, then drops anything aimed at a transaction
//! that no longer exists. Dropping is how late continuations of a committed,
//! cancelled or timed out transaction are kept from touching state.

use crate::core::action::Action;
use crate::core::table::{RootState, TransactionId};

/// Outcome of routing one action.
#[derive(Clone, Debug, PartialEq)]
pub enum Route {
    /// Hand the (possibly stamped) action to the reducer.
    Forward(Action),
    /// The target transaction is gone; the action must not be reduced.
    Drop(Action),
}

/// Decide what happens to `action` given the ambient transaction and the
/// current state.
///
/// `StartTransaction` is always forwarded since it targets an id that does
/// not exist yet.
pub fn route(action: Action, ambient: Option<TransactionId>, state: &RootState) -> Route {
    let action = match (action, ambient) {
        (Action::App(app), Some(id)) if app.transaction_id.is_none() => {
            Action::App(app.in_transaction(id))
        }
        (action, _) => action,
    };
    match action.transaction_id() {
        Some(id) if !action.is_start() && !state.contains(id) => Route::Drop(action),
        _ => Route::Forward(action),
    }
}
