//! Ambient "current transaction" context.
//!
//! The id is stored in Tokio task-local storage. A scope binds it for a
//! synchronous closure ([`sync_scope`]) or for a future and every
//! continuation of that future ([`scope`]), so a transaction body still sees
//! its id after awaiting timers or I/O. Nested scopes shadow and then
//! restore the outer id. Unrelated tasks see nothing.
//!
//! A plain `tokio::spawn` starts a fresh task without the binding; use
//! [`spawn`] to hand work off to another task while keeping it inside the
//! transaction.

use crate::core::TransactionId;
use std::future::Future;
use tokio::task::JoinHandle;

tokio::task_local! {
    static CURRENT_TRANSACTION: TransactionId;
}

/// The transaction bound to the calling scope, if any.
pub fn current() -> Option<TransactionId> {
    CURRENT_TRANSACTION.try_with(|id| *id).ok()
}

/// Bind `id` for the whole lifetime of `future`, across suspension points.
pub fn scope<F: Future>(id: TransactionId, future: F) -> impl Future<Output = F::Output> {
    CURRENT_TRANSACTION.scope(id, future)
}

/// Bind `id` while `f` runs.
pub fn sync_scope<F, R>(id: TransactionId, f: F) -> R
where
    F: FnOnce() -> R,
{
    CURRENT_TRANSACTION.sync_scope(id, f)
}

/// Spawn `future` on the runtime, carrying over the caller's transaction.
pub fn spawn<F>(future: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    match current() {
        Some(id) => tokio::spawn(scope(id, future)),
        None => tokio::spawn(future),
    }
}
