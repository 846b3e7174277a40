//! Transaction lifecycle coordinator.
//!
//! [`Coordinator::begin`] opens a transaction, runs its body inside an
//! ambient scope and races three signals against each other: the body
//! settling, an optional timer and an external cancel. The first signal to
//! claim the phase guard decides the terminal phase and the action emitted
//! through the dispatcher; every later signal is a no-op.

use crate::builder::{default_timeout, CoordinatorBuilder, TransactionOptions};
use crate::core::{
    Action, MergeError, PhaseTimeline, PhaseTransition, TransactionId, TransactionPhase,
};
use crate::effects::context;
use crate::effects::store::Dispatch;
use chrono::Utc;
use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{oneshot, Notify};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{self, Instant};
use tracing::{debug, warn};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Marks a phase transition in flight. Reads as `Pending`.
const SETTLING: u8 = u8::MAX;

fn next_id() -> TransactionId {
    TransactionId::new(NEXT_ID.fetch_add(1, Ordering::Relaxed))
}

/// Why an awaited transaction did not succeed.
///
/// Cancellation is not an error: a cancelled handle resolves `Ok(())`.
#[derive(Debug, Error)]
pub enum TransactionError<E> {
    /// The body failed; its error is passed through unchanged.
    #[error("{0}")]
    Body(E),

    #[error("transaction {name} (id: {id}) timed out")]
    Timeout { name: String, id: TransactionId },

    /// The body succeeded but its changes could not be merged.
    #[error("transaction {name} (id: {id}) could not commit: {source}")]
    Commit {
        name: String,
        id: TransactionId,
        #[source]
        source: MergeError,
    },

    #[error("transaction {name} (id: {id}) panicked")]
    Panicked { name: String, id: TransactionId },

    /// The body task was aborted by the runtime before it settled.
    #[error("transaction {id} was dropped before it settled")]
    Dropped { id: TransactionId },
}

impl<E> TransactionError<E> {
    /// The body's own error, if that is what failed the transaction.
    pub fn body(&self) -> Option<&E> {
        match self {
            TransactionError::Body(err) => Some(err),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, TransactionError::Timeout { .. })
    }
}

type Outcome<E> = Result<(), TransactionError<E>>;

/// Opens transactions against one dispatcher.
///
/// Cloning is cheap; clones share the dispatcher. Ids are unique across all
/// coordinators in the process.
#[derive(Clone)]
pub struct Coordinator {
    dispatcher: Arc<dyn Dispatch>,
    default_timeout: Option<Duration>,
}

impl fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coordinator")
            .field("default_timeout", &self.default_timeout)
            .finish_non_exhaustive()
    }
}

impl Coordinator {
    /// A coordinator that falls back to the process-wide default timeout.
    pub fn new(dispatcher: Arc<dyn Dispatch>) -> Self {
        Self {
            dispatcher,
            default_timeout: None,
        }
    }

    pub fn builder() -> CoordinatorBuilder {
        CoordinatorBuilder::new()
    }

    pub(crate) fn with_default_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn dispatcher(&self) -> &Arc<dyn Dispatch> {
        &self.dispatcher
    }

    /// Start a transaction whose body runs as its own Tokio task.
    ///
    /// The start action is dispatched before this returns. The body runs
    /// with the new id bound as the ambient transaction, including after
    /// every await. If the transaction is cancelled or times out the body
    /// is left running; anything it dispatches afterwards is dropped.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn begin<F, Fut, E>(
        &self,
        options: impl Into<TransactionOptions>,
        body: F,
    ) -> TransactionHandle<E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        let options = options.into();
        // too far out to represent means no deadline
        let deadline = self
            .resolve_timeout(options.timeout)
            .and_then(|timeout| Instant::now().checked_add(timeout));
        let (shared, handle) = self.open(options);

        let id = shared.id;
        let task = tokio::spawn(context::scope(id, async move { body().await }));
        tokio::spawn(shared.drive(task, deadline));
        handle
    }

    /// Start a transaction whose body completes synchronously.
    ///
    /// Both the start and the terminal action are dispatched before this
    /// returns, so the handle is already settled. A panicking body rejects
    /// the transaction and the panic is resumed. No runtime is needed.
    pub fn begin_sync<F, E>(
        &self,
        options: impl Into<TransactionOptions>,
        body: F,
    ) -> TransactionHandle<E>
    where
        F: FnOnce() -> Result<(), E>,
        E: fmt::Display + Send + 'static,
    {
        let (shared, handle) = self.open(options.into());

        let result =
            context::sync_scope(shared.id, || panic::catch_unwind(AssertUnwindSafe(body)));
        match result {
            Ok(Ok(())) => shared.commit(),
            Ok(Err(err)) => shared.reject(err),
            Err(payload) => {
                shared.panicked();
                panic::resume_unwind(payload);
            }
        }
        handle
    }

    fn open<E: fmt::Display>(
        &self,
        options: TransactionOptions,
    ) -> (Arc<Shared<E>>, TransactionHandle<E>) {
        let parent_id = context::current();
        let id = next_id();
        let (sender, receiver) = oneshot::channel();
        let shared = Arc::new(Shared {
            id,
            name: options.name,
            parent_id,
            phase: AtomicU8::new(TransactionPhase::Pending as u8),
            timeline: Mutex::new(PhaseTimeline::new(Utc::now())),
            outcome: Mutex::new(Some(sender)),
            settled: Notify::new(),
            dispatcher: Arc::clone(&self.dispatcher),
        });

        debug!(
            transaction_id = %id,
            name = %shared.name,
            parent_id = ?parent_id,
            "transaction started"
        );
        shared.emit(Action::StartTransaction {
            id,
            parent_id,
            name: shared.name.clone(),
        });

        let handle = TransactionHandle {
            shared: Arc::clone(&shared),
            outcome: receiver,
        };
        (shared, handle)
    }

    /// Own timeout, then the coordinator's default, then the process-wide
    /// default. Zero disables the timer.
    fn resolve_timeout(&self, requested: Option<Duration>) -> Option<Duration> {
        let timeout = requested
            .or(self.default_timeout)
            .unwrap_or_else(default_timeout);
        (!timeout.is_zero()).then_some(timeout)
    }
}

struct Shared<E> {
    id: TransactionId,
    name: String,
    parent_id: Option<TransactionId>,
    phase: AtomicU8,
    timeline: Mutex<PhaseTimeline>,
    outcome: Mutex<Option<oneshot::Sender<Outcome<E>>>>,
    settled: Notify,
    dispatcher: Arc<dyn Dispatch>,
}

impl<E: fmt::Display> Shared<E> {
    fn phase(&self) -> TransactionPhase {
        TransactionPhase::from_repr(self.phase.load(Ordering::Acquire))
    }

    /// Win the right to settle. Only the first caller gets `true`.
    fn claim(&self) -> bool {
        self.phase
            .compare_exchange(
                TransactionPhase::Pending as u8,
                SETTLING,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    fn finish(&self, phase: TransactionPhase, outcome: Outcome<E>) {
        {
            let mut timeline = self.timeline.lock();
            *timeline = timeline.record(PhaseTransition {
                from: TransactionPhase::Pending,
                to: phase,
                timestamp: Utc::now(),
            });
        }
        self.phase.store(phase as u8, Ordering::Release);
        if let Some(sender) = self.outcome.lock().take() {
            // the handle may have been dropped
            let _ = sender.send(outcome);
        }
        self.settled.notify_one();
    }

    /// Dispatch a lifecycle action that cannot fail to reduce.
    fn emit(&self, action: Action) {
        if let Err(err) = self.dispatcher.dispatch(action) {
            warn!(transaction_id = %self.id, error = %err, "lifecycle action failed to reduce");
        }
    }

    fn commit(&self) {
        if !self.claim() {
            return;
        }
        match self.dispatcher.dispatch(Action::CommitTransaction { id: self.id }) {
            Ok(_) => {
                debug!(transaction_id = %self.id, name = %self.name, "transaction committed");
                self.finish(TransactionPhase::Committed, Ok(()));
            }
            Err(source) => {
                warn!(
                    transaction_id = %self.id,
                    name = %self.name,
                    error = %source,
                    "transaction commit failed, rejecting"
                );
                self.emit(Action::RejectTransaction {
                    id: self.id,
                    reason: source.to_string(),
                });
                self.finish(
                    TransactionPhase::Rejected,
                    Err(TransactionError::Commit {
                        name: self.name.clone(),
                        id: self.id,
                        source,
                    }),
                );
            }
        }
    }

    fn reject(&self, err: E) {
        if !self.claim() {
            return;
        }
        let reason = err.to_string();
        debug!(transaction_id = %self.id, name = %self.name, reason = %reason, "transaction rejected");
        self.emit(Action::RejectTransaction { id: self.id, reason });
        self.finish(TransactionPhase::Rejected, Err(TransactionError::Body(err)));
    }

    fn panicked(&self) {
        if !self.claim() {
            return;
        }
        debug!(transaction_id = %self.id, name = %self.name, "transaction body panicked");
        self.emit(Action::RejectTransaction {
            id: self.id,
            reason: "transaction body panicked".to_string(),
        });
        self.finish(
            TransactionPhase::Rejected,
            Err(TransactionError::Panicked {
                name: self.name.clone(),
                id: self.id,
            }),
        );
    }

    fn aborted(&self) {
        if !self.claim() {
            return;
        }
        debug!(transaction_id = %self.id, name = %self.name, "transaction body aborted");
        self.emit(Action::RejectTransaction {
            id: self.id,
            reason: "transaction body was aborted".to_string(),
        });
        self.finish(
            TransactionPhase::Rejected,
            Err(TransactionError::Dropped { id: self.id }),
        );
    }

    fn expire(&self) {
        if !self.claim() {
            return;
        }
        debug!(transaction_id = %self.id, name = %self.name, "transaction timed out");
        self.emit(Action::TimeoutTransaction { id: self.id });
        self.finish(
            TransactionPhase::Timeout,
            Err(TransactionError::Timeout {
                name: self.name.clone(),
                id: self.id,
            }),
        );
    }

    fn cancel(&self) -> bool {
        if !self.claim() {
            return false;
        }
        debug!(transaction_id = %self.id, name = %self.name, "transaction cancelled");
        self.emit(Action::CancelTransaction { id: self.id });
        self.finish(TransactionPhase::Cancelled, Ok(()));
        true
    }

    fn settle_joined(&self, joined: Result<Result<(), E>, JoinError>) {
        match joined {
            Ok(Ok(())) => self.commit(),
            Ok(Err(err)) => self.reject(err),
            Err(err) if err.is_panic() => self.panicked(),
            Err(_) => self.aborted(),
        }
    }

    /// Race the body against the deadline and any other terminal signal.
    async fn drive(self: Arc<Self>, body: JoinHandle<Result<(), E>>, deadline: Option<Instant>) {
        let expiry = async move {
            match deadline {
                Some(deadline) => time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            joined = body => self.settle_joined(joined),
            _ = expiry => self.expire(),
            _ = self.settled.notified() => {}
        }
    }
}

/// Awaitable result of a transaction.
///
/// Resolves `Ok(())` on commit or cancel. Dropping the handle does not
/// cancel the transaction.
pub struct TransactionHandle<E> {
    shared: Arc<Shared<E>>,
    outcome: oneshot::Receiver<Outcome<E>>,
}

impl<E: fmt::Display> TransactionHandle<E> {
    pub fn id(&self) -> TransactionId {
        self.shared.id
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn parent_id(&self) -> Option<TransactionId> {
        self.shared.parent_id
    }

    /// Current phase. Reads `Pending` until a terminal phase is stored.
    pub fn phase(&self) -> TransactionPhase {
        self.shared.phase()
    }

    /// Cancel the transaction if it is still pending.
    ///
    /// Returns `false` when another signal already settled it.
    pub fn cancel(&self) -> bool {
        self.shared.cancel()
    }

    /// A cloneable handle that can cancel from another task.
    pub fn canceller(&self) -> Canceller<E> {
        Canceller {
            shared: Arc::clone(&self.shared),
        }
    }

    /// When the transaction started and how it settled.
    pub fn history(&self) -> PhaseTimeline {
        self.shared.timeline.lock().clone()
    }
}

impl<E> fmt::Debug for TransactionHandle<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionHandle")
            .field("id", &self.shared.id)
            .field("name", &self.shared.name)
            .field("parent_id", &self.shared.parent_id)
            .finish_non_exhaustive()
    }
}

impl<E> Future for TransactionHandle<E> {
    type Output = Outcome<E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let id = this.shared.id;
        Pin::new(&mut this.outcome)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(TransactionError::Dropped { id })))
    }
}

/// Cancels one transaction; see [`TransactionHandle::cancel`].
pub struct Canceller<E> {
    shared: Arc<Shared<E>>,
}

impl<E> Clone for Canceller<E> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<E: fmt::Display> Canceller<E> {
    pub fn id(&self) -> TransactionId {
        self.shared.id
    }

    pub fn cancel(&self) -> bool {
        self.shared.cancel()
    }
}
