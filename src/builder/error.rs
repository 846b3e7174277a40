//! Errors raised while configuring a coordinator.

use thiserror::Error;

/// Errors that can occur when building a [`Coordinator`](crate::effects::Coordinator).
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Dispatcher not specified. Call .dispatcher(store) before .build()")]
    MissingDispatcher,

    #[error("Invalid coordinator config: {0}")]
    InvalidConfig(#[from] serde_json::Error),
}
