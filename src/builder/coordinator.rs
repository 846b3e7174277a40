//! Builder for constructing coordinators.

use crate::builder::config::CoordinatorConfig;
use crate::builder::error::BuildError;
use crate::effects::{Coordinator, Dispatch};
use std::sync::Arc;
use std::time::Duration;

/// Builder for constructing a [`Coordinator`] with a fluent API.
#[derive(Default)]
pub struct CoordinatorBuilder {
    dispatcher: Option<Arc<dyn Dispatch>>,
    default_timeout: Option<Duration>,
}

impl CoordinatorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Where lifecycle actions are dispatched (required).
    pub fn dispatcher(mut self, dispatcher: Arc<dyn Dispatch>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Timeout for transactions that do not set their own.
    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    /// Apply settings loaded from configuration. Unset fields are left alone.
    pub fn config(mut self, config: &CoordinatorConfig) -> Self {
        if let Some(timeout) = config.default_timeout() {
            self.default_timeout = Some(timeout);
        }
        self
    }

    /// Build the coordinator.
    /// Returns an error if no dispatcher was given.
    pub fn build(self) -> Result<Coordinator, BuildError> {
        let dispatcher = self.dispatcher.ok_or(BuildError::MissingDispatcher)?;
        Ok(Coordinator::new(dispatcher).with_default_timeout(self.default_timeout))
    }
}
