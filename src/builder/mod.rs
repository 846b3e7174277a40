//! Configuration for coordinators and transactions.
//!
//! Timeouts resolve from the most specific setting to the least:
//! [`TransactionOptions::timeout`], then the coordinator's default
//! (from [`CoordinatorBuilder::default_timeout`] or a [`CoordinatorConfig`]),
//! then the process-wide [`default_timeout`].

pub mod config;
pub mod coordinator;
pub mod error;
pub mod options;

pub use config::{default_timeout, set_default_timeout, CoordinatorConfig, DEFAULT_TIMEOUT_MS};
pub use coordinator::CoordinatorBuilder;
pub use error::BuildError;
pub use options::{TransactionOptions, UNNAMED_TRANSACTION};
