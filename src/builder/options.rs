//! Per-transaction options.

use std::time::Duration;

/// Name given to transactions that are not named explicitly.
pub const UNNAMED_TRANSACTION: &str = "unnamed";

/// Name and timeout for one transaction.
///
/// A bare string converts into options carrying just that name.
///
/// # Example
///
/// ```rust
/// use optimist::builder::TransactionOptions;
/// use std::time::Duration;
///
/// let options = TransactionOptions::new()
///     .name("search")
///     .timeout(Duration::from_millis(500));
/// assert_eq!(options.get_name(), "search");
///
/// let options: TransactionOptions = "search".into();
/// assert_eq!(options.get_timeout(), None);
/// assert_eq!(TransactionOptions::new().get_name(), "unnamed");
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionOptions {
    pub(crate) name: String,
    pub(crate) timeout: Option<Duration>,
}

impl TransactionOptions {
    pub fn new() -> Self {
        Self {
            name: UNNAMED_TRANSACTION.to_string(),
            timeout: None,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Timeout for this transaction only. Zero disables the timer.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn get_name(&self) -> &str {
        &self.name
    }

    pub fn get_timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

impl Default for TransactionOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for TransactionOptions {
    fn from(name: &str) -> Self {
        Self::new().name(name)
    }
}

impl From<String> for TransactionOptions {
    fn from(name: String) -> Self {
        Self::new().name(name)
    }
}
