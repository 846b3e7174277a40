//! Timeout configuration, process-wide and per coordinator.

use crate::builder::error::BuildError;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Timeout applied when neither the transaction nor its coordinator names one.
pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;

static DEFAULT_TIMEOUT: AtomicU64 = AtomicU64::new(DEFAULT_TIMEOUT_MS);

/// Set the process-wide default timeout. Zero disables the timer.
///
/// Affects transactions begun after the call.
pub fn set_default_timeout(timeout: Duration) {
    let millis = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
    DEFAULT_TIMEOUT.store(millis, Ordering::Relaxed);
}

/// The process-wide default timeout.
pub fn default_timeout() -> Duration {
    Duration::from_millis(DEFAULT_TIMEOUT.load(Ordering::Relaxed))
}

/// Serializable coordinator settings.
///
/// # Example
///
/// ```rust
/// use optimist::builder::CoordinatorConfig;
/// use std::time::Duration;
///
/// let config = CoordinatorConfig::from_json(r#"{"default_timeout_ms": 250}"#).unwrap();
/// assert_eq!(config.default_timeout(), Some(Duration::from_millis(250)));
///
/// let config = CoordinatorConfig::from_json("{}").unwrap();
/// assert_eq!(config.default_timeout(), None);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CoordinatorConfig {
    /// Overrides the process-wide default when set. Zero disables the timer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_timeout_ms: Option<u64>,
}

impl CoordinatorConfig {
    pub fn from_json(json: &str) -> Result<Self, BuildError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_default_can_be_changed_and_restored() {
        set_default_timeout(Duration::from_millis(10));
        assert_eq!(default_timeout(), Duration::from_millis(10));

        set_default_timeout(Duration::ZERO);
        assert!(default_timeout().is_zero());

        set_default_timeout(Duration::from_millis(DEFAULT_TIMEOUT_MS));
        assert_eq!(default_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn rejects_unknown_fields() {
        let err = CoordinatorConfig::from_json(r#"{"timeout": 5}"#).unwrap_err();
        assert!(matches!(err, BuildError::InvalidConfig(_)));
    }

    #[test]
    fn omits_unset_timeout_when_serialized() {
        let json = serde_json::to_string(&CoordinatorConfig::default()).unwrap();
        assert_eq!(json, "{}");
    }
}
