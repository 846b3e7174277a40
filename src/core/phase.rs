//! Transaction lifecycle phases and their timeline.
//!
//! A transaction starts `Pending` and moves exactly once to one of four
//! terminal phases. The timeline is immutable: `record` returns a new value.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Lifecycle phase of a transaction.
///
/// # Example
///
/// ```rust
/// use optimist::core::TransactionPhase;
///
/// assert!(!TransactionPhase::Pending.is_final());
/// assert!(TransactionPhase::Cancelled.is_final());
/// // cancellation is a normal teardown, not a failure
/// assert!(!TransactionPhase::Cancelled.is_error());
/// assert!(TransactionPhase::Timeout.is_error());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum TransactionPhase {
    Pending = 0,
    Committed = 1,
    Rejected = 2,
    Cancelled = 3,
    Timeout = 4,
}

impl TransactionPhase {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Committed => "COMMITTED",
            Self::Rejected => "REJECTED",
            Self::Cancelled => "CANCELLED",
            Self::Timeout => "TIMEOUT",
        }
    }

    /// Terminal phases have no outgoing transitions.
    pub fn is_final(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Phases whose awaiting caller sees an error.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Rejected | Self::Timeout)
    }

    /// Decode the `repr(u8)` discriminant. Unknown values read as `Pending`,
    /// which covers the coordinator's in-flight settling marker.
    pub(crate) fn from_repr(raw: u8) -> Self {
        match raw {
            1 => Self::Committed,
            2 => Self::Rejected,
            3 => Self::Cancelled,
            4 => Self::Timeout,
            _ => Self::Pending,
        }
    }
}

impl fmt::Display for TransactionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Record of the single terminal transition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhaseTransition {
    pub from: TransactionPhase,
    pub to: TransactionPhase,
    pub timestamp: DateTime<Utc>,
}

/// When a transaction started and how it ended.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhaseTimeline {
    started_at: DateTime<Utc>,
    settled: Option<PhaseTransition>,
}

impl PhaseTimeline {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            settled: None,
        }
    }

    /// Record the terminal transition, returning a new timeline.
    ///
    /// A timeline that already settled is returned unchanged: only the first
    /// terminal transition counts.
    pub fn record(&self, transition: PhaseTransition) -> Self {
        if self.settled.is_some() {
            return self.clone();
        }
        Self {
            started_at: self.started_at,
            settled: Some(transition),
        }
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn settled(&self) -> Option<&PhaseTransition> {
        self.settled.as_ref()
    }

    /// Current phase according to the timeline.
    pub fn phase(&self) -> TransactionPhase {
        self.settled
            .as_ref()
            .map_or(TransactionPhase::Pending, |t| t.to)
    }

    /// Time from start to settlement, `None` while pending.
    pub fn duration(&self) -> Option<Duration> {
        self.settled.as_ref().and_then(|t| {
            t.timestamp
                .signed_duration_since(self.started_at)
                .to_std()
                .ok()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settle(to: TransactionPhase, at: DateTime<Utc>) -> PhaseTransition {
        PhaseTransition {
            from: TransactionPhase::Pending,
            to,
            timestamp: at,
        }
    }

    #[test]
    fn only_pending_is_not_final() {
        assert!(!TransactionPhase::Pending.is_final());
        assert!(TransactionPhase::Committed.is_final());
        assert!(TransactionPhase::Rejected.is_final());
        assert!(TransactionPhase::Cancelled.is_final());
        assert!(TransactionPhase::Timeout.is_final());
    }

    #[test]
    fn repr_round_trips_and_unknown_reads_pending() {
        for phase in [
            TransactionPhase::Pending,
            TransactionPhase::Committed,
            TransactionPhase::Rejected,
            TransactionPhase::Cancelled,
            TransactionPhase::Timeout,
        ] {
            assert_eq!(TransactionPhase::from_repr(phase as u8), phase);
        }
        assert_eq!(TransactionPhase::from_repr(u8::MAX), TransactionPhase::Pending);
    }

    #[test]
    fn phase_serializes_as_upper_case_name() {
        let json = serde_json::to_string(&TransactionPhase::Cancelled).unwrap();
        assert_eq!(json, "\"CANCELLED\"");
        assert_eq!(TransactionPhase::Timeout.to_string(), "TIMEOUT");
    }

    #[test]
    fn new_timeline_is_pending() {
        let timeline = PhaseTimeline::new(Utc::now());
        assert_eq!(timeline.phase(), TransactionPhase::Pending);
        assert!(timeline.settled().is_none());
        assert!(timeline.duration().is_none());
    }

    #[test]
    fn record_is_immutable() {
        let timeline = PhaseTimeline::new(Utc::now());
        let settled = timeline.record(settle(TransactionPhase::Committed, Utc::now()));

        assert_eq!(timeline.phase(), TransactionPhase::Pending);
        assert_eq!(settled.phase(), TransactionPhase::Committed);
    }

    #[test]
    fn first_terminal_transition_wins() {
        let now = Utc::now();
        let timeline = PhaseTimeline::new(now)
            .record(settle(TransactionPhase::Committed, now))
            .record(settle(TransactionPhase::Cancelled, now));
        assert_eq!(timeline.phase(), TransactionPhase::Committed);
    }

    #[test]
    fn duration_spans_start_to_settlement() {
        let start = Utc::now();
        let end = start + chrono::Duration::milliseconds(25);
        let timeline = PhaseTimeline::new(start).record(settle(TransactionPhase::Timeout, end));
        assert_eq!(timeline.duration(), Some(Duration::from_millis(25)));
    }
}
