//! Actions flowing through the dispatch boundary.
//!
//! The five transaction lifecycle actions form a closed set; application
//! actions are open and opaque, carried as [`AppAction`]. On the wire every
//! action has the shape `{type, payload?, meta?}`:
//!
//! | type | payload | meta |
//! |---|---|---|
//! | `StartTransaction` | `{transactionName}` | `{transactionId, parentTransactionId?}` |
//! | `CommitTransaction` | none | `{transactionId}` |
//! | `RejectTransaction` | `{reason}` | `{transactionId}` |
//! | `CancelTransaction` | none | `{transactionId}` |
//! | `TimeoutTransaction` | none | `{transactionId}` |

use crate::core::table::TransactionId;
use crate::core::value::Value;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const START_TRANSACTION: &str = "StartTransaction";
pub const COMMIT_TRANSACTION: &str = "CommitTransaction";
pub const REJECT_TRANSACTION: &str = "RejectTransaction";
pub const CANCEL_TRANSACTION: &str = "CancelTransaction";
pub const TIMEOUT_TRANSACTION: &str = "TimeoutTransaction";

/// Errors decoding an action from its wire form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionDecodeError {
    #[error("{kind} requires meta.transactionId")]
    MissingTransactionId { kind: String },

    #[error("{kind} requires payload.{field}")]
    MissingPayloadField { kind: String, field: &'static str },
}

/// Application-defined action, opaque to the transaction machinery.
#[derive(Clone, Debug, PartialEq)]
pub struct AppAction {
    pub kind: String,
    pub payload: Option<Value>,
    pub transaction_id: Option<TransactionId>,
    /// Carried through the wire form untouched; routing ignores it.
    pub parent_transaction_id: Option<TransactionId>,
}

impl AppAction {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            payload: None,
            transaction_id: None,
            parent_transaction_id: None,
        }
    }

    pub fn with_payload(mut self, payload: impl Into<Value>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    /// Explicitly target a transaction, bypassing the ambient context.
    pub fn in_transaction(mut self, id: TransactionId) -> Self {
        self.transaction_id = Some(id);
        self
    }
}

/// Every action the store understands.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(into = "RawAction", try_from = "RawAction")]
pub enum Action {
    StartTransaction {
        id: TransactionId,
        parent_id: Option<TransactionId>,
        name: String,
    },
    CommitTransaction {
        id: TransactionId,
    },
    RejectTransaction {
        id: TransactionId,
        reason: String,
    },
    CancelTransaction {
        id: TransactionId,
    },
    TimeoutTransaction {
        id: TransactionId,
    },
    App(AppAction),
}

impl Action {
    /// Shorthand for an application action with no payload.
    pub fn app(kind: impl Into<String>) -> Self {
        Action::App(AppAction::new(kind))
    }

    /// The wire `type` tag.
    pub fn kind(&self) -> &str {
        match self {
            Action::StartTransaction { .. } => START_TRANSACTION,
            Action::CommitTransaction { .. } => COMMIT_TRANSACTION,
            Action::RejectTransaction { .. } => REJECT_TRANSACTION,
            Action::CancelTransaction { .. } => CANCEL_TRANSACTION,
            Action::TimeoutTransaction { .. } => TIMEOUT_TRANSACTION,
            Action::App(app) => &app.kind,
        }
    }

    /// The transaction this action targets, if any.
    pub fn transaction_id(&self) -> Option<TransactionId> {
        match self {
            Action::StartTransaction { id, .. }
            | Action::CommitTransaction { id }
            | Action::RejectTransaction { id, .. }
            | Action::CancelTransaction { id }
            | Action::TimeoutTransaction { id } => Some(*id),
            Action::App(app) => app.transaction_id,
        }
    }

    pub fn is_start(&self) -> bool {
        matches!(self, Action::StartTransaction { .. })
    }

    /// True for the four actions that end a transaction.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Action::CommitTransaction { .. }
                | Action::RejectTransaction { .. }
                | Action::CancelTransaction { .. }
                | Action::TimeoutTransaction { .. }
        )
    }
}

impl From<AppAction> for Action {
    fn from(app: AppAction) -> Self {
        Action::App(app)
    }
}

#[derive(Serialize, Deserialize)]
struct RawAction {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    payload: Option<Value>,
    #[serde(default, skip_serializing_if = "RawMeta::is_empty")]
    meta: RawMeta,
}

#[derive(Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    transaction_id: Option<TransactionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parent_transaction_id: Option<TransactionId>,
}

impl RawMeta {
    fn is_empty(&self) -> bool {
        self.transaction_id.is_none() && self.parent_transaction_id.is_none()
    }

    fn of(id: TransactionId) -> Self {
        Self {
            transaction_id: Some(id),
            parent_transaction_id: None,
        }
    }
}

impl From<Action> for RawAction {
    fn from(action: Action) -> Self {
        let kind = action.kind().to_string();
        match action {
            Action::StartTransaction {
                id,
                parent_id,
                name,
            } => RawAction {
                kind,
                payload: Some(Value::from_entries([("transactionName", name)])),
                meta: RawMeta {
                    transaction_id: Some(id),
                    parent_transaction_id: parent_id,
                },
            },
            Action::RejectTransaction { id, reason } => RawAction {
                kind,
                payload: Some(Value::from_entries([("reason", reason)])),
                meta: RawMeta::of(id),
            },
            Action::CommitTransaction { id }
            | Action::CancelTransaction { id }
            | Action::TimeoutTransaction { id } => RawAction {
                kind,
                payload: None,
                meta: RawMeta::of(id),
            },
            Action::App(app) => RawAction {
                kind,
                payload: app.payload,
                meta: RawMeta {
                    transaction_id: app.transaction_id,
                    parent_transaction_id: app.parent_transaction_id,
                },
            },
        }
    }
}

impl TryFrom<RawAction> for Action {
    type Error = ActionDecodeError;

    fn try_from(raw: RawAction) -> Result<Self, Self::Error> {
        let lifecycle_id = || {
            raw.meta
                .transaction_id
                .ok_or_else(|| ActionDecodeError::MissingTransactionId {
                    kind: raw.kind.clone(),
                })
        };
        let payload_field = |field: &'static str| {
            raw.payload
                .as_ref()
                .and_then(|payload| payload.get(field))
                .ok_or_else(|| ActionDecodeError::MissingPayloadField {
                    kind: raw.kind.clone(),
                    field,
                })
        };

        let action = match raw.kind.as_str() {
            START_TRANSACTION => Action::StartTransaction {
                id: lifecycle_id()?,
                parent_id: raw.meta.parent_transaction_id,
                name: describe(payload_field("transactionName")?),
            },
            COMMIT_TRANSACTION => Action::CommitTransaction { id: lifecycle_id()? },
            REJECT_TRANSACTION => Action::RejectTransaction {
                id: lifecycle_id()?,
                reason: describe(payload_field("reason")?),
            },
            CANCEL_TRANSACTION => Action::CancelTransaction { id: lifecycle_id()? },
            TIMEOUT_TRANSACTION => Action::TimeoutTransaction { id: lifecycle_id()? },
            _ => Action::App(AppAction {
                kind: raw.kind.clone(),
                payload: raw.payload.clone(),
                transaction_id: raw.meta.transaction_id,
                parent_transaction_id: raw.meta.parent_transaction_id,
            }),
        };
        Ok(action)
    }
}

/// Strings are taken as-is; anything else is rendered as JSON text.
fn describe(value: &Value) -> String {
    match value.as_str() {
        Some(s) => s.to_string(),
        None => serde_json::Value::from(value).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn start_action_wire_form() {
        let action = Action::StartTransaction {
            id: TransactionId::new(3),
            parent_id: Some(TransactionId::new(1)),
            name: "name".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&action).unwrap(),
            json!({
                "type": "StartTransaction",
                "payload": {"transactionName": "name"},
                "meta": {"transactionId": 3, "parentTransactionId": 1}
            })
        );
    }

    #[test]
    fn terminal_actions_wire_form() {
        let id = TransactionId::new(5);
        assert_eq!(
            serde_json::to_value(Action::CommitTransaction { id }).unwrap(),
            json!({"type": "CommitTransaction", "meta": {"transactionId": 5}})
        );
        assert_eq!(
            serde_json::to_value(Action::RejectTransaction {
                id,
                reason: "reason".to_string()
            })
            .unwrap(),
            json!({
                "type": "RejectTransaction",
                "payload": {"reason": "reason"},
                "meta": {"transactionId": 5}
            })
        );
        assert_eq!(
            serde_json::to_value(Action::CancelTransaction { id }).unwrap(),
            json!({"type": "CancelTransaction", "meta": {"transactionId": 5}})
        );
        assert_eq!(
            serde_json::to_value(Action::TimeoutTransaction { id }).unwrap(),
            json!({"type": "TimeoutTransaction", "meta": {"transactionId": 5}})
        );
    }

    #[test]
    fn app_action_without_meta_omits_it() {
        let action = Action::from(AppAction::new("increment").with_payload(2));
        assert_eq!(
            serde_json::to_value(&action).unwrap(),
            json!({"type": "increment", "payload": 2})
        );
    }

    #[test]
    fn decodes_app_action_with_transaction() {
        let action: Action = serde_json::from_value(json!({
            "type": "SearchExecuted",
            "payload": {"query": "aa"},
            "meta": {"transactionId": 4}
        }))
        .unwrap();
        assert_eq!(action.kind(), "SearchExecuted");
        assert_eq!(action.transaction_id(), Some(TransactionId::new(4)));
        assert!(!action.is_start());
    }

    #[test]
    fn app_action_keeps_parent_transaction_id() {
        let wire = json!({
            "type": "SearchExecuted",
            "meta": {"transactionId": 4, "parentTransactionId": 2}
        });
        let action: Action = serde_json::from_value(wire.clone()).unwrap();
        match &action {
            Action::App(app) => {
                assert_eq!(app.parent_transaction_id, Some(TransactionId::new(2)));
            }
            other => panic!("expected an application action, got {other:?}"),
        }
        assert_eq!(serde_json::to_value(&action).unwrap(), wire);
    }

    #[test]
    fn decodes_lifecycle_actions() {
        let action: Action = serde_json::from_value(json!({
            "type": "RejectTransaction",
            "payload": {"reason": {"code": 7}},
            "meta": {"transactionId": 9}
        }))
        .unwrap();
        assert_eq!(
            action,
            Action::RejectTransaction {
                id: TransactionId::new(9),
                reason: r#"{"code":7}"#.to_string()
            }
        );
        assert!(action.is_terminal());
    }

    #[test]
    fn lifecycle_action_without_id_is_rejected() {
        let err = serde_json::from_value::<Action>(json!({"type": "CommitTransaction"}))
            .unwrap_err();
        assert!(err.to_string().contains("requires meta.transactionId"));

        let err = serde_json::from_value::<Action>(json!({
            "type": "StartTransaction",
            "meta": {"transactionId": 1}
        }))
        .unwrap_err();
        assert!(err.to_string().contains("payload.transactionName"));
    }
}
