//! Transaction table and the root state that carries it.
//!
//! The table maps transaction ids to their isolated branches. It is kept
//! beside the application tree rather than inside it, and it serializes
//! under the reserved [`TRANSACTIONS_KEY`]. An empty table is always
//! represented as "no table at all", never as an empty mapping.

use crate::core::value::Value;
use serde::ser::{Error as _, SerializeMap};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Reserved state key under which open transactions are tracked.
pub const TRANSACTIONS_KEY: &str = "$$transactions";

/// Process-unique, strictly increasing transaction identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(u64);

impl TransactionId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One open transaction.
///
/// `before_state` is captured once at start and never changes. `working_state`
/// is created lazily by the first mutating action and is always replaced
/// wholesale.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: TransactionId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<TransactionId>,
    pub before_state: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_state: Option<Value>,
}

impl Transaction {
    /// The state this transaction currently sees: its working copy if it
    /// has one, its snapshot otherwise.
    pub fn effective_state(&self) -> &Value {
        self.working_state.as_ref().unwrap_or(&self.before_state)
    }
}

pub type TransactionTable = BTreeMap<TransactionId, Transaction>;

/// Application state tree plus the table of open transactions.
///
/// Updates never touch an existing `RootState`: every operation returns a new
/// value that shares unchanged parts with the old one, so snapshots handed
/// out to readers stay valid forever.
#[derive(Clone, Debug, Default)]
pub struct RootState {
    tree: Value,
    transactions: Option<Arc<TransactionTable>>,
}

impl RootState {
    pub fn new(tree: Value) -> Self {
        Self {
            tree,
            transactions: None,
        }
    }

    /// The application state tree, without the transaction table.
    pub fn tree(&self) -> &Value {
        &self.tree
    }

    /// Open transactions, or `None` when there are none.
    pub fn transactions(&self) -> Option<&TransactionTable> {
        self.transactions.as_deref()
    }

    pub fn transaction(&self, id: TransactionId) -> Option<&Transaction> {
        self.transactions().and_then(|table| table.get(&id))
    }

    pub fn contains(&self, id: TransactionId) -> bool {
        self.transaction(id).is_some()
    }

    /// True when both the tree and the table are the very same allocations.
    pub fn is_identical(&self, other: &RootState) -> bool {
        let same_table = match (&self.transactions, &other.transactions) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        };
        same_table && self.tree.is_identical(&other.tree)
    }

    /// Replace the tree, carrying the table over unchanged.
    pub(crate) fn with_tree(&self, tree: Value) -> Self {
        Self {
            tree,
            transactions: self.transactions.clone(),
        }
    }

    /// Copy-on-write update of the table.
    ///
    /// Drops the table entirely when the update leaves it empty.
    pub(crate) fn update_table(&self, update: impl FnOnce(&mut TransactionTable)) -> Self {
        let mut table = self.transactions.clone().unwrap_or_default();
        update(Arc::make_mut(&mut table));
        Self {
            tree: self.tree.clone(),
            transactions: (!table.is_empty()).then_some(table),
        }
    }
}

impl Serialize for RootState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let Some(table) = &self.transactions else {
            return self.tree.serialize(serializer);
        };
        let Some(entries) = self.tree.as_map() else {
            return Err(S::Error::custom(
                "state tree root must be a mapping to carry open transactions",
            ));
        };
        let mut map = serializer.serialize_map(Some(entries.len() + 1))?;
        for (key, value) in entries.iter().filter(|(key, _)| *key != TRANSACTIONS_KEY) {
            map.serialize_entry(key, value)?;
        }
        map.serialize_entry(TRANSACTIONS_KEY, &**table)?;
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(id: u64) -> Transaction {
        Transaction {
            id: TransactionId::new(id),
            name: "t".to_string(),
            parent_id: None,
            before_state: Value::map(),
            working_state: None,
        }
    }

    #[test]
    fn update_table_is_copy_on_write() {
        let empty = RootState::new(Value::map());
        let one = empty.update_table(|t| {
            t.insert(TransactionId::new(1), entry(1));
        });
        let two = one.update_table(|t| {
            t.insert(TransactionId::new(2), entry(2));
        });

        assert!(empty.transactions().is_none());
        assert_eq!(one.transactions().map(BTreeMap::len), Some(1));
        assert_eq!(two.transactions().map(BTreeMap::len), Some(2));
        assert!(two.tree().is_identical(empty.tree()));
    }

    #[test]
    fn emptied_table_is_removed() {
        let state = RootState::new(Value::map()).update_table(|t| {
            t.insert(TransactionId::new(1), entry(1));
        });
        let state = state.update_table(|t| {
            t.remove(&TransactionId::new(1));
        });
        assert!(state.transactions().is_none());
    }

    #[test]
    fn effective_state_prefers_working_copy() {
        let mut tx = entry(1);
        assert!(tx.effective_state().is_identical(&tx.before_state));
        tx.working_state = Some(Value::from(json!({"a": 1})));
        assert_eq!(tx.effective_state().get("a"), Some(&Value::from(1)));
    }

    #[test]
    fn serializes_table_under_reserved_key() {
        let state = RootState::new(Value::from(json!({"counter": 1})));
        assert_eq!(serde_json::to_value(&state).unwrap(), json!({"counter": 1}));

        let state = state.update_table(|t| {
            t.insert(TransactionId::new(7), entry(7));
        });
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["counter"], json!(1));
        assert_eq!(json[TRANSACTIONS_KEY]["7"]["name"], json!("t"));
        assert_eq!(json[TRANSACTIONS_KEY]["7"]["beforeState"], json!({}));
    }

    #[test]
    fn identical_requires_same_table_allocation() {
        let state = RootState::new(Value::map());
        assert!(state.is_identical(&state.clone()));
        let other = state.update_table(|_| {});
        assert!(other.is_identical(&state));
        let opened = state.update_table(|t| {
            t.insert(TransactionId::new(1), entry(1));
        });
        assert!(!opened.is_identical(&state));
    }
}
