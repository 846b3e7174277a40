//! Three-way optimistic merge of state trees.
//!
//! `merge(base, before, after)` reconciles a transaction's changes
//! (`before` -> `after`) with whatever happened to the shared state in the
//! meantime (`before` -> `base`). Keys are compared by identity only:
//!
//! - untouched by the transaction: keep `base`, so external changes survive
//! - untouched externally: keep `after`, so the transaction's change wins
//! - touched on both sides: recurse when all three are mappings, otherwise
//!   it is a write/write conflict
//!
//! Sequences are opaque leaves; a sequence replaced on both sides is always
//! a conflict. The reserved transactions key is never merged.

use crate::core::table::TRANSACTIONS_KEY;
use crate::core::value::{Map, Value};
use std::collections::BTreeSet;
use thiserror::Error;

/// Reasons a commit merge cannot be completed.
///
/// Either error aborts the whole merge; no partial result is ever produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MergeError {
    /// The three inputs are not all mappings at `path`.
    #[error("transaction commit failed: state at '{path}' must be a mapping on every side")]
    Structural { path: String },

    /// `path` changed outside the transaction while the transaction changed it too.
    #[error("race detected: property '{path}' was updated during the transaction and the transaction tried to commit a new value to it")]
    Conflict { path: String },
}

impl MergeError {
    /// Dotted path of the offending key.
    pub fn path(&self) -> &str {
        match self {
            MergeError::Structural { path } | MergeError::Conflict { path } => path,
        }
    }
}

/// Merge a transaction's `after` state into `base`, using `before` as the
/// common ancestor.
///
/// # Example
///
/// ```rust
/// use optimist::core::{merge, MergeError, Value};
/// use serde_json::json;
///
/// let before = Value::from(json!({"a": {"b": 1}, "c": 1}));
/// let base = before.with("c", 2);                 // external change
/// let inner = before.get("a").unwrap().with("b", 2);
/// let after = before.with("a", inner);            // transactional change
///
/// let merged = merge(&base, &before, &after).unwrap();
/// assert_eq!(merged, Value::from(json!({"a": {"b": 2}, "c": 2})));
///
/// let conflict = merge(&base, &before, &before.with("c", 3)).unwrap_err();
/// assert_eq!(conflict, MergeError::Conflict { path: "c".to_string() });
/// ```
pub fn merge(base: &Value, before: &Value, after: &Value) -> Result<Value, MergeError> {
    merge_at(base, before, after, &mut Vec::new())
}

fn merge_at<'a>(
    base: &'a Value,
    before: &'a Value,
    after: &'a Value,
    path: &mut Vec<&'a str>,
) -> Result<Value, MergeError> {
    let (Some(base), Some(before), Some(after)) = (base.as_map(), before.as_map(), after.as_map())
    else {
        return Err(MergeError::Structural {
            path: render(path),
        });
    };

    let keys: BTreeSet<&str> = after
        .keys()
        .chain(before.keys())
        .chain(base.keys())
        .map(String::as_str)
        .filter(|key| *key != TRANSACTIONS_KEY)
        .collect();

    let mut merged = Map::new();
    for key in keys {
        let theirs = base.get(key);
        let ancestor = before.get(key);
        let ours = after.get(key);

        let chosen = if identical(ours, ancestor) {
            theirs.cloned()
        } else if identical(ancestor, theirs) {
            ours.cloned()
        } else {
            match (theirs, ancestor, ours) {
                (Some(theirs), Some(ancestor), Some(ours))
                    if theirs.is_map() && ancestor.is_map() && ours.is_map() =>
                {
                    path.push(key);
                    let nested = merge_at(theirs, ancestor, ours, path)?;
                    path.pop();
                    Some(nested)
                }
                _ => {
                    path.push(key);
                    return Err(MergeError::Conflict {
                        path: render(path),
                    });
                }
            }
        };

        if let Some(value) = chosen {
            merged.insert(key.to_string(), value);
        }
    }
    Ok(Value::from(merged))
}

fn identical(a: Option<&Value>, b: Option<&Value>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.is_identical(b),
        (None, None) => true,
        _ => false,
    }
}

fn render(path: &[&str]) -> String {
    if path.is_empty() {
        "<root>".to_string()
    } else {
        path.join(".")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tree(json: serde_json::Value) -> Value {
        Value::from(json)
    }

    #[test]
    fn applies_new_value() {
        let merged = merge(&Value::map(), &Value::map(), &tree(json!({"a": 1}))).unwrap();
        assert_eq!(merged.get("a"), Some(&Value::from(1)));
    }

    #[test]
    fn applies_new_value_on_nested_mapping() {
        let merged = merge(
            &tree(json!({"a": {}})),
            &tree(json!({"a": {}})),
            &tree(json!({"a": {"a": 1}})),
        )
        .unwrap();
        assert_eq!(merged.get_path("a.a"), Some(&Value::from(1)));
    }

    #[test]
    fn preserves_external_value() {
        let merged = merge(&tree(json!({"b": 2})), &Value::map(), &tree(json!({"a": 1}))).unwrap();
        assert_eq!(merged, tree(json!({"a": 1, "b": 2})));
    }

    #[test]
    fn rejects_non_mapping_inputs() {
        let seq = tree(json!([]));
        let err = merge(&seq, &seq, &seq).unwrap_err();
        assert!(matches!(err, MergeError::Structural { .. }));
        assert!(err.to_string().contains("transaction commit failed"));

        let err = merge(&Value::from(2), &Value::from(3), &Value::from(4)).unwrap_err();
        assert_eq!(err.path(), "<root>");
    }

    #[test]
    fn skips_reserved_key() {
        let base = Value::map().with(TRANSACTIONS_KEY, Value::map());
        let merged = merge(&base, &Value::map(), &Value::map()).unwrap();
        assert!(merged.get(TRANSACTIONS_KEY).is_none());
    }

    #[test]
    fn removes_key_deleted_outside_transaction() {
        let before = tree(json!({"a": 1}));
        let merged = merge(&Value::map(), &before, &before.clone()).unwrap();
        assert!(merged.get("a").is_none());
    }

    #[test]
    fn removes_key_deleted_in_transaction() {
        let base = tree(json!({"a": 1}));
        let merged = merge(&base, &base.clone(), &Value::map()).unwrap();
        assert!(merged.get("a").is_none());
    }

    #[test]
    fn detects_write_write_conflicts() {
        let cases = [
            (json!({"a": 1}), json!({"a": 2}), json!({"a": 3})),
            (json!({}), json!({"a": 2}), json!({"a": 3})),
            (json!({"a": 3}), json!({"a": 2}), json!({})),
            (json!({"a": 3}), json!({}), json!({"a": 2})),
        ];
        for (base, before, after) in cases {
            let err = merge(&tree(base), &tree(before), &tree(after)).unwrap_err();
            assert_eq!(err, MergeError::Conflict { path: "a".to_string() });
            assert!(err.to_string().contains("race detected"));
        }
    }

    #[test]
    fn conflict_names_full_dotted_path() {
        let before = tree(json!({"search": {"query": "a"}}));
        let base = tree(json!({"search": {"query": "b"}}));
        let after = tree(json!({"search": {"query": "c"}}));
        let err = merge(&base, &before, &after).unwrap_err();
        assert_eq!(err.path(), "search.query");
    }

    #[test]
    fn replaced_sequence_on_both_sides_conflicts() {
        let err = merge(
            &tree(json!({"a": []})),
            &tree(json!({"a": []})),
            &tree(json!({"a": []})),
        )
        .unwrap_err();
        assert_eq!(err, MergeError::Conflict { path: "a".to_string() });
    }

    #[test]
    fn keeps_sequence_when_identity_unchanged_externally() {
        let shared = tree(json!([]));
        let replacement = tree(json!([]));
        let merged = merge(
            &Value::map().with("a", shared.clone()),
            &Value::map().with("a", shared),
            &Value::map().with("a", replacement.clone()),
        )
        .unwrap();
        assert!(merged.get("a").unwrap().is_identical(&replacement));
    }

    #[test]
    fn identity_law() {
        let x = tree(json!({"a": {"b": [1, 2]}, "c": "d"}));
        assert_eq!(merge(&x, &x, &x).unwrap(), x);
    }

    #[test]
    fn identity_law_holds_for_nan_leaves() {
        let x = Value::map().with("f", f64::NAN).with("g", Value::map().with("h", f64::NAN));
        let merged = merge(&x, &x, &x).unwrap();
        assert_eq!(merged, x);
    }

    #[test]
    fn nested_merge_law() {
        let merged = merge(
            &tree(json!({"a": {"b": 1}})),
            &tree(json!({"a": {"b": 1}})),
            &tree(json!({"a": {"b": 2}})),
        )
        .unwrap();
        assert_eq!(merged.get_path("a.b"), Some(&Value::from(2)));
    }
}
