//! Search Transaction
//!
//! This example runs a search as an optimistic transaction and shows how a
//! newer search cancels one that is still waiting on the backend.
//!
//! Key concepts:
//! - The query is visible inside the transaction before the results arrive
//! - Nothing reaches the shared state until the transaction commits
//! - Cancelling a pending search discards everything it dispatched
//!
//! Run with: cargo run --example search_transaction

use optimist::core::{AppAction, MergeError, TransactionPhase, Value};
use optimist::effects::{Coordinator, Dispatch, Store, TransactionHandle};
use std::sync::Arc;
use std::time::Duration;
use tokio::time;
use tracing_subscriber::EnvFilter;

type SearchStore = Store<fn(&Value, &AppAction) -> Value>;

const SEARCH_EXECUTED: &str = "SearchExecuted";
const SEARCH_SUCCESS: &str = "SearchSuccess";

fn search_reducer(state: &Value, action: &AppAction) -> Value {
    let payload = action.payload.clone().unwrap_or_default();
    match action.kind.as_str() {
        SEARCH_EXECUTED => {
            let query = payload.get("query").cloned().unwrap_or_default();
            state.with("search", Value::from_entries([("query", query)]))
        }
        SEARCH_SUCCESS => {
            let search = state.get("search").cloned().unwrap_or_else(Value::map);
            let results = payload.get("results").cloned().unwrap_or_default();
            state.with("search", search.with("results", results))
        }
        _ => state.clone(),
    }
}

// Simulated backend
async fn search_service(query: String) -> Vec<String> {
    time::sleep(Duration::from_millis(100)).await;
    vec![format!("{query} (first hit)"), format!("{query} (second hit)")]
}

fn execute_search(
    coordinator: &Coordinator,
    store: &Arc<SearchStore>,
    previous: Option<&TransactionHandle<MergeError>>,
    query: &str,
) -> TransactionHandle<MergeError> {
    if let Some(previous) = previous {
        if previous.phase() == TransactionPhase::Pending && previous.cancel() {
            println!("  Cancelled search #{}", previous.id());
        }
    }

    let store = store.clone();
    let query = query.to_string();
    coordinator.begin("searchTransaction", move || async move {
        store.dispatch(
            AppAction::new(SEARCH_EXECUTED)
                .with_payload(Value::from_entries([("query", query.as_str())]))
                .into(),
        )?;
        let results: Vec<Value> = search_service(query)
            .await
            .into_iter()
            .map(Value::from)
            .collect();
        store.dispatch(
            AppAction::new(SEARCH_SUCCESS)
                .with_payload(Value::from_entries([("results", results)]))
                .into(),
        )?;
        Ok::<_, MergeError>(())
    })
}

fn show(store: &SearchStore) {
    let json = serde_json::to_string_pretty(&store.state()).unwrap_or_default();
    println!("  State: {json}");
}

#[tokio::main]
async fn main() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();

    println!("=== Search Transaction Example ===\n");

    let store = Arc::new(Store::new(
        search_reducer as fn(&Value, &AppAction) -> Value,
        Value::map(),
    ));
    let coordinator = Coordinator::builder()
        .dispatcher(store.clone())
        .default_timeout(Duration::from_secs(5))
        .build()
        .unwrap();

    println!("Searching for \"rust\"...");
    let search = execute_search(&coordinator, &store, None, "rust");
    time::sleep(Duration::from_millis(10)).await;
    println!("  While pending, the query lives only in the transaction:");
    show(&store);

    match search.await {
        Ok(()) => println!("  Search committed"),
        Err(e) => println!("  Search failed: {e}"),
    }
    show(&store);

    println!("\nTyping quickly: \"tok\" then \"tokio\"...");
    let first = execute_search(&coordinator, &store, None, "tok");
    let second = execute_search(&coordinator, &store, Some(&first), "tokio");
    println!("  First search: {}", first.phase());

    let _ = first.await;
    match second.await {
        Ok(()) => println!("  Second search committed"),
        Err(e) => println!("  Second search failed: {e}"),
    }
    show(&store);

    println!("\n=== Example Complete ===");
}
