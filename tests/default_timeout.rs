//! The process-wide default timeout.
//!
//! Kept in its own test binary because it changes global configuration.

use optimist::builder::{default_timeout, set_default_timeout, TransactionOptions};
use optimist::core::{AppAction, TransactionPhase, Value};
use optimist::effects::{Coordinator, Store};
use std::sync::Arc;
use std::time::Duration;
use tokio::time;

fn coordinator() -> Coordinator {
    let store = Arc::new(Store::new(
        |state: &Value, _: &AppAction| state.clone(),
        Value::map(),
    ));
    Coordinator::new(store)
}

#[tokio::test(start_paused = true)]
async fn process_default_applies_unless_overridden() {
    assert_eq!(default_timeout(), Duration::from_secs(60));
    set_default_timeout(Duration::from_millis(10));
    let coordinator = coordinator();

    let mut timed = coordinator.begin("global", || async {
        time::sleep(Duration::from_millis(20)).await;
        Ok::<_, std::fmt::Error>(())
    });
    assert!((&mut timed).await.unwrap_err().is_timeout());
    assert_eq!(timed.phase(), TransactionPhase::Timeout);

    let mut untimed = coordinator.begin(
        TransactionOptions::new()
            .name("disabled")
            .timeout(Duration::ZERO),
        || async {
            time::sleep(Duration::from_millis(20)).await;
            Ok::<_, std::fmt::Error>(())
        },
    );
    (&mut untimed).await.unwrap();
    assert_eq!(untimed.phase(), TransactionPhase::Committed);

    let overridden = Coordinator::builder()
        .dispatcher(coordinator.dispatcher().clone())
        .default_timeout(Duration::from_millis(50))
        .build()
        .unwrap();
    overridden
        .begin("coordinator default", || async {
            time::sleep(Duration::from_millis(20)).await;
            Ok::<_, std::fmt::Error>(())
        })
        .await
        .unwrap();
}
