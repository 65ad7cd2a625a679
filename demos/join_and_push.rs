//! # Example: join_and_push
//!
//! A parent import job fans out three chapter tasks, waits for all of them through a
//! join barrier, then pushes a summary to the user who started it.
//!
//! Demonstrates how to:
//! - Build an [`EventRouter`] with the [`LogWriter`] subscriber.
//! - Record task state in an [`InMemoryTaskLookup`] and publish lifecycle events.
//! - Wait on [`BarrierRegistry::wait_for_children`](taskrelay::BarrierRegistry::wait_for_children).
//! - Push to a user's channel, take it over on reconnect, and force a logout.
//!
//! ## Flow
//! ```text
//! user-7 ──► channels().open()        (connection #1)
//! import ──► wait_for_children({ch-1, ch-2, ch-3}, 5s)
//!   ├─► ch-1 finished before the wait  ─► resolved by store pre-check
//!   ├─► ch-2 completes at 150ms        ─► resolved by event
//!   └─► ch-3 fails at 300ms            ─► resolved by event
//! import ──► publish(user-7, summary)
//! user-7 ──► channels().open()        (connection #2 replaces #1)
//! admin  ──► force_logout(user-7)
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example join_and_push --features logging
//! ```

use std::{sync::Arc, time::Duration};

use serde_json::json;
use taskrelay::{
    Config, EventRouter, InMemoryTaskLookup, LogWriter, PushEvent, PushReceiver, Subscribe,
    TaskLifecycleEvent,
};
use tracing_subscriber::EnvFilter;

fn finish(store: &InMemoryTaskLookup, router: &EventRouter, ev: TaskLifecycleEvent) {
    store.apply(&ev);
    router.publish_lifecycle(ev);
}

fn drain(label: &str, mut rx: PushReceiver) -> tokio::task::JoinHandle<()> {
    let label = label.to_string();
    tokio::spawn(async move {
        while let Some(ev) = rx.recv().await {
            println!("[{label}] {}: {}", ev.kind.as_str(), ev.data);
        }
        println!("[{label}] stream closed");
    })
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let store = Arc::new(InMemoryTaskLookup::new());
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let router = EventRouter::builder(Config::default(), store.clone())
        .with_subscribers(subs)
        .build();
    let listener = router.spawn_listener();

    let first = drain("conn-1", router.channels().open("user-7"));

    // ch-1 is already done when the parent starts waiting.
    store.apply(&TaskLifecycleEvent::completed("ch-1").with_parent("import").with_result(json!({"pages": 12})));

    {
        let router = Arc::clone(&router);
        let store = Arc::clone(&store);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(150)).await;
            finish(
                &store,
                &router,
                TaskLifecycleEvent::completed("ch-2").with_parent("import").with_result(json!({"pages": 9})),
            );
            tokio::time::sleep(Duration::from_millis(150)).await;
            finish(
                &store,
                &router,
                TaskLifecycleEvent::failed("ch-3").with_parent("import").with_error(json!("source unreachable")),
            );
        });
    }

    let results = router
        .barriers()
        .wait_for_children("import", ["ch-1", "ch-2", "ch-3"], Duration::from_secs(5))
        .await?;
    let failed: Vec<&str> = results.iter().filter(|r| !r.is_success()).map(|r| &*r.task_id).collect();
    println!("[import] {} children resolved, failed: {failed:?}", results.len());

    router
        .channels()
        .publish("user-7", PushEvent::message(json!({"job": "import", "failed": failed})));

    // Reconnect: the first stream is completed, the second one takes over.
    let second = drain("conn-2", router.channels().open("user-7"));
    router.channels().publish("user-7", PushEvent::message(json!({"hello": "again"})));
    router.channels().force_logout("user-7", "session revoked");

    first.await?;
    second.await?;

    router.shutdown("demo finished").await;
    listener.await?;
    Ok(())
}
