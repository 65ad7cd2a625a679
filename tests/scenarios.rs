//! End-to-end behavior through the public API: a router fed by lifecycle events,
//! parents waiting on children, and users holding push connections.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use taskrelay::{
    Config, EventRouter, InMemoryTaskLookup, PushChannel, PushEvent, TaskLifecycleEvent, TaskOutcome,
    WaitError,
};
use tokio::time::{Instant, sleep};

fn router_with_store() -> (Arc<EventRouter>, Arc<InMemoryTaskLookup>) {
    let store = Arc::new(InMemoryTaskLookup::new());
    let router = EventRouter::builder(Config::default(), store.clone()).build();
    router.spawn_listener();
    (router, store)
}

async fn until_waiting(router: &EventRouter, parent: &str) {
    while !router.barriers().is_waiting(parent) {
        tokio::task::yield_now().await;
    }
}

fn emit_after(router: &Arc<EventRouter>, delay: Duration, ev: TaskLifecycleEvent) {
    let router = Arc::clone(router);
    tokio::spawn(async move {
        sleep(delay).await;
        router.publish_lifecycle(ev);
    });
}

#[tokio::test(start_paused = true)]
async fn parent_resolves_when_last_child_reports() {
    let (router, _store) = router_with_store();
    let start = Instant::now();

    let waiter = {
        let router = Arc::clone(&router);
        tokio::spawn(async move {
            router
                .barriers()
                .wait_for_children("P1", ["A", "B"], Duration::from_secs(2))
                .await
        })
    };
    until_waiting(&router, "P1").await;

    emit_after(
        &router,
        Duration::from_millis(100),
        TaskLifecycleEvent::completed("A").with_parent("P1").with_result(json!(1)),
    );
    emit_after(
        &router,
        Duration::from_millis(300),
        TaskLifecycleEvent::failed("B").with_parent("P1").with_error(json!("boom")),
    );

    let results = waiter.await.unwrap().unwrap();
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(300), "resolved early: {elapsed:?}");
    assert!(elapsed < Duration::from_millis(400), "resolved late: {elapsed:?}");

    let ids: Vec<&str> = results.iter().map(|r| &*r.task_id).collect();
    assert_eq!(ids, vec!["A", "B"]);
    assert_eq!(results[0].outcome, TaskOutcome::Completed);
    assert_eq!(results[0].result, Some(json!(1)));
    assert_eq!(results[1].outcome, TaskOutcome::Failed);
    assert_eq!(results[1].error, Some(json!("boom")));
    assert!(!router.barriers().is_waiting("P1"));
}

#[tokio::test(start_paused = true)]
async fn partial_completion_times_out_at_the_deadline() {
    let (router, _store) = router_with_store();
    let start = Instant::now();

    let waiter = {
        let router = Arc::clone(&router);
        tokio::spawn(async move {
            router
                .barriers()
                .wait_for_children("P2", ["A", "B"], Duration::from_secs(1))
                .await
        })
    };
    until_waiting(&router, "P2").await;
    emit_after(
        &router,
        Duration::from_millis(100),
        TaskLifecycleEvent::completed("A").with_parent("P2"),
    );

    let err = waiter.await.unwrap().unwrap_err();
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_secs(1), "timed out early: {elapsed:?}");
    assert!(elapsed < Duration::from_millis(1100), "timed out late: {elapsed:?}");
    match err {
        WaitError::Timeout { parent, pending, .. } => {
            assert_eq!(parent, "P2");
            assert_eq!(pending, vec!["B".to_string()]);
        }
        other => panic!("expected timeout, got {other:?}"),
    }
    assert_eq!(router.barriers().active_barriers(), 0);

    // A late event for the abandoned parent is dropped.
    router.publish_lifecycle(TaskLifecycleEvent::completed("B").with_parent("P2"));
    tokio::task::yield_now().await;
    assert_eq!(router.barriers().active_barriers(), 0);
}

#[tokio::test(start_paused = true)]
async fn children_finished_before_the_wait_resolve_through_the_store() {
    let (router, store) = router_with_store();

    for ev in [
        TaskLifecycleEvent::completed("A").with_parent("P3").with_result(json!("a")),
        TaskLifecycleEvent::cancelled("B").with_parent("P3"),
    ] {
        store.apply(&ev);
        router.publish_lifecycle(ev);
    }
    tokio::task::yield_now().await;

    let start = Instant::now();
    let mut results = router
        .barriers()
        .wait_for_children("P3", ["A", "B"], Duration::from_secs(30))
        .await
        .unwrap();
    assert!(start.elapsed() < Duration::from_secs(1));

    results.sort_by(|a, b| a.task_id.cmp(&b.task_id));
    assert!(results[0].is_success());
    assert!(results[1].is_cancelled());
}

#[tokio::test(start_paused = true)]
async fn duplicate_delivery_does_not_change_the_result_set() {
    let (router, _store) = router_with_store();

    let waiter = {
        let router = Arc::clone(&router);
        tokio::spawn(async move {
            router
                .barriers()
                .wait_for_children("P4", ["A", "B"], Duration::from_secs(5))
                .await
        })
    };
    until_waiting(&router, "P4").await;

    let a = TaskLifecycleEvent::completed("A").with_parent("P4");
    router.publish_lifecycle(a.clone());
    router.publish_lifecycle(a);
    router.publish_lifecycle(TaskLifecycleEvent::failed("A").with_parent("P4"));
    emit_after(
        &router,
        Duration::from_millis(50),
        TaskLifecycleEvent::completed("B").with_parent("P4"),
    );

    let results = waiter.await.unwrap().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].outcome, TaskOutcome::Completed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_parents_each_see_exactly_their_children() {
    let (router, _store) = router_with_store();
    let parents: Vec<String> = (0..16).map(|p| format!("parent-{p}")).collect();

    let mut waiters = Vec::new();
    for parent in &parents {
        let router = Arc::clone(&router);
        let parent = parent.clone();
        waiters.push(tokio::spawn(async move {
            let children: Vec<String> = (0..8).map(|c| format!("{parent}/child-{c}")).collect();
            router
                .barriers()
                .wait_for_children(&parent, children, Duration::from_secs(30))
                .await
        }));
    }
    while router.barriers().active_barriers() < parents.len() {
        sleep(Duration::from_millis(1)).await;
    }

    let mut publishers = Vec::new();
    for parent in &parents {
        let router = Arc::clone(&router);
        let parent = parent.clone();
        publishers.push(tokio::spawn(async move {
            for c in 0..8 {
                let ev = TaskLifecycleEvent::completed(format!("{parent}/child-{c}")).with_parent(parent.as_str());
                router.publish_lifecycle(ev.clone());
                router.publish_lifecycle(ev);
                tokio::task::yield_now().await;
            }
        }));
    }
    for p in publishers {
        p.await.unwrap();
    }

    for (waiter, parent) in waiters.into_iter().zip(&parents) {
        let results = waiter.await.unwrap().unwrap();
        assert_eq!(results.len(), 8);
        assert!(results.iter().all(|r| r.task_id.starts_with(parent.as_str())));
    }
    assert_eq!(router.barriers().active_barriers(), 0);
}

#[tokio::test]
async fn reconnect_completes_the_stale_channel() {
    let (router, _store) = router_with_store();
    let channels = router.channels();

    let (c1, mut rx1) = PushChannel::new("U1", 8);
    channels.register_channel("U1", c1);
    let (c2, mut rx2) = PushChannel::new("U1", 8);
    let c2_id = c2.id();
    channels.register_channel("U1", c2);

    assert_eq!(rx1.recv().await, None);
    assert!(channels.publish("U1", PushEvent::message(json!({"n": 1}))));
    assert_eq!(rx2.recv().await, Some(PushEvent::message(json!({"n": 1}))));
    assert_eq!(channels.active_connection_count(), 1);
    assert_eq!(channels.channel_id("U1"), Some(c2_id));

    assert!(channels.force_logout("U1", "password changed"));
    let logout = rx2.recv().await.unwrap();
    assert!(logout.is_complete());
    assert_eq!(logout.data["forceLogout"], json!(true));
    assert_eq!(rx2.recv().await, None);

    assert!(!channels.has_active_connection("U1"));
    assert!(!channels.publish("U1", PushEvent::message(json!("gone"))));
}
