//! Child lifecycle observation through `refs`.

mod common;

use std::time::Duration;

use holon_object::{ChannelObserver, ObjectOps, Record, WorkerEvent};
use serde_json::json;
use tokio::sync::mpsc::UnboundedReceiver;

use common::person_class;

/// Wait until the parent reports the child's termination.
async fn wait_child_terminated(events: &mut UnboundedReceiver<WorkerEvent>) -> WorkerEvent {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match events.recv().await {
                Some(event @ WorkerEvent::ChildTerminated { .. }) => return event,
                Some(_) => continue,
                None => panic!("observer channel closed"),
            }
        }
    })
    .await
    .expect("child termination observed")
}

async fn refs_len(obj: &Record) -> usize {
    obj.get().await.unwrap().refs().count()
}

#[tokio::test]
async fn test_monitor_records_ref() {
    let class = person_class();
    let parent = class.spawn_default().await.unwrap();
    let child = class.spawn([("first", json!("Kid"))]).await.unwrap();

    let token = parent.monitor(&child).await.unwrap();
    let snapshot = parent.get().await.unwrap();
    assert!(snapshot.is_monitoring(&token));

    let (_, observed) = snapshot.refs().next().unwrap();
    assert_eq!(observed.id(), child.id());
}

#[tokio::test]
async fn test_child_close_clears_ref() {
    let (observer, mut events) = ChannelObserver::new();
    let class = person_class().with_observer(observer);
    let parent = class.spawn_default().await.unwrap();
    let child = class.spawn_default().await.unwrap();

    let token = parent.monitor(child.identity()).await.unwrap();
    child.close().await.unwrap();

    let event = wait_child_terminated(&mut events).await;
    assert_eq!(
        event,
        WorkerEvent::ChildTerminated {
            id: parent.id(),
            token,
            child: child.id(),
        }
    );
    assert_eq!(refs_len(&parent).await, 0);
}

#[tokio::test]
async fn test_child_failure_clears_ref() {
    let (observer, mut events) = ChannelObserver::new();
    let class = person_class().with_observer(observer);
    let parent = class.spawn_default().await.unwrap();
    let child = class.spawn_default().await.unwrap();

    parent.monitor(&child).await.unwrap();
    // A malformed cast kills the child.
    child.cast_set("name", json!(false)).await.unwrap();

    wait_child_terminated(&mut events).await;
    assert_eq!(refs_len(&parent).await, 0);
    assert!(parent.is_alive());
}

#[tokio::test]
async fn test_monitoring_dead_child_notifies_immediately() {
    let (observer, mut events) = ChannelObserver::new();
    let class = person_class().with_observer(observer);
    let parent = class.spawn_default().await.unwrap();
    let child = class.spawn_default().await.unwrap();
    child.close().await.unwrap();

    parent.monitor(&child).await.unwrap();
    wait_child_terminated(&mut events).await;
    assert_eq!(refs_len(&parent).await, 0);
}

#[tokio::test]
async fn test_demonitor_drops_ref_without_notification() {
    let (observer, mut events) = ChannelObserver::new();
    let class = person_class().with_observer(observer);
    let parent = class.spawn_default().await.unwrap();
    let child = class.spawn_default().await.unwrap();

    let token = parent.monitor(&child).await.unwrap();
    assert!(parent.demonitor(token).await.unwrap());
    assert!(!parent.demonitor(token).await.unwrap());

    child.close().await.unwrap();
    // Round-trip through the parent so any stray notification would be handled.
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(refs_len(&parent).await, 0);

    while let Ok(event) = events.try_recv() {
        assert!(!matches!(event, WorkerEvent::ChildTerminated { .. }));
    }
}

#[tokio::test]
async fn test_parent_close_leaves_child_running() {
    let class = person_class();
    let parent = class.spawn_default().await.unwrap();
    let child = class.spawn_default().await.unwrap();

    parent.monitor(&child).await.unwrap();
    parent.close().await.unwrap();

    assert!(child.is_alive());
    child.set("first", json!("Still here")).await.unwrap();
    child.close().await.unwrap();
}

#[tokio::test]
async fn test_panicking_parent_reports_stop() {
    let (observer, mut events) = ChannelObserver::new();
    let class = person_class().with_observer(observer);
    let parent = class.spawn_default().await.unwrap();
    let child = class.spawn_default().await.unwrap();
    parent.monitor(&child).await.unwrap();

    let err = parent
        .set_lazy("first", |_| panic!("bad lazy value"))
        .await
        .unwrap_err();
    assert!(err.is_not_alive());

    let reason = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match events.recv().await {
                Some(WorkerEvent::Stopped { id, reason }) if id == parent.id() => return reason,
                Some(_) => continue,
                None => panic!("observer channel closed"),
            }
        }
    })
    .await
    .expect("parent stop observed");
    assert!(!reason.is_normal());
    assert!(reason.to_string().contains("bad lazy value"));

    // The child outlives its observer and closes cleanly.
    assert!(child.is_alive());
    child.close().await.unwrap();
}
