use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use wire_cloud::{
    CloudCall, CloudService, InMemoryCloudService, ProviderEvent, ProviderEventKind,
    ProviderFilter, ProviderRegistry, ProviderTracker,
};

fn open_tracker(
    registry: &ProviderRegistry,
    pid: &str,
    generation: u64,
) -> (
    ProviderTracker,
    Option<(String, Arc<dyn CloudService>)>,
    mpsc::UnboundedReceiver<ProviderEvent>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    let filter = ProviderFilter::for_pid(pid).expect("filter");
    let (tracker, initial) =
        ProviderTracker::open(registry, filter, generation, move |event| tx.send(event).is_ok());
    (tracker, initial, rx)
}

async fn next_event(rx: &mut mpsc::UnboundedReceiver<ProviderEvent>) -> ProviderEvent {
    tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("event in time")
        .expect("channel open")
}

#[tokio::test]
async fn tracker_reports_existing_provider_synchronously() {
    let registry = ProviderRegistry::new();
    registry.register("cloud-1", Arc::new(InMemoryCloudService::new(true)));

    let (tracker, initial, _rx) = open_tracker(&registry, "cloud-1", 1);
    let (pid, provider) = initial.expect("initial provider");
    assert_eq!(pid, "cloud-1");
    assert!(provider.is_connected());
    assert!(tracker.is_open());
    assert_eq!(tracker.generation(), 1);
}

#[tokio::test]
async fn tracker_follows_register_modify_unregister() {
    let registry = ProviderRegistry::new();
    let (_tracker, initial, mut rx) = open_tracker(&registry, "cloud-1", 7);
    assert!(initial.is_none());

    registry.register("other", Arc::new(InMemoryCloudService::new(true)));
    registry.register("cloud-1", Arc::new(InMemoryCloudService::new(true)));
    let event = next_event(&mut rx).await;
    assert_eq!(event.generation, 7);
    assert_eq!(event.pid, "cloud-1");
    assert!(matches!(event.kind, ProviderEventKind::Available(_)));

    assert!(registry.modify("cloud-1"));
    assert!(matches!(
        next_event(&mut rx).await.kind,
        ProviderEventKind::Updated(_)
    ));

    // 同一 pid 重新注册视为修改。
    registry.register("cloud-1", Arc::new(InMemoryCloudService::new(false)));
    assert!(matches!(
        next_event(&mut rx).await.kind,
        ProviderEventKind::Updated(_)
    ));

    registry.unregister("cloud-1");
    assert!(matches!(
        next_event(&mut rx).await.kind,
        ProviderEventKind::Removed
    ));
    assert!(rx.try_recv().is_err());
}

/// 取出当前排队的全部事件，静默一段时间后返回。
async fn drain_events(rx: &mut mpsc::UnboundedReceiver<ProviderEvent>) -> Vec<ProviderEvent> {
    let mut events = Vec::new();
    while let Ok(Some(event)) = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn lagged_tracker_rescans_and_reports_present_provider() {
    let registry = ProviderRegistry::new();
    let (_tracker, initial, mut rx) = open_tracker(&registry, "cloud-1", 3);
    assert!(initial.is_none());

    // 追踪任务尚未运行，广播队列在此期间溢出。
    let mut operations = 0;
    for _ in 0..100 {
        registry.register("cloud-1", Arc::new(InMemoryCloudService::new(true)));
        registry.unregister("cloud-1");
        operations += 2;
    }
    registry.register("cloud-1", Arc::new(InMemoryCloudService::new(true)));
    operations += 1;

    let events = drain_events(&mut rx).await;
    assert!(!events.is_empty());
    assert!(events.len() < operations);
    assert!(events.iter().all(|event| event.generation == 3));
    let last = events.last().expect("last event");
    assert_eq!(last.pid, "cloud-1");
    assert!(matches!(last.kind, ProviderEventKind::Available(_)));
}

#[tokio::test]
async fn lagged_tracker_reports_removal_of_vanished_provider() {
    let registry = ProviderRegistry::new();
    registry.register("cloud-1", Arc::new(InMemoryCloudService::new(true)));
    let (_tracker, initial, mut rx) = open_tracker(&registry, "cloud-1", 4);
    assert!(initial.is_some());

    let mut operations = 0;
    for _ in 0..100 {
        registry.unregister("cloud-1");
        registry.register("cloud-1", Arc::new(InMemoryCloudService::new(true)));
        operations += 2;
    }
    registry.unregister("cloud-1");
    operations += 1;

    let events = drain_events(&mut rx).await;
    assert!(events.len() < operations);
    let first = events.first().expect("rescan event");
    assert!(matches!(first.kind, ProviderEventKind::Removed));
    let last = events.last().expect("last event");
    assert!(matches!(last.kind, ProviderEventKind::Removed));
    let filter = ProviderFilter::for_pid("cloud-1").expect("filter");
    assert!(registry.find_matching(&filter).is_empty());
}

#[tokio::test]
async fn closed_tracker_stops_delivering() {
    let registry = ProviderRegistry::new();
    let (tracker, _initial, mut rx) = open_tracker(&registry, "cloud-1", 1);
    tracker.close();

    registry.register("cloud-1", Arc::new(InMemoryCloudService::new(true)));
    let received = tokio::time::timeout(Duration::from_millis(100), rx.recv()).await;
    assert!(matches!(received, Ok(None) | Err(_)));
}

#[test]
fn malformed_filter_is_rejected() {
    assert!(ProviderFilter::for_pid("").is_err());
    assert!(ProviderFilter::for_pid("(objectClass=*)").is_err());
}

#[tokio::test]
async fn in_memory_provider_records_client_calls() {
    let service = InMemoryCloudService::new(true);
    let client = service.new_cloud_client("W1").await.expect("client");
    client.subscribe("dev-1", "alarms", 1).await.expect("subscribe");
    client.unsubscribe("dev-1", "alarms").await.expect("unsubscribe");
    client.release().await;
    assert!(client.subscribe("dev-1", "alarms", 1).await.is_err());

    assert_eq!(
        service.calls(),
        vec![
            CloudCall::NewClient {
                application: "W1".to_string()
            },
            CloudCall::Subscribe {
                application: "W1".to_string(),
                device_id: "dev-1".to_string(),
                app_topic: "alarms".to_string(),
                qos: 1,
            },
            CloudCall::Unsubscribe {
                application: "W1".to_string(),
                device_id: "dev-1".to_string(),
                app_topic: "alarms".to_string(),
            },
            CloudCall::Release {
                application: "W1".to_string()
            },
        ]
    );
    assert_eq!(service.live_client_count(), 0);
}

#[tokio::test]
async fn in_memory_provider_refuses_clients_on_demand() {
    let service = InMemoryCloudService::new(false);
    service.refuse_clients(true);
    assert!(service.new_cloud_client("W1").await.is_err());
    service.refuse_clients(false);
    assert!(service.new_cloud_client("W1").await.is_ok());
    assert_eq!(service.live_client_count(), 1);
}
