use domain::{CloudPayload, DataType, MetricValue, SeverityLevel, TypedValue};
use std::sync::Arc;
use wire_cloud::{CloudClientListener, CloudService, InMemoryCloudService};
use wire_subscriber::{
    CallOutcome, SkipReason, SubscriptionManager, TranslateError, build_wire_record,
};

struct SilentListener;

impl CloudClientListener for SilentListener {
    fn on_message_arrived(
        &self,
        _device_id: &str,
        _app_topic: &str,
        _payload: Option<&CloudPayload>,
        _qos: u8,
        _retain: bool,
    ) {
    }
}

fn manager() -> SubscriptionManager {
    SubscriptionManager::new(Arc::new(SilentListener))
}

fn single(value: MetricValue) -> TypedValue {
    let payload = CloudPayload::new().with_metric("value", value);
    let record = build_wire_record(Some(&payload)).expect("record");
    assert_eq!(record.len(), 1);
    record.fields()[0].value.clone()
}

#[test]
fn each_supported_kind_maps_to_its_typed_value() {
    let cases = vec![
        (MetricValue::Boolean(false), TypedValue::Boolean(false), DataType::Boolean),
        (MetricValue::Byte(-3), TypedValue::Byte(-3), DataType::Byte),
        (MetricValue::Short(512), TypedValue::Short(512), DataType::Short),
        (MetricValue::Integer(70_000), TypedValue::Integer(70_000), DataType::Integer),
        (
            MetricValue::Long(5_000_000_000),
            TypedValue::Long(5_000_000_000),
            DataType::Long,
        ),
        (MetricValue::Double(-0.25), TypedValue::Double(-0.25), DataType::Double),
        (
            MetricValue::String("on".to_string()),
            TypedValue::String("on".to_string()),
            DataType::String,
        ),
        (
            MetricValue::Bytes(vec![0xde, 0xad]),
            TypedValue::ByteArray(vec![0xde, 0xad]),
            DataType::ByteArray,
        ),
    ];
    for (input, expected, data_type) in cases {
        let typed = single(input);
        assert_eq!(typed.data_type(), data_type);
        assert_eq!(typed, expected);
    }
}

#[test]
fn unsupported_kinds_fall_back_to_empty_string() {
    let payload = CloudPayload::new()
        .with_metric("ratio", MetricValue::Float(0.5))
        .with_metric("samples", MetricValue::List(vec![MetricValue::Integer(1)]))
        .with_metric("missing", MetricValue::Null)
        .with_metric("count", MetricValue::Integer(2));
    let record = build_wire_record(Some(&payload)).expect("record");

    assert_eq!(record.len(), 4);
    for name in ["ratio", "samples", "missing"] {
        let field = record.field(name).expect("field kept");
        assert_eq!(field.value, TypedValue::String(String::new()));
    }
    assert_eq!(
        record.field("count").map(|field| &field.value),
        Some(&TypedValue::Integer(2))
    );
}

#[test]
fn severity_applies_to_every_field() {
    let payload = CloudPayload::new()
        .with_metric("pressure", MetricValue::Double(1.2))
        .with_metric("asset_flag", MetricValue::String("Error".to_string()))
        .with_metric("valve", MetricValue::Boolean(false));
    let record = build_wire_record(Some(&payload)).expect("record");
    assert_eq!(record.severity(), SeverityLevel::Error);
    assert!(
        record
            .fields()
            .iter()
            .all(|field| field.severity == SeverityLevel::Error)
    );

    let payload = CloudPayload::new()
        .with_metric("pressure", MetricValue::Double(1.2))
        .with_metric("asset_flag", MetricValue::String("WARN".to_string()));
    let record = build_wire_record(Some(&payload)).expect("record");
    assert!(
        record
            .fields()
            .iter()
            .all(|field| field.severity == SeverityLevel::Info)
    );
}

#[test]
fn null_and_empty_payloads() {
    assert_eq!(build_wire_record(None), Err(TranslateError::NullPayload));
    let record = build_wire_record(Some(&CloudPayload::new())).expect("record");
    assert!(record.is_empty());
}

#[tokio::test]
async fn repeated_client_setup_keeps_one_client_and_listener() {
    let service = InMemoryCloudService::new(true);
    let provider: Arc<dyn CloudService> = Arc::new(service.clone());
    let mut manager = manager();

    manager.setup_client(&provider, "W1").await.expect("first setup");
    manager.setup_client(&provider, "W1").await.expect("second setup");

    assert!(manager.has_client());
    assert_eq!(manager.client_application(), Some("W1"));
    assert_eq!(service.live_client_count(), 1);
    assert_eq!(service.listener_count(), 1);
}

#[tokio::test]
async fn operations_without_client_are_no_ops() {
    let service = InMemoryCloudService::new(true);
    let mut manager = manager();

    assert_eq!(
        manager
            .subscribe(Some(&service), Some("dev-1"), Some("alarms"), 0)
            .await
            .expect("subscribe"),
        CallOutcome::Skipped(SkipReason::NoClient)
    );
    assert_eq!(
        manager.unsubscribe(Some("dev-1"), Some("alarms")).await,
        CallOutcome::Skipped(SkipReason::NoClient)
    );
    manager.teardown().await;
    manager.teardown().await;
    assert!(service.calls().is_empty());
}

#[tokio::test]
async fn subscribe_checks_target_provider_and_connection() {
    let service = InMemoryCloudService::new(false);
    let provider: Arc<dyn CloudService> = Arc::new(service.clone());
    let mut manager = manager();
    manager.setup_client(&provider, "W1").await.expect("setup");

    assert_eq!(
        manager
            .subscribe(Some(&service), None, Some("alarms"), 0)
            .await
            .expect("subscribe"),
        CallOutcome::Skipped(SkipReason::TargetUnset)
    );
    assert_eq!(
        manager
            .subscribe(None, Some("dev-1"), Some("alarms"), 0)
            .await
            .expect("subscribe"),
        CallOutcome::Skipped(SkipReason::NoProvider)
    );
    assert_eq!(
        manager
            .subscribe(Some(&service), Some("dev-1"), Some("alarms"), 0)
            .await
            .expect("subscribe"),
        CallOutcome::Skipped(SkipReason::NotConnected)
    );

    service.set_connected(true);
    assert_eq!(
        manager
            .subscribe(Some(&service), Some("dev-1"), Some("alarms"), 2)
            .await
            .expect("subscribe"),
        CallOutcome::Issued
    );
}

#[tokio::test]
async fn subscribe_failure_is_reported() {
    let service = InMemoryCloudService::new(true);
    service.fail_subscribe(true);
    let provider: Arc<dyn CloudService> = Arc::new(service.clone());
    let mut manager = manager();
    manager.setup_client(&provider, "W1").await.expect("setup");

    assert!(
        manager
            .subscribe(Some(&service), Some("dev-1"), Some("alarms"), 0)
            .await
            .is_err()
    );
    service.fail_unsubscribe(true);
    assert_eq!(
        manager.unsubscribe(Some("dev-1"), Some("alarms")).await,
        CallOutcome::Failed
    );
}

#[tokio::test]
async fn refused_client_surfaces_connection_error() {
    let service = InMemoryCloudService::new(true);
    service.refuse_clients(true);
    let provider: Arc<dyn CloudService> = Arc::new(service);
    let mut manager = manager();
    assert!(manager.setup_client(&provider, "W1").await.is_err());
    assert!(!manager.has_client());
}
