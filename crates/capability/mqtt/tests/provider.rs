use wire_cloud::{CloudError, CloudService};
use wire_mqtt::{MqttCloudService, MqttProviderConfig};

fn unreachable_config() -> MqttProviderConfig {
    MqttProviderConfig {
        host: "127.0.0.1".to_string(),
        port: 1,
        username: None,
        password: None,
        topic_prefix: "kura".to_string(),
        control_prefix: "$EDC".to_string(),
    }
}

#[test]
fn empty_host_is_rejected() {
    let mut config = unreachable_config();
    config.host = " ".to_string();
    assert!(matches!(
        MqttCloudService::connect(config),
        Err(CloudError::Connection(_))
    ));
}

#[tokio::test]
async fn clients_are_created_before_connection() {
    let (service, handle) = MqttCloudService::connect(unreachable_config()).expect("connect");
    assert!(!service.is_connected());

    let client = service.new_cloud_client("W1").await.expect("client");
    assert_eq!(client.application_id(), "W1");
    assert!(matches!(
        client.subscribe("dev-1", "telemetry", 0).await,
        Err(CloudError::NotConnected)
    ));

    client.release().await;
    assert!(matches!(
        client.unsubscribe("dev-1", "telemetry").await,
        Err(CloudError::Released)
    ));
    handle.abort();
}

#[tokio::test]
async fn layout_follows_configured_prefixes() {
    let (service, handle) = MqttCloudService::connect(unreachable_config()).expect("connect");
    assert_eq!(
        service.layout().data_topic("dev-1", "W1", "telemetry"),
        "kura/dev-1/W1/telemetry"
    );
    assert_eq!(
        service.layout().control_topic("dev-1", "W1", "telemetry"),
        "$EDC/kura/dev-1/W1/telemetry"
    );
    handle.abort();
}
