//! 提供者注册与记录消费的装配。

use domain::WireRecord;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;
use wire_cloud::{CloudError, ProviderRegistry};
use wire_config::AppConfig;
use wire_mqtt::{MqttCloudService, MqttProviderConfig};

/// 连接 MQTT 提供者并以配置的标识注册，返回事件循环任务句柄。
pub fn register_mqtt_provider(
    config: &AppConfig,
    registry: &ProviderRegistry,
) -> Result<JoinHandle<()>, CloudError> {
    let mqtt_config = MqttProviderConfig {
        host: config.mqtt_host.clone(),
        port: config.mqtt_port,
        username: config.mqtt_username.clone(),
        password: config.mqtt_password.clone(),
        topic_prefix: config.mqtt_topic_prefix.clone(),
        control_prefix: config.mqtt_control_prefix.clone(),
    };
    let (service, handle) = MqttCloudService::connect(mqtt_config)?;
    registry.register(config.provider_pid.clone(), Arc::new(service));
    info!(
        provider_pid = %config.provider_pid,
        "registered mqtt provider for {}:{}",
        config.mqtt_host,
        config.mqtt_port
    );
    Ok(handle)
}

/// 消费下游记录并写入日志。
pub fn spawn_record_logger(mut records: mpsc::UnboundedReceiver<WireRecord>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(record) = records.recv().await {
            let names: Vec<&str> = record
                .fields()
                .iter()
                .map(|field| field.name.as_str())
                .collect();
            info!(
                target: "wire.gateway",
                fields = record.len(),
                severity = %record.severity(),
                names = ?names,
                "record_received"
            );
        }
    })
}
