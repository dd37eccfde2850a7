//! 云订阅宿主进程。
//!
//! 从环境变量加载配置，注册 MQTT 连接提供者，激活订阅组件，
//! 把发出的 Wire 记录写入日志；Ctrl-C 时停用组件后退出。

mod wiring;

use std::sync::Arc;
use tracing::{info, warn};
use wire_cloud::ProviderRegistry;
use wire_config::AppConfig;
use wire_subscriber::{ChannelEmitter, CloudSubscriber};
use wire_telemetry::{init_tracing, metrics};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 加载本地 .env（如存在）
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;
    init_tracing();

    let registry = ProviderRegistry::new();
    let mqtt_handle = wiring::register_mqtt_provider(&config, &registry)?;

    let (emitter, records) = ChannelEmitter::new();
    let record_logger = wiring::spawn_record_logger(records);
    let subscriber = CloudSubscriber::new(registry.clone(), Arc::new(emitter));
    if let Err(err) = subscriber.activate(&config.subscriber_properties()).await {
        // 组件保持可重配置状态，进程继续运行。
        warn!(error = %err, "failed to activate subscriber");
    }
    info!(
        provider_pid = %config.provider_pid,
        lifecycle = ?subscriber.lifecycle(),
        "wire gateway started"
    );

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");
    subscriber.deactivate().await;
    registry.unregister(&config.provider_pid);
    mqtt_handle.abort();
    record_logger.abort();

    let snapshot = metrics().snapshot();
    info!(
        messages_received = snapshot.messages_received,
        records_emitted = snapshot.records_emitted,
        null_payloads = snapshot.null_payloads,
        "wire gateway stopped"
    );
    Ok(())
}
