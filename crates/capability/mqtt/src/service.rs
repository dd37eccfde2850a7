use crate::codec::{decode_payload, encode_payload};
use crate::topic::{TopicKind, TopicLayout};
use async_trait::async_trait;
use domain::CloudPayload;
use rumqttc::{AsyncClient, ConnectReturnCode, Event, MqttOptions, Packet, QoS};
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use wire_cloud::{CloudClient, CloudClientListener, CloudError, CloudService, ListenerSet};

/// MQTT 连接提供者配置。
#[derive(Debug, Clone)]
pub struct MqttProviderConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// 账户命名空间，数据 topic 的第一段。
    pub topic_prefix: String,
    pub control_prefix: String,
}

struct MqttInner {
    client: AsyncClient,
    layout: TopicLayout,
    connected: AtomicBool,
    next_message_id: AtomicU16,
    clients: RwLock<Vec<Arc<MqttCloudClient>>>,
}

impl MqttInner {
    fn live_clients(&self) -> Vec<Arc<MqttCloudClient>> {
        self.clients
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_connected(&self, connected: bool) {
        if self.connected.swap(connected, Ordering::SeqCst) == connected {
            return;
        }
        info!(connected = connected, "mqtt connection state changed");
        for client in self.live_clients() {
            for listener in client.listeners.snapshot() {
                if connected {
                    listener.on_connection_established();
                } else {
                    listener.on_connection_lost();
                }
            }
        }
    }

    fn route(&self, topic: &str, payload: &[u8], qos: u8, retain: bool) {
        let Some(inbound) = self.layout.parse(topic) else {
            warn!("skipping mqtt topic outside layout: {}", topic);
            return;
        };
        let decoded = decode_payload(payload);
        if decoded.is_none() {
            debug!(topic = %topic, payload_size = payload.len(), "payload not decoded");
        }
        for client in self.live_clients() {
            if client.application != inbound.application {
                continue;
            }
            for listener in client.listeners.snapshot() {
                match inbound.kind {
                    TopicKind::Data => listener.on_message_arrived(
                        &inbound.device_id,
                        &inbound.app_topic,
                        decoded.as_ref(),
                        qos,
                        retain,
                    ),
                    TopicKind::Control => listener.on_control_message_arrived(
                        &inbound.device_id,
                        &inbound.app_topic,
                        decoded.as_ref(),
                        qos,
                        retain,
                    ),
                }
            }
        }
    }
}

/// 基于 rumqttc 的连接提供者。
///
/// 一个提供者持有一条 broker 连接；按应用标识创建的客户端共享该连接，
/// 入站消息按 topic 中的应用段路由到对应客户端的监听器。
#[derive(Clone)]
pub struct MqttCloudService {
    inner: Arc<MqttInner>,
}

impl MqttCloudService {
    /// 建立客户端并启动事件循环任务。连接在后台完成，成功后监听器收到连接建立回调。
    pub fn connect(config: MqttProviderConfig) -> Result<(Self, JoinHandle<()>), CloudError> {
        if config.host.trim().is_empty() {
            return Err(CloudError::Connection("mqtt host must not be empty".to_string()));
        }
        let client_id = format!("wire-subscriber-{}", uuid::Uuid::new_v4());
        let mut options = MqttOptions::new(client_id, config.host.clone(), config.port);
        options.set_keep_alive(Duration::from_secs(30));
        if let (Some(username), Some(password)) = (config.username, config.password) {
            options.set_credentials(username, password);
        }
        let (client, mut eventloop) = AsyncClient::new(options, 10);
        let inner = Arc::new(MqttInner {
            client,
            layout: TopicLayout::new(&config.topic_prefix, &config.control_prefix),
            connected: AtomicBool::new(false),
            next_message_id: AtomicU16::new(1),
            clients: RwLock::new(Vec::new()),
        });
        info!(
            topic_prefix = %config.topic_prefix,
            "connecting to mqtt broker at {}:{}",
            config.host,
            config.port
        );

        let weak: Weak<MqttInner> = Arc::downgrade(&inner);
        let handle = tokio::spawn(async move {
            loop {
                let event = eventloop.poll().await;
                let Some(inner) = weak.upgrade() else {
                    debug!("mqtt provider dropped, stopping eventloop");
                    break;
                };
                match event {
                    Ok(Event::Incoming(Packet::ConnAck(connack))) => {
                        if connack.code == ConnectReturnCode::Success {
                            inner.set_connected(true);
                        } else {
                            warn!(code = ?connack.code, "mqtt connection refused");
                        }
                    }
                    Ok(Event::Incoming(Packet::Publish(publish))) => inner.route(
                        &publish.topic,
                        &publish.payload,
                        qos_to_u8(publish.qos),
                        publish.retain,
                    ),
                    Ok(Event::Incoming(Packet::Disconnect)) => inner.set_connected(false),
                    Ok(_) => {}
                    Err(err) => {
                        warn!(error = %err, "mqtt eventloop error");
                        inner.set_connected(false);
                        drop(inner);
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        });
        Ok((Self { inner }, handle))
    }

    pub fn layout(&self) -> &TopicLayout {
        &self.inner.layout
    }
}

#[async_trait]
impl CloudService for MqttCloudService {
    fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    async fn new_cloud_client(
        &self,
        application_id: &str,
    ) -> Result<Arc<dyn CloudClient>, CloudError> {
        let client = Arc::new(MqttCloudClient {
            application: application_id.to_string(),
            service: Arc::downgrade(&self.inner),
            listeners: ListenerSet::new(),
            released: AtomicBool::new(false),
        });
        self.inner
            .clients
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(client.clone());
        debug!(application = %application_id, "cloud client created");
        let client: Arc<dyn CloudClient> = client;
        Ok(client)
    }
}

struct MqttCloudClient {
    application: String,
    service: Weak<MqttInner>,
    listeners: ListenerSet,
    released: AtomicBool,
}

impl MqttCloudClient {
    fn service(&self) -> Result<Arc<MqttInner>, CloudError> {
        if self.released.load(Ordering::SeqCst) {
            return Err(CloudError::Released);
        }
        self.service.upgrade().ok_or(CloudError::Released)
    }

    fn connected_service(&self) -> Result<Arc<MqttInner>, CloudError> {
        let service = self.service()?;
        if !service.connected.load(Ordering::SeqCst) {
            return Err(CloudError::NotConnected);
        }
        Ok(service)
    }
}

#[async_trait]
impl CloudClient for MqttCloudClient {
    fn application_id(&self) -> &str {
        &self.application
    }

    async fn subscribe(&self, device_id: &str, app_topic: &str, qos: u8) -> Result<(), CloudError> {
        let service = self.connected_service()?;
        let topic = service.layout.data_topic(device_id, &self.application, app_topic);
        service
            .client
            .subscribe(topic.as_str(), qos_from_u8(qos))
            .await
            .map_err(|err| CloudError::Subscribe(err.to_string()))?;
        debug!(qos = qos, "subscribed to {}", topic);
        Ok(())
    }

    async fn unsubscribe(&self, device_id: &str, app_topic: &str) -> Result<(), CloudError> {
        let service = self.service()?;
        let topic = service.layout.data_topic(device_id, &self.application, app_topic);
        service
            .client
            .unsubscribe(topic.as_str())
            .await
            .map_err(|err| CloudError::Unsubscribe(err.to_string()))?;
        debug!("unsubscribed from {}", topic);
        Ok(())
    }

    async fn publish(
        &self,
        device_id: &str,
        app_topic: &str,
        payload: &CloudPayload,
        qos: u8,
        retain: bool,
    ) -> Result<u16, CloudError> {
        let service = self.connected_service()?;
        let topic = service.layout.data_topic(device_id, &self.application, app_topic);
        let bytes = encode_payload(payload)?;
        let payload_size = bytes.len();
        service
            .client
            .publish(topic.as_str(), qos_from_u8(qos), retain, bytes)
            .await
            .map_err(|err| CloudError::Publish(err.to_string()))?;
        let message_id = service.next_message_id.fetch_add(1, Ordering::SeqCst);
        debug!(
            topic = %topic,
            message_id = message_id,
            payload_size = payload_size,
            "payload published"
        );
        for listener in self.listeners.snapshot() {
            listener.on_message_published(message_id, app_topic);
        }
        Ok(message_id)
    }

    fn add_listener(&self, listener: Arc<dyn CloudClientListener>) {
        self.listeners.add(listener);
    }

    fn remove_listener(&self, listener: &Arc<dyn CloudClientListener>) {
        self.listeners.remove(listener);
    }

    async fn release(&self) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }
        self.listeners.clear();
        if let Some(service) = self.service.upgrade() {
            service
                .clients
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .retain(|client| !std::ptr::eq(client.as_ref(), self));
        }
        debug!(application = %self.application, "cloud client released");
    }
}

fn qos_from_u8(value: u8) -> QoS {
    match value {
        0 => QoS::AtMostOnce,
        1 => QoS::AtLeastOnce,
        _ => QoS::ExactlyOnce,
    }
}

fn qos_to_u8(qos: QoS) -> u8 {
    match qos {
        QoS::AtMostOnce => 0,
        QoS::AtLeastOnce => 1,
        QoS::ExactlyOnce => 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qos_above_two_is_clamped() {
        assert_eq!(qos_from_u8(0), QoS::AtMostOnce);
        assert_eq!(qos_from_u8(2), QoS::ExactlyOnce);
        assert_eq!(qos_from_u8(9), QoS::ExactlyOnce);
        assert_eq!(qos_to_u8(qos_from_u8(1)), 1);
    }
}
