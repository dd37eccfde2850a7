//! 内存实现的连接提供者（用于测试与本地接线）。

use crate::error::CloudError;
use crate::service::{CloudClient, CloudClientListener, CloudService, ListenerSet};
use async_trait::async_trait;
use domain::CloudPayload;
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

/// 客户端调用记录（按发生顺序）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloudCall {
    NewClient {
        application: String,
    },
    AddListener {
        application: String,
    },
    RemoveListener {
        application: String,
    },
    Subscribe {
        application: String,
        device_id: String,
        app_topic: String,
        qos: u8,
    },
    Unsubscribe {
        application: String,
        device_id: String,
        app_topic: String,
    },
    Publish {
        application: String,
        device_id: String,
        app_topic: String,
        qos: u8,
    },
    Release {
        application: String,
    },
}

struct InMemoryInner {
    connected: AtomicBool,
    refuse_clients: AtomicBool,
    fail_subscribe: AtomicBool,
    fail_unsubscribe: AtomicBool,
    next_message_id: AtomicU16,
    retained: Mutex<Option<CloudPayload>>,
    calls: Mutex<Vec<CloudCall>>,
    clients: Mutex<Vec<Arc<InMemoryCloudClient>>>,
}

impl InMemoryInner {
    fn record(&self, call: CloudCall) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }

    fn live_clients(&self) -> Vec<Arc<InMemoryCloudClient>> {
        self.clients
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// 内存连接提供者。
///
/// 记录所有客户端调用，可切换连接状态、拒绝创建客户端、注入订阅失败，
/// 并向存活客户端的监听器投递消息与连接事件。
#[derive(Clone)]
pub struct InMemoryCloudService {
    inner: Arc<InMemoryInner>,
}

impl InMemoryCloudService {
    pub fn new(connected: bool) -> Self {
        Self {
            inner: Arc::new(InMemoryInner {
                connected: AtomicBool::new(connected),
                refuse_clients: AtomicBool::new(false),
                fail_subscribe: AtomicBool::new(false),
                fail_unsubscribe: AtomicBool::new(false),
                next_message_id: AtomicU16::new(1),
                retained: Mutex::new(None),
                calls: Mutex::new(Vec::new()),
                clients: Mutex::new(Vec::new()),
            }),
        }
    }

    /// 切换连接状态，并通知存活客户端的监听器。
    pub fn set_connected(&self, connected: bool) {
        let previous = self.inner.connected.swap(connected, Ordering::SeqCst);
        if previous == connected {
            return;
        }
        for client in self.inner.live_clients() {
            for listener in client.listeners.snapshot() {
                if connected {
                    listener.on_connection_established();
                } else {
                    listener.on_connection_lost();
                }
            }
        }
    }

    pub fn refuse_clients(&self, refuse: bool) {
        self.inner.refuse_clients.store(refuse, Ordering::SeqCst);
    }

    pub fn fail_subscribe(&self, fail: bool) {
        self.inner.fail_subscribe.store(fail, Ordering::SeqCst);
    }

    pub fn fail_unsubscribe(&self, fail: bool) {
        self.inner.fail_unsubscribe.store(fail, Ordering::SeqCst);
    }

    /// 设置保留消息；之后每次订阅成功都会在 `subscribe` 返回前投递一次。
    pub fn set_retained(&self, payload: Option<CloudPayload>) {
        *self
            .inner
            .retained
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = payload;
    }

    pub fn calls(&self) -> Vec<CloudCall> {
        self.inner
            .calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear_calls(&self) {
        self.inner
            .calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// 未释放的客户端数量。
    pub fn live_client_count(&self) -> usize {
        self.inner.live_clients().len()
    }

    /// 所有存活客户端上登记的监听器总数。
    pub fn listener_count(&self) -> usize {
        self.inner
            .live_clients()
            .iter()
            .map(|client| client.listeners.len())
            .sum()
    }

    /// 向指定应用的存活客户端投递数据消息，返回被调用的监听器数量。
    pub fn deliver(
        &self,
        application: &str,
        device_id: &str,
        app_topic: &str,
        payload: Option<CloudPayload>,
    ) -> usize {
        let mut delivered = 0;
        for client in self.inner.live_clients() {
            if client.application != application {
                continue;
            }
            for listener in client.listeners.snapshot() {
                listener.on_message_arrived(device_id, app_topic, payload.as_ref(), 0, false);
                delivered += 1;
            }
        }
        delivered
    }

    /// 向指定应用的存活客户端投递控制消息。
    pub fn deliver_control(
        &self,
        application: &str,
        device_id: &str,
        app_topic: &str,
        payload: Option<CloudPayload>,
    ) -> usize {
        let mut delivered = 0;
        for client in self.inner.live_clients() {
            if client.application != application {
                continue;
            }
            for listener in client.listeners.snapshot() {
                listener.on_control_message_arrived(
                    device_id,
                    app_topic,
                    payload.as_ref(),
                    0,
                    false,
                );
                delivered += 1;
            }
        }
        delivered
    }
}

#[async_trait]
impl CloudService for InMemoryCloudService {
    fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    async fn new_cloud_client(
        &self,
        application_id: &str,
    ) -> Result<Arc<dyn CloudClient>, CloudError> {
        if self.inner.refuse_clients.load(Ordering::SeqCst) {
            return Err(CloudError::Connection(format!(
                "client refused for application {}",
                application_id
            )));
        }
        self.inner.record(CloudCall::NewClient {
            application: application_id.to_string(),
        });
        let client = Arc::new(InMemoryCloudClient {
            application: application_id.to_string(),
            service: Arc::downgrade(&self.inner),
            listeners: ListenerSet::new(),
            released: AtomicBool::new(false),
        });
        self.inner
            .clients
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(client.clone());
        let client: Arc<dyn CloudClient> = client;
        Ok(client)
    }
}

struct InMemoryCloudClient {
    application: String,
    service: Weak<InMemoryInner>,
    listeners: ListenerSet,
    released: AtomicBool,
}

impl InMemoryCloudClient {
    fn service(&self) -> Result<Arc<InMemoryInner>, CloudError> {
        if self.released.load(Ordering::SeqCst) {
            return Err(CloudError::Released);
        }
        self.service.upgrade().ok_or(CloudError::Released)
    }
}

#[async_trait]
impl CloudClient for InMemoryCloudClient {
    fn application_id(&self) -> &str {
        &self.application
    }

    async fn subscribe(
        &self,
        device_id: &str,
        app_topic: &str,
        qos: u8,
    ) -> Result<(), CloudError> {
        let service = self.service()?;
        service.record(CloudCall::Subscribe {
            application: self.application.clone(),
            device_id: device_id.to_string(),
            app_topic: app_topic.to_string(),
            qos,
        });
        if !service.connected.load(Ordering::SeqCst) {
            return Err(CloudError::NotConnected);
        }
        if service.fail_subscribe.load(Ordering::SeqCst) {
            return Err(CloudError::Subscribe("forced failure".to_string()));
        }
        let retained = service
            .retained
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(payload) = retained {
            for listener in self.listeners.snapshot() {
                listener.on_message_arrived(device_id, app_topic, Some(&payload), qos, true);
            }
        }
        Ok(())
    }

    async fn unsubscribe(&self, device_id: &str, app_topic: &str) -> Result<(), CloudError> {
        let service = self.service()?;
        service.record(CloudCall::Unsubscribe {
            application: self.application.clone(),
            device_id: device_id.to_string(),
            app_topic: app_topic.to_string(),
        });
        if service.fail_unsubscribe.load(Ordering::SeqCst) {
            return Err(CloudError::Unsubscribe("forced failure".to_string()));
        }
        Ok(())
    }

    async fn publish(
        &self,
        device_id: &str,
        app_topic: &str,
        _payload: &CloudPayload,
        qos: u8,
        _retain: bool,
    ) -> Result<u16, CloudError> {
        let service = self.service()?;
        service.record(CloudCall::Publish {
            application: self.application.clone(),
            device_id: device_id.to_string(),
            app_topic: app_topic.to_string(),
            qos,
        });
        if !service.connected.load(Ordering::SeqCst) {
            return Err(CloudError::NotConnected);
        }
        let message_id = service.next_message_id.fetch_add(1, Ordering::SeqCst);
        for listener in self.listeners.snapshot() {
            listener.on_message_published(message_id, app_topic);
            if qos > 0 {
                listener.on_message_confirmed(message_id, app_topic);
            }
        }
        Ok(message_id)
    }

    fn add_listener(&self, listener: Arc<dyn CloudClientListener>) {
        if let Some(service) = self.service.upgrade() {
            service.record(CloudCall::AddListener {
                application: self.application.clone(),
            });
        }
        self.listeners.add(listener);
    }

    fn remove_listener(&self, listener: &Arc<dyn CloudClientListener>) {
        if let Some(service) = self.service.upgrade() {
            service.record(CloudCall::RemoveListener {
                application: self.application.clone(),
            });
        }
        self.listeners.remove(listener);
    }

    async fn release(&self) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }
        self.listeners.clear();
        if let Some(service) = self.service.upgrade() {
            service.record(CloudCall::Release {
                application: self.application.clone(),
            });
            service
                .clients
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .retain(|client| !std::ptr::eq(client.as_ref(), self));
        }
    }
}
