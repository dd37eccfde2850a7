//! 提供者、客户端与监听器契约。

use crate::error::CloudError;
use async_trait::async_trait;
use domain::CloudPayload;
use std::sync::{Arc, PoisonError, RwLock};

/// 消息连接提供者。
#[async_trait]
pub trait CloudService: Send + Sync {
    /// 当前是否已连上消息服务器。
    fn is_connected(&self) -> bool;

    /// 为指定应用创建连接范围内的客户端。
    async fn new_cloud_client(
        &self,
        application_id: &str,
    ) -> Result<Arc<dyn CloudClient>, CloudError>;
}

/// 连接范围内的客户端。
///
/// 释放后所有调用返回 [`CloudError::Released`]。
#[async_trait]
pub trait CloudClient: Send + Sync {
    fn application_id(&self) -> &str;

    async fn subscribe(&self, device_id: &str, app_topic: &str, qos: u8)
    -> Result<(), CloudError>;

    async fn unsubscribe(&self, device_id: &str, app_topic: &str) -> Result<(), CloudError>;

    /// 发布载荷，返回消息 ID。
    async fn publish(
        &self,
        device_id: &str,
        app_topic: &str,
        payload: &CloudPayload,
        qos: u8,
        retain: bool,
    ) -> Result<u16, CloudError>;

    fn add_listener(&self, listener: Arc<dyn CloudClientListener>);

    /// 按 `Arc` 身份移除监听器。
    fn remove_listener(&self, listener: &Arc<dyn CloudClientListener>);

    async fn release(&self);
}

/// 客户端回调（由提供者的投递任务同步调用，实现方不得阻塞）。
pub trait CloudClientListener: Send + Sync {
    /// 数据消息到达；`payload` 为 `None` 表示载荷缺失或无法解码。
    fn on_message_arrived(
        &self,
        device_id: &str,
        app_topic: &str,
        payload: Option<&CloudPayload>,
        qos: u8,
        retain: bool,
    );

    fn on_control_message_arrived(
        &self,
        _device_id: &str,
        _app_topic: &str,
        _payload: Option<&CloudPayload>,
        _qos: u8,
        _retain: bool,
    ) {
    }

    fn on_connection_established(&self) {}

    fn on_connection_lost(&self) {}

    fn on_message_published(&self, _message_id: u16, _app_topic: &str) {}

    fn on_message_confirmed(&self, _message_id: u16, _app_topic: &str) {}
}

/// 客户端监听器集合（同一监听器只登记一次）。
#[derive(Default)]
pub struct ListenerSet {
    listeners: RwLock<Vec<Arc<dyn CloudClientListener>>>,
}

impl ListenerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记监听器；已存在时返回 `false`。
    pub fn add(&self, listener: Arc<dyn CloudClientListener>) -> bool {
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        if listeners.iter().any(|item| Arc::ptr_eq(item, &listener)) {
            return false;
        }
        listeners.push(listener);
        true
    }

    pub fn remove(&self, listener: &Arc<dyn CloudClientListener>) -> bool {
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|item| !Arc::ptr_eq(item, listener));
        listeners.len() != before
    }

    pub fn clear(&self) {
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        listeners.clear();
    }

    pub fn len(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 复制当前监听器列表，回调在锁外执行。
    pub fn snapshot(&self) -> Vec<Arc<dyn CloudClientListener>> {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
