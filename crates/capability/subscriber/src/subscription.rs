//! 连接范围客户端与 topic 订阅管理。

use crate::error::SubscriberError;
use std::sync::Arc;
use tracing::{debug, info, warn};
use wire_cloud::{CloudClient, CloudClientListener, CloudService};
use wire_telemetry::{
    record_client_setup, record_client_setup_failure, record_subscribe_failure,
    record_subscribe_issued, record_unsubscribe_failure, record_unsubscribe_issued,
};

/// 调用被跳过的原因。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// device/topic 未配置。
    TargetUnset,
    NoClient,
    NoProvider,
    NotConnected,
}

/// 订阅类调用的结果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome {
    Issued,
    Skipped(SkipReason),
    /// 底层调用失败，已记录但未传播。
    Failed,
}

/// 订阅管理器：持有至多一个存活客户端。
///
/// 所有操作幂等，可重复调用；重试由外部的提供者/连接事件驱动，这里不排队。
pub struct SubscriptionManager {
    client: Option<Arc<dyn CloudClient>>,
    listener: Arc<dyn CloudClientListener>,
}

impl SubscriptionManager {
    pub fn new(listener: Arc<dyn CloudClientListener>) -> Self {
        Self {
            client: None,
            listener,
        }
    }

    pub fn has_client(&self) -> bool {
        self.client.is_some()
    }

    pub fn client_application(&self) -> Option<&str> {
        self.client.as_ref().map(|client| client.application_id())
    }

    /// 释放旧客户端后向提供者申请新客户端，并登记监听器。
    pub async fn setup_client(
        &mut self,
        provider: &Arc<dyn CloudService>,
        application_id: &str,
    ) -> Result<(), SubscriberError> {
        self.teardown().await;
        let client = provider
            .new_cloud_client(application_id)
            .await
            .map_err(|err| {
                record_client_setup_failure();
                SubscriberError::Connection(err)
            })?;
        client.add_listener(self.listener.clone());
        self.client = Some(client);
        record_client_setup();
        info!(
            target: "wire.subscriber",
            application = %application_id,
            "client_setup"
        );
        Ok(())
    }

    /// 订阅；目标未配置、无客户端或提供者未连接时跳过。
    pub async fn subscribe(
        &self,
        provider: Option<&dyn CloudService>,
        device_id: Option<&str>,
        app_topic: Option<&str>,
        qos: u8,
    ) -> Result<CallOutcome, SubscriberError> {
        let (Some(device_id), Some(app_topic)) = (device_id, app_topic) else {
            return Ok(CallOutcome::Skipped(SkipReason::TargetUnset));
        };
        let Some(client) = self.client.as_ref() else {
            return Ok(CallOutcome::Skipped(SkipReason::NoClient));
        };
        let Some(provider) = provider else {
            return Ok(CallOutcome::Skipped(SkipReason::NoProvider));
        };
        if !provider.is_connected() {
            debug!(
                target: "wire.subscriber",
                device_id = %device_id,
                app_topic = %app_topic,
                "subscribe_deferred_not_connected"
            );
            return Ok(CallOutcome::Skipped(SkipReason::NotConnected));
        }

        record_subscribe_issued();
        client
            .subscribe(device_id, app_topic, qos)
            .await
            .map_err(|err| {
                record_subscribe_failure();
                SubscriberError::Subscribe(err)
            })?;
        info!(
            target: "wire.subscriber",
            application = %client.application_id(),
            device_id = %device_id,
            app_topic = %app_topic,
            qos = qos,
            "topic_subscribed"
        );
        Ok(CallOutcome::Issued)
    }

    /// 取消订阅；失败只记录不传播，保证停用与重配置不会被阻塞。
    pub async fn unsubscribe(&self, device_id: Option<&str>, app_topic: Option<&str>) -> CallOutcome {
        let (Some(device_id), Some(app_topic)) = (device_id, app_topic) else {
            return CallOutcome::Skipped(SkipReason::TargetUnset);
        };
        let Some(client) = self.client.as_ref() else {
            return CallOutcome::Skipped(SkipReason::NoClient);
        };

        record_unsubscribe_issued();
        match client.unsubscribe(device_id, app_topic).await {
            Ok(()) => {
                info!(
                    target: "wire.subscriber",
                    application = %client.application_id(),
                    device_id = %device_id,
                    app_topic = %app_topic,
                    "topic_unsubscribed"
                );
                CallOutcome::Issued
            }
            Err(err) => {
                record_unsubscribe_failure();
                warn!(
                    target: "wire.subscriber",
                    device_id = %device_id,
                    app_topic = %app_topic,
                    error = %err,
                    "unsubscribe_failed"
                );
                CallOutcome::Failed
            }
        }
    }

    /// 注销监听器并释放客户端；没有客户端时什么也不做。
    pub async fn teardown(&mut self) {
        let Some(client) = self.client.take() else {
            return;
        };
        client.remove_listener(&self.listener);
        client.release().await;
        debug!(
            target: "wire.subscriber",
            application = %client.application_id(),
            "client_released"
        );
    }
}
