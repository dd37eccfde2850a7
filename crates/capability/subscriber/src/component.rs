//! 订阅组件：组合提供者追踪、订阅管理与消息转换。
//!
//! 所有状态变更（激活、重配置、停用、提供者事件、连接建立）都在同一把
//! `tokio::sync::Mutex` 下串行执行；入站消息路径只读取 `ArcSwap` 快照，不争用该锁。

use crate::emitter::WireEmitter;
use crate::error::SubscriberError;
use crate::subscription::{CallOutcome, SubscriptionManager};
use crate::translator::{TranslateError, build_wire_record};
use arc_swap::ArcSwap;
use domain::CloudPayload;
use std::sync::{Arc, Weak};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use wire_cloud::{
    CloudClientListener, CloudService, ProviderEvent, ProviderEventKind, ProviderFilter,
    ProviderRegistry, ProviderTracker,
};
use wire_config::{ComponentProperties, SubscriberOptions};
use wire_telemetry::{
    record_message_received, record_null_payload, record_provider_event, record_record_emitted,
};

/// 组件生命周期。`Deactivated` 为终态。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Inactive,
    Active,
    Reconfiguring,
    Deactivated,
}

/// 组件状态的只读快照，每次状态变更后原子替换。
#[derive(Debug, Clone)]
pub struct SubscriptionSnapshot {
    pub lifecycle: Lifecycle,
    pub options: Option<Arc<SubscriberOptions>>,
    /// 当前生效（用于订阅与取消订阅）的 device/topic。
    pub device_id: Option<String>,
    pub app_topic: Option<String>,
    pub provider_pid: Option<String>,
    pub client_application: Option<String>,
}

impl SubscriptionSnapshot {
    fn inactive() -> Self {
        Self {
            lifecycle: Lifecycle::Inactive,
            options: None,
            device_id: None,
            app_topic: None,
            provider_pid: None,
            client_application: None,
        }
    }

    /// 是否向下游发出记录。
    pub fn is_accepting(&self) -> bool {
        self.lifecycle == Lifecycle::Active
    }
}

enum ComponentEvent {
    Provider(ProviderEvent),
    ConnectionEstablished,
}

/// 消息路径共享的部分（不持有组件本身，避免引用环）。
struct Shared {
    emitter: Arc<dyn WireEmitter>,
    snapshot: ArcSwap<SubscriptionSnapshot>,
    events: mpsc::UnboundedSender<ComponentEvent>,
}

/// 登记到客户端上的监听器。
struct SubscriberListener {
    shared: Arc<Shared>,
}

impl CloudClientListener for SubscriberListener {
    fn on_message_arrived(
        &self,
        device_id: &str,
        app_topic: &str,
        payload: Option<&CloudPayload>,
        qos: u8,
        retain: bool,
    ) {
        record_message_received();
        let snapshot = self.shared.snapshot.load();
        if !snapshot.is_accepting() {
            debug!(
                target: "wire.subscriber",
                device_id = %device_id,
                app_topic = %app_topic,
                lifecycle = ?snapshot.lifecycle,
                "message_dropped_inactive"
            );
            return;
        }
        match build_wire_record(payload) {
            Ok(record) => {
                debug!(
                    target: "wire.subscriber",
                    device_id = %device_id,
                    app_topic = %app_topic,
                    qos = qos,
                    retain = retain,
                    fields = record.len(),
                    severity = %record.severity(),
                    "record_emitted"
                );
                self.shared.emitter.emit(record);
                record_record_emitted();
            }
            Err(TranslateError::NullPayload) => {
                record_null_payload();
                warn!(
                    target: "wire.subscriber",
                    device_id = %device_id,
                    app_topic = %app_topic,
                    "null_payload_skipped"
                );
            }
        }
    }

    fn on_control_message_arrived(
        &self,
        device_id: &str,
        app_topic: &str,
        _payload: Option<&CloudPayload>,
        _qos: u8,
        _retain: bool,
    ) {
        debug!(
            target: "wire.subscriber",
            device_id = %device_id,
            app_topic = %app_topic,
            "control_message_ignored"
        );
    }

    fn on_connection_established(&self) {
        if self
            .shared
            .events
            .send(ComponentEvent::ConnectionEstablished)
            .is_err()
        {
            debug!("component gone, connection event dropped");
        }
    }

    fn on_connection_lost(&self) {
        debug!("cloud connection lost");
    }
}

struct ComponentState {
    lifecycle: Lifecycle,
    options: Option<Arc<SubscriberOptions>>,
    device_id: Option<String>,
    app_topic: Option<String>,
    provider_pid: Option<String>,
    provider: Option<Arc<dyn CloudService>>,
    subscription: SubscriptionManager,
    tracker: Option<ProviderTracker>,
    generation: u64,
    events: Option<mpsc::UnboundedReceiver<ComponentEvent>>,
    dispatcher: Option<JoinHandle<()>>,
}

impl Drop for ComponentState {
    fn drop(&mut self) {
        if let Some(dispatcher) = self.dispatcher.take() {
            dispatcher.abort();
        }
    }
}

struct ComponentInner {
    registry: ProviderRegistry,
    shared: Arc<Shared>,
    state: Mutex<ComponentState>,
}

/// 云订阅组件。
///
/// 按配置的提供者标识动态绑定连接提供者，维护至多一个客户端与一组订阅，
/// 并把入站消息转换为 Wire 记录发往下游。可廉价克隆，克隆共享同一实例。
#[derive(Clone)]
pub struct CloudSubscriber {
    inner: Arc<ComponentInner>,
}

impl CloudSubscriber {
    pub fn new(registry: ProviderRegistry, emitter: Arc<dyn WireEmitter>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            emitter,
            snapshot: ArcSwap::from_pointee(SubscriptionSnapshot::inactive()),
            events: events_tx,
        });
        let listener: Arc<dyn CloudClientListener> = Arc::new(SubscriberListener {
            shared: shared.clone(),
        });
        let state = ComponentState {
            lifecycle: Lifecycle::Inactive,
            options: None,
            device_id: None,
            app_topic: None,
            provider_pid: None,
            provider: None,
            subscription: SubscriptionManager::new(listener),
            tracker: None,
            generation: 0,
            events: Some(events_rx),
            dispatcher: None,
        };
        Self {
            inner: Arc::new(ComponentInner {
                registry,
                shared,
                state: Mutex::new(state),
            }),
        }
    }

    /// 激活：解析选项并开始追踪提供者。已激活时等同于 [`Self::updated`]。
    ///
    /// 选项非法时保持未激活；提供者标识非法时组件已激活但未追踪，
    /// 两种情况都返回错误，之后可用合法配置调用 `updated` 恢复。
    pub async fn activate(&self, properties: &ComponentProperties) -> Result<(), SubscriberError> {
        let mut state = self.inner.state.lock().await;
        let result = match state.lifecycle {
            Lifecycle::Deactivated => Err(SubscriberError::Terminated),
            Lifecycle::Inactive => self.inner.activate_locked(&mut state, properties).await,
            Lifecycle::Active | Lifecycle::Reconfiguring => {
                self.inner.reconfigure_locked(&mut state, properties).await
            }
        };
        self.inner.publish_snapshot(&state);
        result
    }

    /// 重配置：先用旧的 device/topic 取消订阅，再按新标识重启追踪并替换选项。
    ///
    /// 新选项非法时维持原配置不变。
    pub async fn updated(&self, properties: &ComponentProperties) -> Result<(), SubscriberError> {
        let mut state = self.inner.state.lock().await;
        let result = match state.lifecycle {
            Lifecycle::Deactivated => Err(SubscriberError::Terminated),
            Lifecycle::Inactive => self.inner.activate_locked(&mut state, properties).await,
            Lifecycle::Active | Lifecycle::Reconfiguring => {
                self.inner.reconfigure_locked(&mut state, properties).await
            }
        };
        self.inner.publish_snapshot(&state);
        result
    }

    /// 停用：取消订阅、释放客户端、停止追踪。之后不再接受任何生命周期调用。
    pub async fn deactivate(&self) {
        let mut state = self.inner.state.lock().await;
        if state.lifecycle == Lifecycle::Deactivated {
            return;
        }
        info!("deactivating cloud subscriber");
        let outcome = state
            .subscription
            .unsubscribe(state.device_id.as_deref(), state.app_topic.as_deref())
            .await;
        debug!(outcome = ?outcome, "unsubscribed before deactivation");
        state.subscription.teardown().await;
        if let Some(tracker) = state.tracker.take() {
            tracker.close();
        }
        if let Some(dispatcher) = state.dispatcher.take() {
            dispatcher.abort();
        }
        state.events = None;
        state.provider = None;
        state.provider_pid = None;
        state.lifecycle = Lifecycle::Deactivated;
        self.inner.publish_snapshot(&state);
        info!("cloud subscriber deactivated");
    }

    pub fn snapshot(&self) -> Arc<SubscriptionSnapshot> {
        self.inner.shared.snapshot.load_full()
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.inner.shared.snapshot.load().lifecycle
    }
}

impl ComponentInner {
    async fn activate_locked(
        self: &Arc<Self>,
        state: &mut ComponentState,
        properties: &ComponentProperties,
    ) -> Result<(), SubscriberError> {
        info!("activating cloud subscriber");
        let options = SubscriberOptions::from_properties(properties).map_err(|err| {
            error!(error = %err, "invalid subscriber options");
            SubscriberError::from(err)
        })?;
        state.device_id = options.device_id().map(str::to_string);
        state.app_topic = options.app_topic().map(str::to_string);
        state.options = Some(options);
        state.lifecycle = Lifecycle::Active;
        // 订阅调用期间即可能到达保留消息，先对消息路径可见。
        self.publish_snapshot(state);
        if let Some(events) = state.events.take() {
            state.dispatcher = Some(spawn_dispatcher(Arc::downgrade(self), events));
        }
        let result = self.start_tracking(state).await;
        info!(lifecycle = ?state.lifecycle, "cloud subscriber activated");
        result
    }

    async fn reconfigure_locked(
        self: &Arc<Self>,
        state: &mut ComponentState,
        properties: &ComponentProperties,
    ) -> Result<(), SubscriberError> {
        info!("updating cloud subscriber");
        let options = SubscriberOptions::from_properties(properties).map_err(|err| {
            error!(error = %err, "invalid subscriber options");
            SubscriberError::from(err)
        })?;
        state.lifecycle = Lifecycle::Reconfiguring;
        self.publish_snapshot(state);

        let outcome = state
            .subscription
            .unsubscribe(state.device_id.as_deref(), state.app_topic.as_deref())
            .await;
        debug!(outcome = ?outcome, "unsubscribed previous target");
        if let Some(tracker) = state.tracker.take() {
            tracker.close();
        }
        state.subscription.teardown().await;
        state.provider = None;
        state.provider_pid = None;

        state.device_id = options.device_id().map(str::to_string);
        state.app_topic = options.app_topic().map(str::to_string);
        state.options = Some(options);
        state.lifecycle = Lifecycle::Active;
        self.publish_snapshot(state);
        let result = self.start_tracking(state).await;
        info!(
            device_id = ?state.device_id,
            app_topic = ?state.app_topic,
            "cloud subscriber updated"
        );
        result
    }

    /// 按当前选项（重新）打开提供者追踪器；当前已匹配的提供者立即绑定。
    async fn start_tracking(&self, state: &mut ComponentState) -> Result<(), SubscriberError> {
        if let Some(tracker) = state.tracker.take() {
            tracker.close();
        }
        state.generation += 1;
        let Some(options) = state.options.clone() else {
            return Ok(());
        };
        let filter = ProviderFilter::for_pid(options.cloud_service_pid()).map_err(|err| {
            error!(
                target: "wire.subscriber",
                provider_pid = %options.cloud_service_pid(),
                error = %err,
                "provider_filter_invalid"
            );
            SubscriberError::InvalidFilter(err)
        })?;
        info!(
            target: "wire.subscriber",
            filter = %filter,
            generation = state.generation,
            "provider_tracking_started"
        );
        let events = self.shared.events.clone();
        let (tracker, initial) =
            ProviderTracker::open(&self.registry, filter, state.generation, move |event| {
                events.send(ComponentEvent::Provider(event)).is_ok()
            });
        state.tracker = Some(tracker);
        if let Some((pid, provider)) = initial {
            record_provider_event();
            self.bind_provider(state, pid, provider).await;
        }
        Ok(())
    }

    /// 提供者出现或变更：重建客户端并按当前目标订阅。
    async fn bind_provider(
        &self,
        state: &mut ComponentState,
        pid: String,
        provider: Arc<dyn CloudService>,
    ) {
        state.provider = Some(provider.clone());
        state.provider_pid = Some(pid.clone());
        let Some(options) = state.options.clone() else {
            return;
        };
        if let Err(err) = state
            .subscription
            .setup_client(&provider, options.application())
            .await
        {
            warn!(
                target: "wire.subscriber",
                provider_pid = %pid,
                application = %options.application(),
                error = %err,
                "client_setup_failed"
            );
            return;
        }
        self.subscribe_current(state).await;
    }

    async fn subscribe_current(&self, state: &ComponentState) {
        let qos = state
            .options
            .as_ref()
            .map(|options| options.qos())
            .unwrap_or_default();
        match state
            .subscription
            .subscribe(
                state.provider.as_deref(),
                state.device_id.as_deref(),
                state.app_topic.as_deref(),
                qos,
            )
            .await
        {
            Ok(CallOutcome::Skipped(reason)) => {
                debug!(reason = ?reason, "subscribe skipped");
            }
            Ok(_) => {}
            Err(err) => {
                warn!(
                    target: "wire.subscriber",
                    device_id = ?state.device_id,
                    app_topic = ?state.app_topic,
                    error = %err,
                    "subscribe_failed"
                );
            }
        }
    }

    async fn handle_event(&self, event: ComponentEvent) {
        let mut state = self.state.lock().await;
        if state.lifecycle != Lifecycle::Active {
            debug!(lifecycle = ?state.lifecycle, "event ignored while not active");
            return;
        }
        match event {
            ComponentEvent::Provider(event) => {
                if event.generation != state.generation {
                    debug!(
                        target: "wire.subscriber",
                        generation = event.generation,
                        current = state.generation,
                        "stale_provider_event"
                    );
                    return;
                }
                record_provider_event();
                match event.kind {
                    ProviderEventKind::Available(provider) | ProviderEventKind::Updated(provider) => {
                        info!(
                            target: "wire.subscriber",
                            provider_pid = %event.pid,
                            connected = provider.is_connected(),
                            "provider_bound"
                        );
                        self.bind_provider(&mut state, event.pid, provider).await;
                    }
                    ProviderEventKind::Removed => {
                        info!(provider_pid = %event.pid, "cloud service removed");
                        state.provider = None;
                        state.provider_pid = None;
                    }
                }
            }
            ComponentEvent::ConnectionEstablished => {
                info!("cloud connection established, resubscribing");
                if state.device_id.is_some() && state.app_topic.is_some() {
                    self.subscribe_current(&state).await;
                }
            }
        }
        self.publish_snapshot(&state);
    }

    fn publish_snapshot(&self, state: &ComponentState) {
        self.shared.snapshot.store(Arc::new(SubscriptionSnapshot {
            lifecycle: state.lifecycle,
            options: state.options.clone(),
            device_id: state.device_id.clone(),
            app_topic: state.app_topic.clone(),
            provider_pid: state.provider_pid.clone(),
            client_application: state
                .subscription
                .client_application()
                .map(str::to_string),
        }));
    }
}

/// 事件分发任务：把追踪与连接事件逐个送入加锁的状态变更路径。
fn spawn_dispatcher(
    inner: Weak<ComponentInner>,
    mut events: mpsc::UnboundedReceiver<ComponentEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let Some(inner) = inner.upgrade() else {
                break;
            };
            inner.handle_event(event).await;
        }
    })
}
