//! 日志初始化与订阅链路计数指标。

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::{EnvFilter, fmt};

/// 指标快照。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub messages_received: u64,
    pub records_emitted: u64,
    pub null_payloads: u64,
    pub fallback_values: u64,
    pub client_setups: u64,
    pub client_setup_failures: u64,
    pub subscribe_issued: u64,
    pub subscribe_failures: u64,
    pub unsubscribe_issued: u64,
    pub unsubscribe_failures: u64,
    pub provider_events: u64,
}

/// 订阅链路计数器（进程级）。
pub struct TelemetryMetrics {
    messages_received: AtomicU64,
    records_emitted: AtomicU64,
    null_payloads: AtomicU64,
    fallback_values: AtomicU64,
    client_setups: AtomicU64,
    client_setup_failures: AtomicU64,
    subscribe_issued: AtomicU64,
    subscribe_failures: AtomicU64,
    unsubscribe_issued: AtomicU64,
    unsubscribe_failures: AtomicU64,
    provider_events: AtomicU64,
}

impl TelemetryMetrics {
    pub fn new() -> Self {
        Self {
            messages_received: AtomicU64::new(0),
            records_emitted: AtomicU64::new(0),
            null_payloads: AtomicU64::new(0),
            fallback_values: AtomicU64::new(0),
            client_setups: AtomicU64::new(0),
            client_setup_failures: AtomicU64::new(0),
            subscribe_issued: AtomicU64::new(0),
            subscribe_failures: AtomicU64::new(0),
            unsubscribe_issued: AtomicU64::new(0),
            unsubscribe_failures: AtomicU64::new(0),
            provider_events: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            messages_received: self.messages_received.load(Ordering::Relaxed),
            records_emitted: self.records_emitted.load(Ordering::Relaxed),
            null_payloads: self.null_payloads.load(Ordering::Relaxed),
            fallback_values: self.fallback_values.load(Ordering::Relaxed),
            client_setups: self.client_setups.load(Ordering::Relaxed),
            client_setup_failures: self.client_setup_failures.load(Ordering::Relaxed),
            subscribe_issued: self.subscribe_issued.load(Ordering::Relaxed),
            subscribe_failures: self.subscribe_failures.load(Ordering::Relaxed),
            unsubscribe_issued: self.unsubscribe_issued.load(Ordering::Relaxed),
            unsubscribe_failures: self.unsubscribe_failures.load(Ordering::Relaxed),
            provider_events: self.provider_events.load(Ordering::Relaxed),
        }
    }
}

impl Default for TelemetryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

static METRICS: OnceLock<TelemetryMetrics> = OnceLock::new();

/// 获取全局指标实例。
pub fn metrics() -> &'static TelemetryMetrics {
    METRICS.get_or_init(TelemetryMetrics::new)
}

/// 初始化 tracing（默认 info）。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

/// 记录入站消息次数。
pub fn record_message_received() {
    metrics().messages_received.fetch_add(1, Ordering::Relaxed);
}

/// 记录向下游发出的记录数。
pub fn record_record_emitted() {
    metrics().records_emitted.fetch_add(1, Ordering::Relaxed);
}

/// 记录空载荷次数。
pub fn record_null_payload() {
    metrics().null_payloads.fetch_add(1, Ordering::Relaxed);
}

/// 记录回落为空字符串的指标值个数。
pub fn record_fallback_value() {
    metrics().fallback_values.fetch_add(1, Ordering::Relaxed);
}

/// 记录客户端创建成功次数。
pub fn record_client_setup() {
    metrics().client_setups.fetch_add(1, Ordering::Relaxed);
}

/// 记录客户端创建失败次数。
pub fn record_client_setup_failure() {
    metrics()
        .client_setup_failures
        .fetch_add(1, Ordering::Relaxed);
}

/// 记录已下发的订阅请求次数。
pub fn record_subscribe_issued() {
    metrics().subscribe_issued.fetch_add(1, Ordering::Relaxed);
}

/// 记录订阅失败次数。
pub fn record_subscribe_failure() {
    metrics().subscribe_failures.fetch_add(1, Ordering::Relaxed);
}

/// 记录已下发的取消订阅请求次数。
pub fn record_unsubscribe_issued() {
    metrics().unsubscribe_issued.fetch_add(1, Ordering::Relaxed);
}

/// 记录取消订阅失败次数（失败只记录，不向上传播）。
pub fn record_unsubscribe_failure() {
    metrics()
        .unsubscribe_failures
        .fetch_add(1, Ordering::Relaxed);
}

/// 记录提供者追踪事件次数。
pub fn record_provider_event() {
    metrics().provider_events.fetch_add(1, Ordering::Relaxed);
}
