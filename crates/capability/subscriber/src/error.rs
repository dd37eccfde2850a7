use wire_cloud::CloudError;
use wire_config::ConfigError;

/// 订阅组件错误。
///
/// 都不是致命错误：调用方记录后保持当前状态，等待下一次事件。
#[derive(Debug, thiserror::Error)]
pub enum SubscriberError {
    /// 选项无法解析（配置错误）。
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),
    /// 提供者标识过滤条件非法（配置错误），追踪未启动。
    #[error("provider filter error: {0}")]
    InvalidFilter(CloudError),
    /// 提供者无法创建客户端（通常是尚未连接）。
    #[error("connection error: {0}")]
    Connection(CloudError),
    #[error("subscribe failed: {0}")]
    Subscribe(CloudError),
    /// 组件已停用，不再接受生命周期调用。
    #[error("component deactivated")]
    Terminated,
}
