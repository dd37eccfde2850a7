//! 云连接错误类型定义

/// 云连接错误
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CloudError {
    /// 无法创建客户端
    #[error("connection error: {0}")]
    Connection(String),

    /// 提供者未连接
    #[error("not connected")]
    NotConnected,

    /// 订阅失败
    #[error("subscribe error: {0}")]
    Subscribe(String),

    /// 取消订阅失败
    #[error("unsubscribe error: {0}")]
    Unsubscribe(String),

    /// 发布失败
    #[error("publish error: {0}")]
    Publish(String),

    /// 客户端已释放
    #[error("client released")]
    Released,

    /// 提供者过滤条件非法
    #[error("invalid provider filter: {0}")]
    InvalidFilter(String),
}
