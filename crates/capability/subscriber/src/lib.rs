//! # 云订阅 Wire 组件
//!
//! 把外部发布/订阅连接桥接到本地数据流：
//!
//! ```text
//! ProviderRegistry ──► ProviderTracker ──► CloudSubscriber（串行化的状态变更）
//!                                               │
//!                                               ▼
//!                                     SubscriptionManager ──► CloudClient.subscribe
//!                                                                   │
//!                       WireEmitter ◄── translator ◄── on_message_arrived
//! ```
//!
//! 生命周期入口：[`CloudSubscriber::activate`]、[`CloudSubscriber::updated`]、
//! [`CloudSubscriber::deactivate`]。所有失败路径只记录日志并保持当前状态，
//! 等待下一次提供者或连接事件触发恢复。

mod component;
mod emitter;
mod error;
mod subscription;
mod translator;

pub use component::{CloudSubscriber, Lifecycle, SubscriptionSnapshot};
pub use emitter::{ChannelEmitter, WireEmitter};
pub use error::SubscriberError;
pub use subscription::{CallOutcome, SkipReason, SubscriptionManager};
pub use translator::{TranslateError, build_wire_record, severity_of, to_typed_value};
