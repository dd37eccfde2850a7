//! MQTT 连接提供者。
//!
//! [`MqttCloudService`] 实现 `wire_cloud::CloudService`：单条 broker 连接，
//! 按应用标识派生客户端；载荷为 JSON（见 [`codec`]），topic 布局见 [`topic`]。

pub mod codec;
mod service;
pub mod topic;

pub use codec::{decode_payload, encode_payload};
pub use service::{MqttCloudService, MqttProviderConfig};
pub use topic::{InboundTopic, TopicKind, TopicLayout};
