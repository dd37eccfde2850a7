//! # 云连接能力模块
//!
//! 定义订阅组件所依赖的外部协作方契约：
//! - **CloudService**：消息连接提供者（判断连接状态、按应用创建客户端）
//! - **CloudClient**：连接范围内的客户端（订阅、取消订阅、发布、监听器注册）
//! - **CloudClientListener**：入站消息与连接事件回调
//!
//! 并提供动态发现所需的注册表与追踪器：
//!
//! ```text
//! ProviderRegistry (register / modify / unregister)
//!       │  broadcast RegistryEvent
//!       ▼
//! ProviderTracker (按 ProviderFilter 过滤)
//!       │  ProviderEvent { generation, Available | Updated | Removed }
//!       ▼
//! 订阅组件的事件通道
//! ```

mod error;
mod in_memory;
mod registry;
mod service;
mod tracker;

pub use error::CloudError;
pub use in_memory::{CloudCall, InMemoryCloudService};
pub use registry::{ProviderFilter, ProviderRegistry, RegistryEvent};
pub use service::{CloudClient, CloudClientListener, CloudService, ListenerSet};
pub use tracker::{ProviderEvent, ProviderEventKind, ProviderTracker};
