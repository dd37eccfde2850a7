//! 订阅组件共享的领域模型：类型化值、Wire 记录与云端入站载荷。

pub mod data;
pub mod typed_value;
pub mod wire;

pub use data::{CloudPayload, MetricValue, SEVERITY_FLAG_METRIC};
pub use typed_value::{DataType, TypedValue};
pub use wire::{SeverityLevel, WireField, WireRecord};
