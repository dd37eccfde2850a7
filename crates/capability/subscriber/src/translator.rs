//! 入站载荷 -> Wire 记录。

use domain::{
    CloudPayload, MetricValue, SEVERITY_FLAG_METRIC, SeverityLevel, TypedValue, WireField,
    WireRecord,
};
use tracing::debug;
use wire_telemetry::record_fallback_value;

/// 转换错误。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TranslateError {
    #[error("payload must not be null")]
    NullPayload,
}

/// 由载荷中的 `asset_flag` 指标决定整条记录的严重级别。
///
/// 指标的字符串形式忽略大小写等于 `ERROR` 时为 ERROR，其余（含缺失）为 INFO。
pub fn severity_of(payload: &CloudPayload) -> SeverityLevel {
    match payload.metric(SEVERITY_FLAG_METRIC) {
        Some(flag) if flag.to_string().eq_ignore_ascii_case("ERROR") => SeverityLevel::Error,
        _ => SeverityLevel::Info,
    }
}

/// 动态值映射为类型化值；不支持的类型返回 `None`。
///
/// 判定顺序：boolean、byte、long、double、integer、short、string、bytes。
pub fn to_typed_value(value: &MetricValue) -> Option<TypedValue> {
    match value {
        MetricValue::Boolean(value) => Some(TypedValue::Boolean(*value)),
        MetricValue::Byte(value) => Some(TypedValue::Byte(*value)),
        MetricValue::Long(value) => Some(TypedValue::Long(*value)),
        MetricValue::Double(value) => Some(TypedValue::Double(*value)),
        MetricValue::Integer(value) => Some(TypedValue::Integer(*value)),
        MetricValue::Short(value) => Some(TypedValue::Short(*value)),
        MetricValue::String(value) => Some(TypedValue::String(value.clone())),
        MetricValue::Bytes(value) => Some(TypedValue::ByteArray(value.clone())),
        MetricValue::Float(_) | MetricValue::List(_) | MetricValue::Map(_) | MetricValue::Null => {
            None
        }
    }
}

/// 把载荷转换为一条记录：每个指标一个字段，顺序与载荷一致。
///
/// `asset_flag` 本身也作为普通字段输出；不支持的值类型以空字符串输出，字段不会丢失。
pub fn build_wire_record(payload: Option<&CloudPayload>) -> Result<WireRecord, TranslateError> {
    let payload = payload.ok_or(TranslateError::NullPayload)?;
    let severity = severity_of(payload);
    let fields = payload.metrics().map(|(name, value)| {
        let typed = to_typed_value(value).unwrap_or_else(|| {
            record_fallback_value();
            debug!(
                target: "wire.subscriber",
                metric = %name,
                kind = value.kind(),
                "metric_value_fallback"
            );
            TypedValue::empty_string()
        });
        WireField::new(name, typed, severity)
    });
    Ok(WireRecord::new(fields))
}
