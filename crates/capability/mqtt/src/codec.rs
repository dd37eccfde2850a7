//! JSON 载荷编解码。
//!
//! 支持两种形态：
//! - 信封：`{"metrics": {...}, "timestamp": 1700000000000}`
//! - 扁平对象：`{"temperature": 21.5, "running": true}`
//!
//! 指标顺序与 JSON 中的键顺序一致。

use domain::{CloudPayload, MetricValue};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use wire_cloud::CloudError;

/// 信封只允许 `metrics` 与 `timestamp` 两个键，其余情况都按扁平对象处理。
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct Envelope {
    metrics: Map<String, Value>,
    #[serde(default)]
    timestamp: Option<i64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum InboundPayload {
    Envelope(Envelope),
    Flat(Map<String, Value>),
}

#[derive(Serialize)]
struct OutboundPayload {
    metrics: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    timestamp: Option<i64>,
}

/// 解码入站载荷；空载荷、非法 JSON 或非对象返回 `None`。
pub fn decode_payload(bytes: &[u8]) -> Option<CloudPayload> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return None;
    }
    let (metrics, timestamp) = match serde_json::from_slice::<InboundPayload>(bytes).ok()? {
        InboundPayload::Envelope(envelope) => (envelope.metrics, envelope.timestamp),
        InboundPayload::Flat(metrics) => (metrics, None),
    };
    let mut payload = CloudPayload::new();
    payload.timestamp_ms = timestamp;
    for (name, value) in metrics {
        payload.add_metric(name, metric_from_json(value));
    }
    Some(payload)
}

/// 编码为信封形态。
pub fn encode_payload(payload: &CloudPayload) -> Result<Vec<u8>, CloudError> {
    let metrics = payload
        .metrics()
        .map(|(name, value)| (name.to_string(), metric_to_json(value)))
        .collect();
    let outbound = OutboundPayload {
        metrics,
        timestamp: payload.timestamp_ms,
    };
    serde_json::to_vec(&outbound).map_err(|err| CloudError::Publish(err.to_string()))
}

fn metric_from_json(value: Value) -> MetricValue {
    match value {
        Value::Bool(value) => MetricValue::Boolean(value),
        Value::Number(number) => number_to_metric(&number),
        Value::String(value) => MetricValue::String(value),
        Value::Array(items) => MetricValue::List(items.into_iter().map(metric_from_json).collect()),
        Value::Object(entries) => MetricValue::Map(
            entries
                .into_iter()
                .map(|(name, value)| (name, metric_from_json(value)))
                .collect(),
        ),
        Value::Null => MetricValue::Null,
    }
}

fn number_to_metric(number: &Number) -> MetricValue {
    if let Some(value) = number.as_i64() {
        return match i32::try_from(value) {
            Ok(value) => MetricValue::Integer(value),
            Err(_) => MetricValue::Long(value),
        };
    }
    // u64 超出 i64 范围或非整数。
    MetricValue::Double(number.as_f64().unwrap_or(f64::NAN))
}

fn metric_to_json(value: &MetricValue) -> Value {
    match value {
        MetricValue::Boolean(value) => Value::Bool(*value),
        MetricValue::Byte(value) => Value::from(*value),
        MetricValue::Short(value) => Value::from(*value),
        MetricValue::Integer(value) => Value::from(*value),
        MetricValue::Long(value) => Value::from(*value),
        MetricValue::Float(value) => float_to_json(f64::from(*value)),
        MetricValue::Double(value) => float_to_json(*value),
        MetricValue::String(value) => Value::String(value.clone()),
        MetricValue::Bytes(bytes) => Value::Array(bytes.iter().map(|byte| Value::from(*byte)).collect()),
        MetricValue::List(items) => Value::Array(items.iter().map(metric_to_json).collect()),
        MetricValue::Map(entries) => Value::Object(
            entries
                .iter()
                .map(|(name, value)| (name.clone(), metric_to_json(value)))
                .collect(),
        ),
        MetricValue::Null => Value::Null,
    }
}

fn float_to_json(value: f64) -> Value {
    Number::from_f64(value).map(Value::Number).unwrap_or(Value::Null)
}
