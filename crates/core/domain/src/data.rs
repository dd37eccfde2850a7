use std::fmt;

/// 约定的严重级别标记指标名。
pub const SEVERITY_FLAG_METRIC: &str = "asset_flag";

/// 入站载荷中的动态类型指标值。
///
/// 覆盖消息层可能投递的全部运行时类型；其中 `Float`、`List`、`Map`、`Null`
/// 没有对应的类型化值，转换时回落为空字符串。
#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    Boolean(bool),
    Byte(i8),
    Short(i16),
    Integer(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
    Bytes(Vec<u8>),
    List(Vec<MetricValue>),
    Map(Vec<(String, MetricValue)>),
    Null,
}

impl MetricValue {
    /// 运行时类型名（用于日志）。
    pub fn kind(&self) -> &'static str {
        match self {
            MetricValue::Boolean(_) => "boolean",
            MetricValue::Byte(_) => "byte",
            MetricValue::Short(_) => "short",
            MetricValue::Integer(_) => "integer",
            MetricValue::Long(_) => "long",
            MetricValue::Float(_) => "float",
            MetricValue::Double(_) => "double",
            MetricValue::String(_) => "string",
            MetricValue::Bytes(_) => "bytes",
            MetricValue::List(_) => "list",
            MetricValue::Map(_) => "map",
            MetricValue::Null => "null",
        }
    }
}

/// 指标值的字符串形式，与严重级别标记比对时使用。
impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Boolean(value) => write!(f, "{}", value),
            MetricValue::Byte(value) => write!(f, "{}", value),
            MetricValue::Short(value) => write!(f, "{}", value),
            MetricValue::Integer(value) => write!(f, "{}", value),
            MetricValue::Long(value) => write!(f, "{}", value),
            MetricValue::Float(value) => write!(f, "{}", value),
            MetricValue::Double(value) => write!(f, "{}", value),
            MetricValue::String(value) => f.write_str(value),
            MetricValue::Bytes(value) => write!(f, "{:?}", value),
            MetricValue::List(items) => {
                f.write_str("[")?;
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            MetricValue::Map(entries) => {
                f.write_str("{")?;
                for (index, (key, value)) in entries.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}={}", key, value)?;
                }
                f.write_str("}")
            }
            MetricValue::Null => f.write_str("null"),
        }
    }
}

/// 云端入站载荷：按插入顺序保存的指标集合。
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CloudPayload {
    pub timestamp_ms: Option<i64>,
    metrics: Vec<(String, MetricValue)>,
}

impl CloudPayload {
    pub fn new() -> Self {
        Self::default()
    }

    /// 写入指标；同名指标原位覆盖。空名称被拒绝并返回 `false`。
    pub fn add_metric(&mut self, name: impl Into<String>, value: MetricValue) -> bool {
        let name = name.into();
        if name.is_empty() {
            return false;
        }
        match self.metrics.iter_mut().find(|(key, _)| *key == name) {
            Some((_, existing)) => *existing = value,
            None => self.metrics.push((name, value)),
        }
        true
    }

    pub fn with_metric(mut self, name: impl Into<String>, value: MetricValue) -> Self {
        self.add_metric(name, value);
        self
    }

    pub fn metric(&self, name: &str) -> Option<&MetricValue> {
        self.metrics
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    pub fn metric_names(&self) -> impl Iterator<Item = &str> {
        self.metrics.iter().map(|(key, _)| key.as_str())
    }

    pub fn metrics(&self) -> impl Iterator<Item = (&str, &MetricValue)> {
        self.metrics.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}
