use std::fmt;

/// 类型化值的类型标签。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Boolean,
    Byte,
    Short,
    Integer,
    Long,
    Double,
    String,
    ByteArray,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Boolean => "BOOLEAN",
            DataType::Byte => "BYTE",
            DataType::Short => "SHORT",
            DataType::Integer => "INTEGER",
            DataType::Long => "LONG",
            DataType::Double => "DOUBLE",
            DataType::String => "STRING",
            DataType::ByteArray => "BYTE_ARRAY",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 类型化值（构造后不可变）。
///
/// 封闭的基础类型集合，每个变体只携带一种值；下游按 [`TypedValue::data_type`] 分派。
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    Boolean(bool),
    Byte(i8),
    Short(i16),
    Integer(i32),
    Long(i64),
    Double(f64),
    String(String),
    ByteArray(Vec<u8>),
}

impl TypedValue {
    /// 空字符串值：无法识别的动态类型统一回落到该值。
    pub fn empty_string() -> Self {
        TypedValue::String(String::new())
    }

    pub fn data_type(&self) -> DataType {
        match self {
            TypedValue::Boolean(_) => DataType::Boolean,
            TypedValue::Byte(_) => DataType::Byte,
            TypedValue::Short(_) => DataType::Short,
            TypedValue::Integer(_) => DataType::Integer,
            TypedValue::Long(_) => DataType::Long,
            TypedValue::Double(_) => DataType::Double,
            TypedValue::String(_) => DataType::String,
            TypedValue::ByteArray(_) => DataType::ByteArray,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            TypedValue::Boolean(value) => Some(*value),
            _ => None,
        }
    }

    /// 整数族（byte/short/integer/long）统一读取为 i64。
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            TypedValue::Byte(value) => Some(i64::from(*value)),
            TypedValue::Short(value) => Some(i64::from(*value)),
            TypedValue::Integer(value) => Some(i64::from(*value)),
            TypedValue::Long(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            TypedValue::Double(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            TypedValue::String(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            TypedValue::ByteArray(value) => Some(value.as_slice()),
            _ => None,
        }
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypedValue::Boolean(value) => write!(f, "{}", value),
            TypedValue::Byte(value) => write!(f, "{}", value),
            TypedValue::Short(value) => write!(f, "{}", value),
            TypedValue::Integer(value) => write!(f, "{}", value),
            TypedValue::Long(value) => write!(f, "{}", value),
            TypedValue::Double(value) => write!(f, "{}", value),
            TypedValue::String(value) => f.write_str(value),
            TypedValue::ByteArray(value) => {
                for byte in value {
                    write!(f, "{:02x}", byte)?;
                }
                Ok(())
            }
        }
    }
}

impl From<bool> for TypedValue {
    fn from(value: bool) -> Self {
        TypedValue::Boolean(value)
    }
}

impl From<i8> for TypedValue {
    fn from(value: i8) -> Self {
        TypedValue::Byte(value)
    }
}

impl From<i16> for TypedValue {
    fn from(value: i16) -> Self {
        TypedValue::Short(value)
    }
}

impl From<i32> for TypedValue {
    fn from(value: i32) -> Self {
        TypedValue::Integer(value)
    }
}

impl From<i64> for TypedValue {
    fn from(value: i64) -> Self {
        TypedValue::Long(value)
    }
}

impl From<f64> for TypedValue {
    fn from(value: f64) -> Self {
        TypedValue::Double(value)
    }
}

impl From<String> for TypedValue {
    fn from(value: String) -> Self {
        TypedValue::String(value)
    }
}

impl From<&str> for TypedValue {
    fn from(value: &str) -> Self {
        TypedValue::String(value.to_string())
    }
}

impl From<Vec<u8>> for TypedValue {
    fn from(value: Vec<u8>) -> Self {
        TypedValue::ByteArray(value)
    }
}
