use crate::typed_value::TypedValue;
use std::fmt;

/// 字段严重级别。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SeverityLevel {
    #[default]
    Info,
    Error,
}

impl SeverityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeverityLevel::Info => "INFO",
            SeverityLevel::Error => "ERROR",
        }
    }
}

impl fmt::Display for SeverityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wire 字段：名称 + 类型化值 + 严重级别。
#[derive(Debug, Clone, PartialEq)]
pub struct WireField {
    pub name: String,
    pub value: TypedValue,
    pub severity: SeverityLevel,
}

impl WireField {
    pub fn new(name: impl Into<String>, value: TypedValue, severity: SeverityLevel) -> Self {
        Self {
            name: name.into(),
            value,
            severity,
        }
    }
}

/// Wire 记录：按插入顺序排列的字段序列。
///
/// 每条入站消息生成一条记录，构造完成后不再修改；同名字段后写覆盖先写的值，
/// 但保留首次出现的位置。
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WireRecord {
    fields: Vec<WireField>,
}

impl WireRecord {
    pub fn new(fields: impl IntoIterator<Item = WireField>) -> Self {
        let mut record = WireRecord { fields: Vec::new() };
        for field in fields {
            record.put(field);
        }
        record
    }

    fn put(&mut self, field: WireField) {
        match self.fields.iter_mut().find(|item| item.name == field.name) {
            Some(existing) => *existing = field,
            None => self.fields.push(field),
        }
    }

    pub fn fields(&self) -> &[WireField] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&WireField> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// 记录内最高的严重级别（空记录视为 INFO）。
    pub fn severity(&self) -> SeverityLevel {
        if self
            .fields
            .iter()
            .any(|field| field.severity == SeverityLevel::Error)
        {
            SeverityLevel::Error
        } else {
            SeverityLevel::Info
        }
    }

    pub fn into_fields(self) -> Vec<WireField> {
        self.fields
    }
}
