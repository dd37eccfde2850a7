//! 订阅组件属性（原始键值）到订阅选项的解析。

use crate::ConfigError;
use std::collections::HashMap;
use std::sync::Arc;

pub const KEY_CLOUD_SERVICE_PID: &str = "cloud.service.pid";
pub const KEY_APPLICATION: &str = "subscribing.application";
pub const KEY_DEVICE_ID: &str = "subscribing.device.id";
pub const KEY_TOPIC: &str = "subscribing.topic";
pub const KEY_QOS: &str = "subscribing.qos";

pub const DEFAULT_CLOUD_SERVICE_PID: &str = "org.eclipse.kura.cloud.CloudService";
pub const DEFAULT_APPLICATION: &str = "W1";

/// 组件原始属性（激活与更新时由宿主传入）。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComponentProperties {
    values: HashMap<String, String>,
}

impl ComponentProperties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// 读取属性；空字符串视为未配置。
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }
}

impl<K, V> FromIterator<(K, V)> for ComponentProperties
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut properties = ComponentProperties::new();
        for (key, value) in iter {
            properties.insert(key, value);
        }
        properties
    }
}

/// 订阅选项快照。
///
/// 每次应用配置都会生成新的快照（`Arc` 共享），旧快照不会被原地修改。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriberOptions {
    cloud_service_pid: String,
    application: String,
    device_id: Option<String>,
    app_topic: Option<String>,
    qos: u8,
}

impl SubscriberOptions {
    pub fn new(
        cloud_service_pid: impl Into<String>,
        application: impl Into<String>,
        device_id: Option<String>,
        app_topic: Option<String>,
        qos: u8,
    ) -> Result<Self, ConfigError> {
        if qos > 2 {
            return Err(ConfigError::Invalid(KEY_QOS.to_string(), qos.to_string()));
        }
        Ok(Self {
            cloud_service_pid: cloud_service_pid.into(),
            application: application.into(),
            device_id: device_id.filter(|value| !value.is_empty()),
            app_topic: app_topic.filter(|value| !value.is_empty()),
            qos,
        })
    }

    /// 从组件属性解析选项（缺省值见各 `DEFAULT_*` 常量）。
    pub fn from_properties(properties: &ComponentProperties) -> Result<Arc<Self>, ConfigError> {
        let qos = match properties.get(KEY_QOS) {
            Some(raw) => raw
                .parse::<u8>()
                .map_err(|_| ConfigError::Invalid(KEY_QOS.to_string(), raw.to_string()))?,
            None => 0,
        };
        let options = Self::new(
            properties
                .get(KEY_CLOUD_SERVICE_PID)
                .unwrap_or(DEFAULT_CLOUD_SERVICE_PID),
            properties.get(KEY_APPLICATION).unwrap_or(DEFAULT_APPLICATION),
            properties.get(KEY_DEVICE_ID).map(str::to_string),
            properties.get(KEY_TOPIC).map(str::to_string),
            qos,
        )?;
        Ok(Arc::new(options))
    }

    pub fn cloud_service_pid(&self) -> &str {
        &self.cloud_service_pid
    }

    pub fn application(&self) -> &str {
        &self.application
    }

    pub fn device_id(&self) -> Option<&str> {
        self.device_id.as_deref()
    }

    pub fn app_topic(&self) -> Option<&str> {
        self.app_topic.as_deref()
    }

    pub fn qos(&self) -> u8 {
        self.qos
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn properties_treat_blank_as_absent() {
        let properties = ComponentProperties::new().with(KEY_TOPIC, "  ");
        assert_eq!(properties.get(KEY_TOPIC), None);
    }

    #[test]
    fn qos_above_two_is_rejected() {
        let err = SubscriberOptions::new("pid", "W1", None, None, 3).expect_err("invalid qos");
        assert_eq!(err.to_string(), "invalid value for subscribing.qos: 3");
    }
}
