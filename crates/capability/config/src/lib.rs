//! 组件属性解析与宿主运行配置加载。

mod options;

pub use options::{
    ComponentProperties, DEFAULT_APPLICATION, DEFAULT_CLOUD_SERVICE_PID, KEY_APPLICATION,
    KEY_CLOUD_SERVICE_PID, KEY_DEVICE_ID, KEY_QOS, KEY_TOPIC, SubscriberOptions,
};

use std::env;

/// 配置加载错误。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
}

/// 宿主进程运行配置。
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_username: Option<String>,
    pub mqtt_password: Option<String>,
    /// 数据 topic 的账号命名空间：`{prefix}/{device_id}/{application}/{app_topic}`。
    pub mqtt_topic_prefix: String,
    /// 控制 topic 前缀，拼接在数据前缀之前。
    pub mqtt_control_prefix: String,
    /// MQTT 连接提供者在注册表中的标识。
    pub provider_pid: String,
    pub subscriber_cloud_service_pid: Option<String>,
    pub subscriber_application: Option<String>,
    pub subscriber_device_id: Option<String>,
    pub subscriber_topic: Option<String>,
    pub subscriber_qos: Option<String>,
}

impl AppConfig {
    /// 从环境变量读取配置。
    pub fn from_env() -> Result<Self, ConfigError> {
        let mqtt_host = env::var("WIRE_MQTT_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let mqtt_port = read_u16_with_default("WIRE_MQTT_PORT", 1883)?;
        let mqtt_username = read_optional("WIRE_MQTT_USERNAME");
        let mqtt_password = read_optional("WIRE_MQTT_PASSWORD");
        let mqtt_topic_prefix =
            env::var("WIRE_MQTT_TOPIC_PREFIX").unwrap_or_else(|_| "kura".to_string());
        let mqtt_control_prefix =
            env::var("WIRE_MQTT_CONTROL_PREFIX").unwrap_or_else(|_| "$EDC".to_string());
        let provider_pid = read_optional("WIRE_PROVIDER_PID")
            .unwrap_or_else(|| DEFAULT_CLOUD_SERVICE_PID.to_string());
        let subscriber_qos = read_optional("WIRE_SUBSCRIBER_QOS");
        if let Some(qos) = subscriber_qos.as_deref() {
            qos.parse::<u8>().map_err(|_| {
                ConfigError::Invalid("WIRE_SUBSCRIBER_QOS".to_string(), qos.to_string())
            })?;
        }

        Ok(Self {
            mqtt_host,
            mqtt_port,
            mqtt_username,
            mqtt_password,
            mqtt_topic_prefix,
            mqtt_control_prefix,
            provider_pid,
            subscriber_cloud_service_pid: read_optional("WIRE_SUBSCRIBER_CLOUD_SERVICE_PID"),
            subscriber_application: read_optional("WIRE_SUBSCRIBER_APPLICATION"),
            subscriber_device_id: read_optional("WIRE_SUBSCRIBER_DEVICE_ID"),
            subscriber_topic: read_optional("WIRE_SUBSCRIBER_TOPIC"),
            subscriber_qos,
        })
    }

    /// 订阅组件的原始属性；未单独配置提供者标识时绑定到本进程注册的 MQTT 提供者。
    pub fn subscriber_properties(&self) -> ComponentProperties {
        let mut properties = ComponentProperties::new();
        let pid = self
            .subscriber_cloud_service_pid
            .clone()
            .unwrap_or_else(|| self.provider_pid.clone());
        properties.insert(KEY_CLOUD_SERVICE_PID, pid);
        if let Some(application) = &self.subscriber_application {
            properties.insert(KEY_APPLICATION, application.clone());
        }
        if let Some(device_id) = &self.subscriber_device_id {
            properties.insert(KEY_DEVICE_ID, device_id.clone());
        }
        if let Some(topic) = &self.subscriber_topic {
            properties.insert(KEY_TOPIC, topic.clone());
        }
        if let Some(qos) = &self.subscriber_qos {
            properties.insert(KEY_QOS, qos.clone());
        }
        properties
    }
}

fn read_u16_with_default(key: &str, default: u16) -> Result<u16, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u16>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_optional(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.is_empty() => Some(value),
        _ => None,
    }
}
