//! MQTT topic 布局。
//!
//! - 数据：`{prefix}/{device_id}/{application}/{app_topic}`
//! - 控制：`{control_prefix}/{prefix}/{device_id}/{application}/{app_topic}`
//!
//! `app_topic` 可以包含多段。

/// 入站 topic 的类别。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicKind {
    Data,
    Control,
}

/// 解析后的入站 topic。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundTopic {
    pub kind: TopicKind,
    pub device_id: String,
    pub application: String,
    pub app_topic: String,
}

#[derive(Debug, Clone)]
pub struct TopicLayout {
    prefix: String,
    control_prefix: String,
}

impl TopicLayout {
    pub fn new(prefix: &str, control_prefix: &str) -> Self {
        Self {
            prefix: prefix.trim_matches('/').to_string(),
            control_prefix: control_prefix.trim_matches('/').to_string(),
        }
    }

    pub fn data_topic(&self, device_id: &str, application: &str, app_topic: &str) -> String {
        join_topic(&self.prefix, device_id, application, app_topic)
    }

    pub fn control_topic(&self, device_id: &str, application: &str, app_topic: &str) -> String {
        let data = self.data_topic(device_id, application, app_topic);
        if self.control_prefix.is_empty() {
            return data;
        }
        format!("{}/{}", self.control_prefix, data)
    }

    /// 解析入站 topic；不符合布局的返回 `None`。
    pub fn parse(&self, topic: &str) -> Option<InboundTopic> {
        let topic = topic.trim_matches('/');
        if !self.control_prefix.is_empty()
            && let Some(rest) = strip_segment(topic, &self.control_prefix)
        {
            return self.parse_scoped(rest, TopicKind::Control);
        }
        self.parse_scoped(topic, TopicKind::Data)
    }

    fn parse_scoped(&self, topic: &str, kind: TopicKind) -> Option<InboundTopic> {
        let rest = if self.prefix.is_empty() {
            topic
        } else {
            strip_segment(topic, &self.prefix)?
        };
        let mut parts = rest.splitn(3, '/');
        let device_id = parts.next().filter(|part| !part.is_empty())?;
        let application = parts.next().filter(|part| !part.is_empty())?;
        let app_topic = parts.next().filter(|part| !part.is_empty())?;
        Some(InboundTopic {
            kind,
            device_id: device_id.to_string(),
            application: application.to_string(),
            app_topic: app_topic.to_string(),
        })
    }
}

fn join_topic(prefix: &str, device_id: &str, application: &str, app_topic: &str) -> String {
    let app_topic = app_topic.trim_matches('/');
    if prefix.is_empty() {
        format!("{}/{}/{}", device_id, application, app_topic)
    } else {
        format!("{}/{}/{}/{}", prefix, device_id, application, app_topic)
    }
}

/// 去掉开头的一整段（`segment/`），部分匹配不算。
fn strip_segment<'a>(topic: &'a str, segment: &str) -> Option<&'a str> {
    topic.strip_prefix(segment)?.strip_prefix('/')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> TopicLayout {
        TopicLayout::new("kura/", "$EDC")
    }

    #[test]
    fn data_topic_round_trips_multi_segment_app_topic() {
        let layout = layout();
        let topic = layout.data_topic("dev-1", "W1", "sensors/temp");
        assert_eq!(topic, "kura/dev-1/W1/sensors/temp");
        let parsed = layout.parse(&topic).expect("parsed");
        assert_eq!(parsed.kind, TopicKind::Data);
        assert_eq!(parsed.device_id, "dev-1");
        assert_eq!(parsed.application, "W1");
        assert_eq!(parsed.app_topic, "sensors/temp");
    }

    #[test]
    fn control_topic_is_recognised() {
        let layout = layout();
        let topic = layout.control_topic("dev-1", "W1", "reply");
        assert_eq!(topic, "$EDC/kura/dev-1/W1/reply");
        assert_eq!(
            layout.parse(&topic).map(|parsed| parsed.kind),
            Some(TopicKind::Control)
        );
    }

    #[test]
    fn foreign_or_short_topics_are_skipped() {
        let layout = layout();
        assert!(layout.parse("other/dev-1/W1/t").is_none());
        assert!(layout.parse("kurax/dev-1/W1/t").is_none());
        assert!(layout.parse("kura/dev-1/W1").is_none());
        assert!(layout.parse("kura/dev-1//t").is_none());
    }

    #[test]
    fn empty_prefix_starts_at_device() {
        let layout = TopicLayout::new("", "");
        assert_eq!(layout.data_topic("d", "a", "t"), "d/a/t");
        assert_eq!(
            layout.parse("d/a/t").map(|parsed| parsed.app_topic),
            Some("t".to_string())
        );
    }
}
