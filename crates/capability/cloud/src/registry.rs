//! 提供者注册表与标识过滤条件。

use crate::error::CloudError;
use crate::service::CloudService;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::broadcast;
use tracing::debug;

const EVENT_CAPACITY: usize = 64;

/// 注册表变更通知。
#[derive(Clone)]
pub enum RegistryEvent {
    Registered {
        pid: String,
        provider: Arc<dyn CloudService>,
    },
    Modified {
        pid: String,
        provider: Arc<dyn CloudService>,
    },
    Unregistered {
        pid: String,
    },
}

impl RegistryEvent {
    pub fn pid(&self) -> &str {
        match self {
            RegistryEvent::Registered { pid, .. }
            | RegistryEvent::Modified { pid, .. }
            | RegistryEvent::Unregistered { pid } => pid,
        }
    }
}

impl fmt::Debug for RegistryEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryEvent::Registered { pid, .. } => write!(f, "Registered({})", pid),
            RegistryEvent::Modified { pid, .. } => write!(f, "Modified({})", pid),
            RegistryEvent::Unregistered { pid } => write!(f, "Unregistered({})", pid),
        }
    }
}

/// 提供者标识过滤条件（按 pid 精确匹配）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderFilter {
    pid: String,
}

impl ProviderFilter {
    /// 构造过滤条件；空标识或包含过滤表达式元字符时返回 [`CloudError::InvalidFilter`]。
    pub fn for_pid(pid: &str) -> Result<Self, CloudError> {
        if pid.trim().is_empty() {
            return Err(CloudError::InvalidFilter("empty provider pid".to_string()));
        }
        if let Some(ch) = pid
            .chars()
            .find(|ch| matches!(ch, '(' | ')' | '*' | '\\') || ch.is_control())
        {
            return Err(CloudError::InvalidFilter(format!(
                "illegal character {:?} in provider pid {:?}",
                ch, pid
            )));
        }
        Ok(Self {
            pid: pid.to_string(),
        })
    }

    pub fn pid(&self) -> &str {
        &self.pid
    }

    pub fn matches(&self, pid: &str) -> bool {
        self.pid == pid
    }
}

impl fmt::Display for ProviderFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(&(objectClass=CloudService)(service.pid={}))", self.pid)
    }
}

struct RegistryInner {
    providers: RwLock<HashMap<String, Arc<dyn CloudService>>>,
    events: broadcast::Sender<RegistryEvent>,
}

/// 动态提供者注册表。
///
/// 同一 pid 重复注册视为修改（隐式替换）。
#[derive(Clone)]
pub struct ProviderRegistry {
    inner: Arc<RegistryInner>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(RegistryInner {
                providers: RwLock::new(HashMap::new()),
                events,
            }),
        }
    }

    /// 注册提供者；pid 已存在时替换并通知 `Modified`。
    pub fn register(&self, pid: impl Into<String>, provider: Arc<dyn CloudService>) {
        let pid = pid.into();
        let replaced = self
            .inner
            .providers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(pid.clone(), provider.clone())
            .is_some();
        let event = if replaced {
            RegistryEvent::Modified { pid, provider }
        } else {
            RegistryEvent::Registered { pid, provider }
        };
        self.notify(event);
    }

    /// 通知提供者属性已变更；pid 未注册时返回 `false`。
    pub fn modify(&self, pid: &str) -> bool {
        let provider = self
            .inner
            .providers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(pid)
            .cloned();
        match provider {
            Some(provider) => {
                self.notify(RegistryEvent::Modified {
                    pid: pid.to_string(),
                    provider,
                });
                true
            }
            None => false,
        }
    }

    pub fn unregister(&self, pid: &str) -> Option<Arc<dyn CloudService>> {
        let removed = self
            .inner
            .providers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(pid);
        if removed.is_some() {
            self.notify(RegistryEvent::Unregistered {
                pid: pid.to_string(),
            });
        }
        removed
    }

    /// 查找与过滤条件匹配的提供者。
    pub fn find_matching(&self, filter: &ProviderFilter) -> Vec<(String, Arc<dyn CloudService>)> {
        self.inner
            .providers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(pid, _)| filter.matches(pid))
            .map(|(pid, provider)| (pid.clone(), provider.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner
            .providers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 订阅变更通知（先订阅再读取快照，避免漏掉中间变更）。
    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.inner.events.subscribe()
    }

    fn notify(&self, event: RegistryEvent) {
        debug!(event = ?event, "registry changed");
        // 没有追踪器时发送失败属正常情况。
        let _ = self.inner.events.send(event);
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_rejects_metacharacters() {
        assert!(ProviderFilter::for_pid("org.eclipse.kura.cloud.CloudService").is_ok());
        assert!(matches!(
            ProviderFilter::for_pid("cloud(1)"),
            Err(CloudError::InvalidFilter(_))
        ));
        assert!(matches!(
            ProviderFilter::for_pid("   "),
            Err(CloudError::InvalidFilter(_))
        ));
        assert!(ProviderFilter::for_pid("a*").is_err());
    }

    #[test]
    fn filter_renders_as_service_filter() {
        let filter = ProviderFilter::for_pid("cloud-1").expect("filter");
        assert_eq!(
            filter.to_string(),
            "(&(objectClass=CloudService)(service.pid=cloud-1))"
        );
        assert!(filter.matches("cloud-1"));
        assert!(!filter.matches("cloud-2"));
    }
}
