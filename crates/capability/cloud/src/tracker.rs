//! 提供者追踪器：监视注册表中与目标标识匹配的提供者。

use crate::registry::{ProviderFilter, ProviderRegistry, RegistryEvent};
use crate::service::CloudService;
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// 追踪事件类型。
#[derive(Clone)]
pub enum ProviderEventKind {
    /// 匹配的提供者出现（含同一 pid 的隐式替换）。
    Available(Arc<dyn CloudService>),
    /// 匹配的提供者属性变更。
    Updated(Arc<dyn CloudService>),
    /// 不再有匹配的提供者。
    Removed,
}

impl fmt::Debug for ProviderEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderEventKind::Available(_) => f.write_str("Available"),
            ProviderEventKind::Updated(_) => f.write_str("Updated"),
            ProviderEventKind::Removed => f.write_str("Removed"),
        }
    }
}

/// 追踪事件，`generation` 标识产生它的追踪器。
#[derive(Debug, Clone)]
pub struct ProviderEvent {
    pub generation: u64,
    pub pid: String,
    pub kind: ProviderEventKind,
}

/// 提供者追踪器。
///
/// 打开时同步返回当前匹配的提供者，之后的变更通过回调投递；
/// 回调返回 `false` 时追踪结束。关闭或丢弃时停止后台任务。
pub struct ProviderTracker {
    filter: ProviderFilter,
    generation: u64,
    handle: Option<JoinHandle<()>>,
}

impl ProviderTracker {
    pub fn open<F>(
        registry: &ProviderRegistry,
        filter: ProviderFilter,
        generation: u64,
        on_event: F,
    ) -> (Self, Option<(String, Arc<dyn CloudService>)>)
    where
        F: Fn(ProviderEvent) -> bool + Send + 'static,
    {
        let mut events = registry.subscribe();
        let initial = registry.find_matching(&filter).into_iter().next();
        let mut present = initial.is_some();

        let task_registry = registry.clone();
        let task_filter = filter.clone();
        let handle = tokio::spawn(async move {
            loop {
                let event = match events.recv().await {
                    Ok(event) => event,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(
                            filter = %task_filter,
                            skipped = skipped,
                            "provider tracker lagged, rescanning registry"
                        );
                        if let Some((pid, kind)) = rescan(&task_registry, &task_filter, &mut present)
                        {
                            if !on_event(ProviderEvent {
                                generation,
                                pid,
                                kind,
                            }) {
                                break;
                            }
                        }
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };
                if !task_filter.matches(event.pid()) {
                    continue;
                }
                let (pid, kind) = match event {
                    RegistryEvent::Registered { pid, provider } => {
                        present = true;
                        (pid, ProviderEventKind::Available(provider))
                    }
                    RegistryEvent::Modified { pid, provider } => {
                        present = true;
                        (pid, ProviderEventKind::Updated(provider))
                    }
                    RegistryEvent::Unregistered { pid } => {
                        if !present {
                            continue;
                        }
                        present = false;
                        (pid, ProviderEventKind::Removed)
                    }
                };
                debug!(
                    generation = generation,
                    provider_pid = %pid,
                    kind = ?kind,
                    "provider event tracked"
                );
                if !on_event(ProviderEvent {
                    generation,
                    pid,
                    kind,
                }) {
                    break;
                }
            }
        });

        (
            Self {
                filter,
                generation,
                handle: Some(handle),
            },
            initial,
        )
    }

    pub fn filter(&self) -> &ProviderFilter {
        &self.filter
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_open(&self) -> bool {
        self.handle
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    pub fn close(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            debug!(
                generation = self.generation,
                filter = %self.filter,
                "provider tracker closed"
            );
        }
    }
}

impl Drop for ProviderTracker {
    fn drop(&mut self) {
        self.stop();
    }
}

/// 丢失通知后重新读取注册表，返回需要补发的事件。
fn rescan(
    registry: &ProviderRegistry,
    filter: &ProviderFilter,
    present: &mut bool,
) -> Option<(String, ProviderEventKind)> {
    match registry.find_matching(filter).into_iter().next() {
        Some((pid, provider)) => {
            *present = true;
            Some((pid, ProviderEventKind::Available(provider)))
        }
        None if *present => {
            *present = false;
            Some((filter.pid().to_string(), ProviderEventKind::Removed))
        }
        None => None,
    }
}
