use std::sync::Arc;

use async_trait::async_trait;
use tokio_stream::StreamExt;

use super::error::RegistryError;
use super::traits::Watcher;
use super::types::{RegistryOptions, Service, ServiceAction, ServiceEvent};
use crate::store::{KvStore, WatchEvent, WatchEventKind, WatchStream};

/// 基于存储前缀监听的服务变更监听器
///
/// 只关注 `{prefix}/{namespace}/` 下的键。无法解码的事件会被跳过。
pub struct EtcdWatcher {
    key_prefix: String,
    stream: Option<WatchStream>,
}

impl EtcdWatcher {
    /// 使用注册中心当前的存储句柄和配置创建监听器
    pub async fn new(
        store: Arc<dyn KvStore>,
        options: &RegistryOptions,
        namespace: &str,
    ) -> Result<Self, RegistryError> {
        let key_prefix = format!("{}/{}/", options.prefix, namespace);
        let stream = store.watch_prefix(&key_prefix).await?;

        tracing::debug!(key_prefix = %key_prefix, "Created service watcher");

        Ok(Self {
            key_prefix,
            stream: Some(stream),
        })
    }

    // 将存储事件转换为服务事件
    fn decode_event(&self, event: &WatchEvent) -> Option<ServiceEvent> {
        match event.kind {
            WatchEventKind::Put => match Service::decode(&event.value) {
                Ok(service) => {
                    let action = if event.prev_value.is_some() {
                        ServiceAction::Update
                    } else {
                        ServiceAction::Create
                    };
                    Some(ServiceEvent { action, service })
                }
                Err(err) => {
                    tracing::warn!(
                        key = %event.key,
                        error = %err,
                        "Skipping undecodable watch event"
                    );
                    None
                }
            },
            WatchEventKind::Delete => {
                let service = event
                    .prev_value
                    .as_ref()
                    .and_then(|prev| Service::decode(prev).ok())
                    .unwrap_or_else(|| Service {
                        name: self.name_from_key(&event.key),
                        ..Default::default()
                    });
                Some(ServiceEvent {
                    action: ServiceAction::Delete,
                    service,
                })
            }
        }
    }

    fn name_from_key(&self, key: &str) -> String {
        key.strip_prefix(&self.key_prefix).unwrap_or(key).to_string()
    }
}

#[async_trait]
impl Watcher for EtcdWatcher {
    async fn next(&mut self) -> Result<ServiceEvent, RegistryError> {
        loop {
            let Some(stream) = self.stream.as_mut() else {
                return Err(RegistryError::WatcherStopped);
            };

            let Some(item) = stream.next().await else {
                self.stream = None;
                return Err(RegistryError::WatcherStopped);
            };

            if let Some(event) = self.decode_event(&item?) {
                return Ok(event);
            }
        }
    }

    fn stop(&mut self) {
        if self.stream.take().is_some() {
            tracing::debug!(key_prefix = %self.key_prefix, "Service watcher stopped");
        }
    }
}
