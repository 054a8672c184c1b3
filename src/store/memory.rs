use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

use super::{KvStore, StoreError, WatchEvent, WatchEventKind, WatchStream};

const DEFAULT_EVENT_CAPACITY: usize = 1024;

// 带过期时间的存储值
#[derive(Debug, Clone)]
struct StoredValue {
    value: Bytes,
    expires_at: Option<Instant>,
}

impl StoredValue {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| now >= deadline)
    }
}

/// 进程内的协调存储实现
///
/// 过期的键在读取时惰性清理，
/// 也可以通过 [`MemoryStore::start_expiry_sweep`] 定期清理。
/// 所有变更（写入、删除、过期）都会广播给监听者。
#[derive(Debug)]
pub struct MemoryStore {
    entries: DashMap<String, StoredValue>,
    events: broadcast::Sender<WatchEvent>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_event_capacity(DEFAULT_EVENT_CAPACITY)
    }

    /// 指定监听事件的广播通道容量
    pub fn with_event_capacity(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity);
        Self {
            entries: DashMap::new(),
            events,
        }
    }

    /// 启动定期过期清理任务，存储被释放后任务自动退出
    pub fn start_expiry_sweep(self: &Arc<Self>, interval: Duration) {
        let store: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let Some(store) = store.upgrade() else {
                    break;
                };
                let purged = store.purge_expired();
                if purged > 0 {
                    tracing::debug!(purged_count = purged, "Expiry sweep removed keys");
                }
            }
        });
    }

    /// 清理所有已过期的键，返回清理数量
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| entry.value().is_expired(now))
            .map(|entry| entry.key().clone())
            .collect();

        expired
            .into_iter()
            .filter(|key| self.remove_expired(key, now))
            .count()
    }

    /// 当前存活的键数量
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .iter()
            .filter(|entry| !entry.value().is_expired(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 直接写入原始字节，不设置过期时间
    pub fn insert_raw(&self, key: &str, value: impl Into<Bytes>) {
        let value = value.into();
        let prev = self.entries.insert(
            key.to_string(),
            StoredValue {
                value: value.clone(),
                expires_at: None,
            },
        );
        self.publish(WatchEventKind::Put, key, value, prev.map(|p| p.value));
    }

    fn remove_expired(&self, key: &str, now: Instant) -> bool {
        match self.entries.remove_if(key, |_, stored| stored.is_expired(now)) {
            Some((key, stored)) => {
                tracing::debug!(key = %key, "Key expired");
                self.publish(WatchEventKind::Delete, &key, Bytes::new(), Some(stored.value));
                true
            }
            None => false,
        }
    }

    fn publish(&self, kind: WatchEventKind, key: &str, value: Bytes, prev_value: Option<Bytes>) {
        // 没有监听者时发送失败，忽略即可
        let _ = self.events.send(WatchEvent {
            kind,
            key: key.to_string(),
            value,
            prev_value,
        });
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn put_with_ttl(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), StoreError> {
        let now = Instant::now();
        // TTL 为 0 表示不过期
        let expires_at = (!ttl.is_zero()).then(|| now + ttl);

        let prev = self.entries.insert(
            key.to_string(),
            StoredValue {
                value: value.clone(),
                expires_at,
            },
        );
        let prev_value = prev.filter(|p| !p.is_expired(now)).map(|p| p.value);
        self.publish(WatchEventKind::Put, key, value, prev_value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let now = Instant::now();
        if let Some((key, stored)) = self.entries.remove(key) {
            if !stored.is_expired(now) {
                self.publish(WatchEventKind::Delete, &key, Bytes::new(), Some(stored.value));
            }
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes, StoreError> {
        let now = Instant::now();
        let stored = self.entries.get(key).map(|entry| entry.value().clone());

        match stored {
            Some(stored) if !stored.is_expired(now) => Ok(stored.value),
            Some(_) => {
                self.remove_expired(key, now);
                Err(StoreError::KeyNotFound(key.to_string()))
            }
            None => Err(StoreError::KeyNotFound(key.to_string())),
        }
    }

    async fn get_prefix(&self, prefix: &str) -> Result<Vec<Bytes>, StoreError> {
        self.purge_expired();

        let mut matched: Vec<(String, Bytes)> = self
            .entries
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| (entry.key().clone(), entry.value().value.clone()))
            .collect();
        matched.sort_by(|a, b| a.0.cmp(&b.0));

        Ok(matched.into_iter().map(|(_, value)| value).collect())
    }

    async fn watch_prefix(&self, prefix: &str) -> Result<WatchStream, StoreError> {
        let prefix = prefix.to_string();
        let stream = BroadcastStream::new(self.events.subscribe()).filter_map(move |item| {
            match item {
                Ok(event) if event.key.starts_with(&prefix) => Some(Ok(event)),
                Ok(_) => None,
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    Some(Err(StoreError::WatchLagged(skipped)))
                }
            }
        });

        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_key_is_not_found() {
        let store = MemoryStore::new();
        let err = store.get("/nope").await.unwrap_err();
        assert_eq!(err, StoreError::KeyNotFound("/nope".to_string()));
    }

    #[tokio::test]
    async fn delete_missing_key_succeeds() {
        let store = MemoryStore::new();
        assert!(store.delete("/nope").await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn keys_expire_after_ttl() {
        let store = MemoryStore::new();
        store
            .put_with_ttl("/a", Bytes::from_static(b"1"), Duration::from_secs(10))
            .await
            .unwrap();
        store
            .put_with_ttl("/b", Bytes::from_static(b"2"), Duration::ZERO)
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(9)).await;
        assert_eq!(store.get("/a").await.unwrap(), Bytes::from_static(b"1"));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(matches!(store.get("/a").await, Err(StoreError::KeyNotFound(_))));
        assert_eq!(store.get_prefix("/").await.unwrap(), vec![Bytes::from_static(b"2")]);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn prefix_read_is_sorted_by_key() {
        let store = MemoryStore::new();
        store.insert_raw("/p/c", "c");
        store.insert_raw("/p/a", "a");
        store.insert_raw("/q/b", "b");

        let values = store.get_prefix("/p").await.unwrap();
        assert_eq!(values, vec![Bytes::from("a"), Bytes::from("c")]);
        assert!(store.get_prefix("/none").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn watch_reports_puts_and_deletes_under_prefix() {
        let store = MemoryStore::new();
        let mut stream = store.watch_prefix("/p").await.unwrap();

        store.insert_raw("/other", "x");
        store.insert_raw("/p/a", "1");
        store.insert_raw("/p/a", "2");
        store.delete("/p/a").await.unwrap();

        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.kind, WatchEventKind::Put);
        assert_eq!(first.prev_value, None);

        let second = stream.next().await.unwrap().unwrap();
        assert_eq!(second.prev_value, Some(Bytes::from("1")));

        let third = stream.next().await.unwrap().unwrap();
        assert_eq!(third.kind, WatchEventKind::Delete);
        assert_eq!(third.prev_value, Some(Bytes::from("2")));
    }
}
