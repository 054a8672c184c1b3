#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use etcd_registry::store::{KvStore, MemoryStore, StoreError, WatchStream};
use etcd_registry::registry::Service;

/// 可注入故障的存储包装
#[derive(Default)]
pub struct FaultyStore {
    pub inner: MemoryStore,
    pub fail_puts: AtomicBool,
    pub fail_deletes: Mutex<HashSet<String>>,
    pub delete_delay: Option<Duration>,
    /// 删除已生效但延迟返回
    pub delete_ack_delay: Option<Duration>,
    pub deletes_completed: AtomicUsize,
}

impl FaultyStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_delete_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delete_delay: Some(delay),
            ..Default::default()
        })
    }

    pub fn with_delete_ack_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delete_ack_delay: Some(delay),
            ..Default::default()
        })
    }

    pub fn fail_delete_of(&self, key: &str) {
        self.fail_deletes.lock().unwrap().insert(key.to_string());
    }

    pub fn heal_delete_of(&self, key: &str) {
        self.fail_deletes.lock().unwrap().remove(key);
    }
}

#[async_trait]
impl KvStore for FaultyStore {
    async fn put_with_ttl(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), StoreError> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("put refused".to_string()));
        }
        self.inner.put_with_ttl(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        if let Some(delay) = self.delete_delay {
            tokio::time::sleep(delay).await;
        }
        let should_fail = self.fail_deletes.lock().unwrap().contains(key);
        let result = if should_fail {
            Err(StoreError::Rejected(format!("delete of {key} refused")))
        } else {
            self.inner.delete(key).await
        };
        if let Some(delay) = self.delete_ack_delay {
            tokio::time::sleep(delay).await;
        }
        self.deletes_completed.fetch_add(1, Ordering::SeqCst);
        result
    }

    async fn get(&self, key: &str) -> Result<Bytes, StoreError> {
        self.inner.get(key).await
    }

    async fn get_prefix(&self, prefix: &str) -> Result<Vec<Bytes>, StoreError> {
        self.inner.get_prefix(prefix).await
    }

    async fn watch_prefix(&self, prefix: &str) -> Result<WatchStream, StoreError> {
        self.inner.watch_prefix(prefix).await
    }
}

pub fn service(name: &str, id: &str, ip: &str, port: u16) -> Service {
    Service {
        driver: "grpc".to_string(),
        name: name.to_string(),
        id: id.to_string(),
        version: "1.0.0".to_string(),
        ip: ip.to_string(),
        port,
        ..Default::default()
    }
}
