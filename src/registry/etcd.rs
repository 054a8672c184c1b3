use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use tokio_util::task::TaskTracker;

use super::error::RegistryError;
use super::traits::{Registry, Watcher};
use super::types::{RegistryOptions, Service, ServiceListing, ServiceOption, service_key};
use super::watcher::EtcdWatcher;
use crate::store::{KvStore, StoreError};

/// 本注册中心实现的命名空间标识
pub const ETCD_REGISTRY_TYPE: &str = "etcdv3";

/// 基于协调存储的服务注册中心
///
/// 本地注册表（键 -> 编码后的记录）
/// 只记录本实例成功注册且尚未注销的服务，
/// 仅用于 [`Registry::close`] 时的清理，查询操作总是直接读存储。
#[derive(Clone)]
pub struct EtcdRegistry {
    options: RegistryOptions,
    store: Arc<dyn KvStore>,
    registered: Arc<DashMap<String, Bytes>>,
}

impl std::fmt::Debug for EtcdRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EtcdRegistry")
            .field("options", &self.options)
            .field("registered", &self.registered.len())
            .finish()
    }
}

impl EtcdRegistry {
    pub fn new(options: RegistryOptions, store: Arc<dyn KvStore>) -> Self {
        // 经由 new 再次规范化空前缀
        let options = RegistryOptions::new(options.prefix, options.ttl);
        Self {
            options,
            store,
            registered: Arc::new(DashMap::new()),
        }
    }

    pub fn options(&self) -> &RegistryOptions {
        &self.options
    }

    /// 服务名对应的存储键
    pub fn key_for(&self, name: &str) -> String {
        service_key(&self.options.prefix, ETCD_REGISTRY_TYPE, name)
    }

    /// 本地注册表中的键，按字典序排列
    pub fn registered_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .registered
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort();
        keys
    }

    pub fn registered_count(&self) -> usize {
        self.registered.len()
    }

    // 注销快照中的一条记录；删除期间同名服务被重新注册时保留新的本地条目
    async fn deregister_entry(&self, key: &str, value: &Bytes) -> Result<(), RegistryError> {
        let service = Service::decode(value)?;
        self.store.delete(key).await?;
        self.registered.remove_if(key, |_, current| current == value);

        tracing::info!(key = %key, service_name = %service.name, "Deregistered service");
        Ok(())
    }

    /// 列出服务并报告被跳过的条目数量
    pub async fn list_services_with_report(&self) -> Result<ServiceListing, RegistryError> {
        let values = self.store.get_prefix(&self.options.prefix).await?;

        let mut listing = ServiceListing {
            services: Vec::with_capacity(values.len()),
            skipped: 0,
        };
        for value in values {
            match Service::decode(&value) {
                Ok(service) => listing.services.push(service),
                Err(err) => {
                    tracing::warn!(
                        prefix = %self.options.prefix,
                        error = %err,
                        "Skipping undecodable service entry"
                    );
                    listing.skipped += 1;
                }
            }
        }

        tracing::debug!(
            prefix = %self.options.prefix,
            services_count = listing.services.len(),
            skipped_count = listing.skipped,
            "Listed services"
        );

        Ok(listing)
    }
}

#[async_trait]
impl Registry for EtcdRegistry {
    async fn register(&self, opt: &dyn ServiceOption) -> Result<(), RegistryError> {
        tracing::info!(options = ?opt, "Registering service");

        if opt.name().is_empty() {
            return Err(RegistryError::InvalidService(
                "service name must not be empty".to_string(),
            ));
        }

        let key = self.key_for(opt.name());
        let service = Service::from_option(opt);
        let value = service.encode()?;

        self.store
            .put_with_ttl(&key, value.clone(), self.options.ttl)
            .await?;

        // 同名服务的键相同，后注册的实例会覆盖前一个
        if let Some(previous) = self.registered.insert(key.clone(), value) {
            if let Ok(previous) = Service::decode(&previous) {
                if previous.id != service.id {
                    tracing::warn!(
                        key = %key,
                        previous_id = %previous.id,
                        service_id = %service.id,
                        "Service instance replaced an earlier registration with the same name"
                    );
                }
            }
        }

        tracing::info!(
            key = %key,
            service_name = %service.name,
            service_id = %service.id,
            ttl_secs = self.options.ttl.as_secs(),
            "Registered service"
        );
        Ok(())
    }

    async fn deregister(&self, service: &Service) -> Result<(), RegistryError> {
        let key = self.key_for(&service.name);
        self.store.delete(&key).await?;
        self.registered.remove(&key);

        tracing::info!(key = %key, service_name = %service.name, "Deregistered service");
        Ok(())
    }

    async fn get_service(&self, name: &str) -> Result<Service, RegistryError> {
        let key = self.key_for(name);
        let value = self.store.get(&key).await.map_err(|err| match err {
            StoreError::KeyNotFound(key) => RegistryError::NotFound(key),
            other => RegistryError::Store(other),
        })?;

        tracing::debug!(key = %key, "Fetched service");
        Service::decode(&value)
    }

    async fn list_services(&self) -> Result<Vec<Service>, RegistryError> {
        Ok(self.list_services_with_report().await?.services)
    }

    async fn watch(&self) -> Result<Box<dyn Watcher>, RegistryError> {
        let watcher =
            EtcdWatcher::new(self.store.clone(), &self.options, ETCD_REGISTRY_TYPE).await?;
        Ok(Box::new(watcher))
    }

    async fn close(&self) -> Result<(), RegistryError> {
        // 先取快照，关闭期间新注册的服务不在本次清理范围内
        let entries: Vec<(String, Bytes)> = self
            .registered
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        tracing::info!(
            services_count = entries.len(),
            "Closing registry, deregistering services"
        );

        let tracker = TaskTracker::new();
        let last_error: Arc<Mutex<Option<RegistryError>>> = Arc::new(Mutex::new(None));

        for (key, value) in entries {
            let registry = self.clone();
            let last_error = last_error.clone();
            tracker.spawn(async move {
                if let Err(err) = registry.deregister_entry(&key, &value).await {
                    tracing::warn!(
                        key = %key,
                        error = %err,
                        "Failed to deregister service on close"
                    );
                    if let Ok(mut slot) = last_error.lock() {
                        *slot = Some(err);
                    }
                }
            });
        }

        tracker.close();
        tracker.wait().await;

        let last_error = match last_error.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        match last_error {
            Some(err) => Err(err),
            None => {
                tracing::info!("Registry closed");
                Ok(())
            }
        }
    }

    fn registry_type(&self) -> &'static str {
        ETCD_REGISTRY_TYPE
    }
}
