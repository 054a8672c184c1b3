//! 服务注册发现 Trait 定义

use async_trait::async_trait;

use super::error::RegistryError;
use super::types::{Service, ServiceEvent, ServiceOption};

/// 服务注册发现
#[async_trait]
pub trait Registry: Send + Sync {
    /// 注册服务，成功后记入本地注册表
    async fn register(&self, opt: &dyn ServiceOption) -> Result<(), RegistryError>;

    /// 注销服务，失败时本地注册表保持不变
    async fn deregister(&self, service: &Service) -> Result<(), RegistryError>;

    /// 按名称读取服务，总是直接读存储
    async fn get_service(&self, name: &str) -> Result<Service, RegistryError>;

    /// 列出前缀下所有可解码的服务
    async fn list_services(&self) -> Result<Vec<Service>, RegistryError>;

    /// 创建服务变更监听器
    async fn watch(&self) -> Result<Box<dyn Watcher>, RegistryError>;

    /// 注销本实例注册过的所有服务，返回最后一个失败
    async fn close(&self) -> Result<(), RegistryError>;

    /// 注册中心实现的类型标识
    fn registry_type(&self) -> &'static str;
}

/// 服务变更监听器
#[async_trait]
pub trait Watcher: Send {
    /// 等待下一个服务变更事件
    async fn next(&mut self) -> Result<ServiceEvent, RegistryError>;

    /// 停止监听，之后 `next` 返回 `RegistryError::WatcherStopped`
    fn stop(&mut self);
}
