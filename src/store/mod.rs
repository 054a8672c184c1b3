//! 协调存储客户端抽象
//!
//! 注册中心只依赖这里定义的最小接口：
//! 带 TTL 写入、删除、点读、前缀读取和前缀监听。
//! - `memory`: 进程内实现，供测试和演示程序使用

pub mod memory;

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use thiserror::Error;

pub use memory::MemoryStore;

/// 存储操作错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Request rejected by store: {0}")]
    Rejected(String),

    #[error("Watch stream lagged behind by {0} events")]
    WatchLagged(u64),
}

/// 监听事件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEventKind {
    Put,
    Delete,
}

/// 存储层的原始监听事件
#[derive(Debug, Clone, PartialEq)]
pub struct WatchEvent {
    pub kind: WatchEventKind,
    pub key: String,
    /// 删除事件的 value 为空
    pub value: Bytes,
    /// 变更前的值，键此前不存在时为 None
    pub prev_value: Option<Bytes>,
}

pub type WatchStream = Pin<Box<dyn Stream<Item = Result<WatchEvent, StoreError>> + Send>>;

/// 协调存储客户端
///
/// 重试、连接管理和租约续期都属于实现方的职责。
#[async_trait]
pub trait KvStore: Send + Sync {
    /// 写入键值，超过 `ttl` 未续期则由存储删除
    async fn put_with_ttl(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), StoreError>;

    /// 删除键，键不存在时不报错
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// 点读，键不存在时返回 `StoreError::KeyNotFound`
    async fn get(&self, key: &str) -> Result<Bytes, StoreError>;

    /// 读取所有以 `prefix` 开头的键的值，按键排序；没有匹配时返回空列表
    async fn get_prefix(&self, prefix: &str) -> Result<Vec<Bytes>, StoreError>;

    /// 监听所有以 `prefix` 开头的键的变更
    async fn watch_prefix(&self, prefix: &str) -> Result<WatchStream, StoreError>;
}
