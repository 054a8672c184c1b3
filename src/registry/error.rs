use thiserror::Error;

use crate::store::StoreError;

/// 注册中心错误类型
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Failed to encode service record: {0}")]
    Encoding(#[source] serde_json::Error),

    #[error("Failed to decode service record: {0}")]
    Decoding(#[source] serde_json::Error),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Service not found: {0}")]
    NotFound(String),

    #[error("Invalid service: {0}")]
    InvalidService(String),

    #[error("Watcher stopped")]
    WatcherStopped,
}
