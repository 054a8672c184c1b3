use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::error::RegistryError;

/// 未配置前缀时使用的默认键前缀
pub const DEFAULT_PREFIX: &str = "/registry";

/// 默认注册 TTL
pub const DEFAULT_TTL: Duration = Duration::from_secs(30);

/// 注册中心配置
#[derive(Debug, Clone, PartialEq)]
pub struct RegistryOptions {
    /// 键前缀
    pub prefix: String,
    /// 每次注册写入时使用的 TTL
    pub ttl: Duration,
}

impl RegistryOptions {
    /// 创建配置，空前缀会被替换为 [`DEFAULT_PREFIX`]
    pub fn new(prefix: impl Into<String>, ttl: Duration) -> Self {
        let prefix = prefix.into();
        let prefix = if prefix.is_empty() {
            DEFAULT_PREFIX.to_string()
        } else {
            prefix
        };
        Self { prefix, ttl }
    }
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX, DEFAULT_TTL)
    }
}

/// 构造服务在存储中的键：`{prefix}/{namespace}/{name}`
pub fn service_key(prefix: &str, namespace: &str, name: &str) -> String {
    format!("{prefix}/{namespace}/{name}")
}

/// 注册所需的服务描述
///
/// 注册中心只通过这些 getter 读取服务信息。
pub trait ServiceOption: fmt::Debug + Send + Sync {
    fn driver(&self) -> &str;
    fn name(&self) -> &str;
    fn id(&self) -> &str;
    fn version(&self) -> &str;
    fn region(&self) -> &str;
    fn zone(&self) -> &str;
    fn group_name(&self) -> &str;
    fn ip(&self) -> &str;
    fn port(&self) -> u16;
}

/// 服务注册记录，也是写入存储的 JSON 格式
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Service {
    pub driver: String,
    pub name: String,
    pub id: String,
    pub version: String,
    pub region: String,
    pub zone: String,
    #[serde(rename = "groupName")]
    pub group_name: String,
    pub ip: String,
    pub port: u16,
}

impl Service {
    /// 从任意 [`ServiceOption`] 复制出一条记录
    pub fn from_option(opt: &dyn ServiceOption) -> Self {
        Self {
            driver: opt.driver().to_string(),
            name: opt.name().to_string(),
            id: opt.id().to_string(),
            version: opt.version().to_string(),
            region: opt.region().to_string(),
            zone: opt.zone().to_string(),
            group_name: opt.group_name().to_string(),
            ip: opt.ip().to_string(),
            port: opt.port(),
        }
    }

    pub fn encode(&self) -> Result<Bytes, RegistryError> {
        serde_json::to_vec(self)
            .map(Bytes::from)
            .map_err(RegistryError::Encoding)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, RegistryError> {
        serde_json::from_slice(bytes).map_err(RegistryError::Decoding)
    }
}

impl ServiceOption for Service {
    fn driver(&self) -> &str {
        &self.driver
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn region(&self) -> &str {
        &self.region
    }

    fn zone(&self) -> &str {
        &self.zone
    }

    fn group_name(&self) -> &str {
        &self.group_name
    }

    fn ip(&self) -> &str {
        &self.ip
    }

    fn port(&self) -> u16 {
        self.port
    }
}

/// 列出服务的结果，`skipped` 为无法解码而被跳过的条目数
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceListing {
    pub services: Vec<Service>,
    pub skipped: usize,
}

/// 服务变更类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceAction {
    Create,
    Update,
    Delete,
}

/// 监听器产生的服务变更事件
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceEvent {
    pub action: ServiceAction,
    pub service: Service,
}
