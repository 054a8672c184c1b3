use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

use crate::registry::{DEFAULT_PREFIX, DEFAULT_TTL, RegistryOptions, ServiceOption};

/// 默认配置文件路径
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// 环境变量前缀
pub const ENV_PREFIX: &str = "REGISTRY_";

/// 配置加载错误类型
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid environment override: {0}")]
    Env(#[from] envy::Error),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub registry: RegistryConfig,
    pub service: ServiceConfig,
}

/// 注册中心配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// 键前缀，为空时使用默认前缀
    pub prefix: String,
    /// 注册 TTL 秒数
    pub ttl_seconds: u64,
    /// 过期键清理间隔秒数
    pub sweep_interval_seconds: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            ttl_seconds: DEFAULT_TTL.as_secs(),
            sweep_interval_seconds: 1,
        }
    }
}

impl RegistryConfig {
    pub fn options(&self) -> RegistryOptions {
        RegistryOptions::new(self.prefix.clone(), Duration::from_secs(self.ttl_seconds))
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds.max(1))
    }
}

/// 待注册的服务定义
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub driver: String,
    pub name: String,
    pub id: String,
    pub version: String,
    pub region: String,
    pub zone: String,
    pub group_name: String,
    pub ip: String,
    pub port: u16,
}

impl ServiceOption for ServiceConfig {
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

// 可通过环境变量覆盖的配置项
#[derive(Debug, Default, Deserialize)]
pub struct EnvOverrides {
    pub prefix: Option<String>,
    pub ttl_seconds: Option<u64>,
}

impl Config {
    /// 加载配置：.env -> 配置文件 -> REGISTRY_ 环境变量
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let path =
            std::env::var("REGISTRY_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut config = Self::load_file(&path)?;

        let overrides: EnvOverrides = envy::prefixed(ENV_PREFIX).from_env()?;
        config.apply_overrides(overrides);
        config.fill_service_id();
        Ok(config)
    }

    /// 读取配置文件，文件不存在时返回默认配置
    pub fn load_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(config_str) => Self::from_toml_str(&config_str),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file not found, using defaults");
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Read {
                path: path.display().to_string(),
                source,
            }),
        }
    }

    pub fn from_toml_str(config_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(config_str)?)
    }

    pub fn apply_overrides(&mut self, overrides: EnvOverrides) {
        if let Some(prefix) = overrides.prefix {
            self.registry.prefix = prefix;
        }
        if let Some(ttl_seconds) = overrides.ttl_seconds {
            self.registry.ttl_seconds = ttl_seconds;
        }
    }

    // 未配置实例ID时生成一个
    fn fill_service_id(&mut self) {
        if self.service.id.is_empty() {
            self.service.id = uuid::Uuid::new_v4().to_string();
        }
    }
}
