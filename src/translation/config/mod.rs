//! 服务配置模块
//!
//! 分层加载：内置默认值 → 配置文件 → `JSON_TRANSLATOR__*` 环境变量 → 部署遗留的扁平环境变量

pub mod manager;

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use manager::ConfigManager;

/// 配置常量
pub mod constants {
    // 流水线
    pub const SEGMENT_THRESHOLD: usize = 100;
    pub const BATCH_SIZE: usize = 50;
    pub const ELLIPSIS: &str = "...";

    // 回调
    pub const CALLBACK_BODY_LIMIT: usize = 1000;
    pub const DEFAULT_CALLBACK_TIMEOUT_SECS: u64 = 30;

    // 队列
    pub const DEFAULT_TRANSLATION_CONCURRENCY: usize = 5;
    pub const DEFAULT_TRANSLATION_ATTEMPTS: u32 = 3;
    pub const DEFAULT_TRANSLATION_BACKOFF_MS: u64 = 5_000;
    pub const DEFAULT_CALLBACK_CONCURRENCY: usize = 10;
    pub const DEFAULT_CALLBACK_ATTEMPTS: u32 = 10;
    pub const DEFAULT_CALLBACK_BACKOFF_MS: u64 = 10_000;

    // 外部服务
    pub const DEFAULT_DEEPL_API_URL: &str = "https://api-free.deepl.com/v2/translate";
    pub const DEFAULT_AI_BASE_URL: &str = "https://api.openai.com/v1";
    pub const DEFAULT_AI_MODEL: &str = "gpt-4o-mini";
    pub const DEFAULT_AI_TEMPERATURE: f32 = 0.3;
    pub const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 60;

    // 缓存
    pub const DEFAULT_LOCAL_CACHE_SIZE: usize = 10_000;

    // 存储
    pub const DEFAULT_DATABASE: &str = "json_translator";

    // 服务
    pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
    pub const DEFAULT_PORT: u16 = 3000;

    // 配置文件搜索路径
    pub const CONFIG_PATHS: &[&str] = &[
        "json-translator.toml",
        "config.toml",
        "~/.config/json-translator/config.toml",
        "/etc/json-translator/config.toml",
    ];

    pub const ENV_PREFIX: &str = "JSON_TRANSLATOR";
}

/// 完整的服务配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub provider: ProviderConfig,
    pub shortener: ShortenerConfig,
    pub pipeline: PipelineConfig,
    pub cache: CacheConfig,
    pub queue: QueueConfig,
    pub storage: StorageConfig,
    pub server: ServerConfig,
}

/// 翻译服务（DeepL）配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub api_url: String,
    pub auth_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_url: constants::DEFAULT_DEEPL_API_URL.to_string(),
            auth_key: None,
            timeout_secs: constants::DEFAULT_PROVIDER_TIMEOUT_SECS,
        }
    }
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// 文本缩写服务配置；未设置 `api_key` 时不启用
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShortenerConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for ShortenerConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: constants::DEFAULT_AI_BASE_URL.to_string(),
            model: constants::DEFAULT_AI_MODEL.to_string(),
            temperature: constants::DEFAULT_AI_TEMPERATURE,
            timeout_secs: constants::DEFAULT_PROVIDER_TIMEOUT_SECS,
        }
    }
}

impl ShortenerConfig {
    pub fn is_enabled(&self) -> bool {
        self.api_key.as_deref().is_some_and(|key| !key.is_empty())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// 流水线参数
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub batch_size: usize,
    pub segment_threshold: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: constants::BATCH_SIZE,
            segment_threshold: constants::SEGMENT_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// 进程内 LRU 前置缓存的容量
    pub local_cache_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            local_cache_size: constants::DEFAULT_LOCAL_CACHE_SIZE,
        }
    }
}

/// 单个工作池的重试与并发参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    pub concurrency: usize,
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
}

impl PoolConfig {
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub translation: PoolConfig,
    pub callback: PoolConfig,
    pub callback_timeout_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            translation: PoolConfig {
                concurrency: constants::DEFAULT_TRANSLATION_CONCURRENCY,
                max_attempts: constants::DEFAULT_TRANSLATION_ATTEMPTS,
                backoff_base_ms: constants::DEFAULT_TRANSLATION_BACKOFF_MS,
            },
            callback: PoolConfig {
                concurrency: constants::DEFAULT_CALLBACK_CONCURRENCY,
                max_attempts: constants::DEFAULT_CALLBACK_ATTEMPTS,
                backoff_base_ms: constants::DEFAULT_CALLBACK_BACKOFF_MS,
            },
            callback_timeout_secs: constants::DEFAULT_CALLBACK_TIMEOUT_SECS,
        }
    }
}

impl QueueConfig {
    pub fn callback_timeout(&self) -> Duration {
        Duration::from_secs(self.callback_timeout_secs)
    }
}

/// 持久化后端
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Mongo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub uri: Option<String>,
    pub database: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            uri: None,
            database: constants::DEFAULT_DATABASE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: constants::DEFAULT_BIND_ADDR.to_string(),
            port: constants::DEFAULT_PORT,
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}
