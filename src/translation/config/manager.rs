//! 配置管理器
//!
//! 基于 `config` crate 组合默认值、配置文件和环境变量，
//! 最后用 [`crate::env`] 中的类型化变量覆盖，并在返回前统一校验。

use std::path::{Path, PathBuf};

use config::{Config, Environment, File};

use super::{constants, AppConfig, StorageBackend};
use crate::env::EnvOverrides;
use crate::translation::error::{TranslationError, TranslationResult};

/// 配置管理器
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: AppConfig,
    config_path: Option<PathBuf>,
}

impl ConfigManager {
    /// 加载配置
    ///
    /// `explicit_path` 为空时按 [`constants::CONFIG_PATHS`] 顺序查找第一个存在的文件。
    /// 加载过程通过 `tracing` 输出，调用前应先初始化日志。
    pub fn load(explicit_path: Option<&Path>) -> TranslationResult<Self> {
        if let Some(env_file) = Self::load_dotenv() {
            tracing::info!("已加载环境变量文件: {}", env_file);
        }
        Self::build(explicit_path)
    }

    /// 只从指定文件加载（不读取 .env 文件）
    pub fn from_path(path: &Path) -> TranslationResult<Self> {
        Self::build(Some(path))
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn into_config(self) -> AppConfig {
        self.config
    }

    /// 实际使用的配置文件
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    fn build(explicit_path: Option<&Path>) -> TranslationResult<Self> {
        let mut builder = Config::builder().add_source(
            Config::try_from(&AppConfig::default())
                .map_err(|e| TranslationError::ConfigError(format!("默认配置错误: {}", e)))?,
        );

        let config_path = match explicit_path {
            Some(path) => {
                if !path.exists() {
                    return Err(TranslationError::ConfigError(format!(
                        "配置文件不存在: {}",
                        path.display()
                    )));
                }
                Some(path.to_path_buf())
            }
            None => Self::find_config_file(),
        };

        if let Some(ref path) = config_path {
            tracing::info!("加载配置文件: {}", path.display());
            builder = builder.add_source(File::from(path.as_path()));
        } else {
            tracing::info!("未找到配置文件，使用默认配置");
        }

        builder = builder.add_source(
            Environment::with_prefix(constants::ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let mut config: AppConfig = builder
            .build()
            .map_err(|e| TranslationError::ConfigError(format!("构建配置失败: {}", e)))?
            .try_deserialize()
            .map_err(|e| TranslationError::ConfigError(format!("反序列化配置失败: {}", e)))?;

        Self::apply_env_overrides(&mut config)?;
        Self::validate_config(&config)?;

        tracing::debug!(
            provider = %config.provider.api_url,
            storage = ?config.storage.backend,
            shortener = config.shortener.is_enabled(),
            "配置加载完成"
        );

        Ok(Self {
            config,
            config_path,
        })
    }

    fn find_config_file() -> Option<PathBuf> {
        constants::CONFIG_PATHS.iter().find_map(|path| {
            let expanded = shellexpand::tilde(path);
            let candidate = PathBuf::from(expanded.as_ref());
            candidate.exists().then_some(candidate)
        })
    }

    /// 应用部署环境中的扁平环境变量
    fn apply_env_overrides(config: &mut AppConfig) -> TranslationResult<()> {
        let overrides = EnvOverrides::from_env()
            .map_err(|e| TranslationError::ConfigError(e.to_string()))?;
        Self::apply_overrides(config, overrides);
        Ok(())
    }

    /// 把覆盖项合并进配置
    pub fn apply_overrides(config: &mut AppConfig, overrides: EnvOverrides) {
        if let Some(key) = overrides.deepl_auth_key {
            config.provider.auth_key = Some(key);
        }
        if let Some(url) = overrides.deepl_api_url {
            tracing::info!("环境变量覆盖 DeepL API URL: {}", url);
            config.provider.api_url = url;
        }
        if let Some(key) = overrides.ai_api_key {
            config.shortener.api_key = Some(key);
        }
        if let Some(url) = overrides.ai_base_url {
            config.shortener.base_url = url;
        }
        if let Some(model) = overrides.ai_model {
            config.shortener.model = model;
        }
        if let Some(limit) = overrides.translation_retry_limit {
            config.queue.translation.max_attempts = limit;
        }
        if let Some(limit) = overrides.callback_retry_limit {
            config.queue.callback.max_attempts = limit;
        }
        if let Some(port) = overrides.port {
            config.server.port = port;
        }
        if let Some(uri) = overrides.mongodb_uri {
            // 提供连接串即视为启用 MongoDB
            config.storage.uri = Some(uri);
            config.storage.backend = StorageBackend::Mongo;
        }
        if let Some(database) = overrides.mongodb_database {
            config.storage.database = database;
        }
    }

    /// 验证配置
    pub fn validate_config(config: &AppConfig) -> TranslationResult<()> {
        if config.pipeline.batch_size == 0 {
            return Err(TranslationError::ConfigError("批次大小不能为0".to_string()));
        }

        if config.cache.local_cache_size == 0 {
            return Err(TranslationError::ConfigError("本地缓存大小不能为0".to_string()));
        }

        for (name, pool) in [
            ("translation", &config.queue.translation),
            ("callback", &config.queue.callback),
        ] {
            if pool.concurrency == 0 {
                return Err(TranslationError::ConfigError(format!(
                    "{} 队列并发数不能为0",
                    name
                )));
            }
            if pool.max_attempts == 0 {
                return Err(TranslationError::ConfigError(format!(
                    "{} 队列最大尝试次数不能为0",
                    name
                )));
            }
        }

        if config.storage.backend == StorageBackend::Mongo
            && config.storage.uri.as_deref().map_or(true, str::is_empty)
        {
            return Err(TranslationError::ConfigError(
                "使用 MongoDB 存储时必须提供连接串".to_string(),
            ));
        }

        url::Url::parse(&config.provider.api_url)?;

        Ok(())
    }

    /// 加载第一个存在的 .env 文件，返回其文件名
    ///
    /// 不输出日志，可在初始化日志之前调用；已存在的环境变量不会被覆盖。
    pub fn load_dotenv() -> Option<&'static str> {
        const ENV_FILES: [&str; 4] = [".env.local", ".env.development", ".env.production", ".env"];

        ENV_FILES
            .into_iter()
            .find(|env_file| Path::new(env_file).exists() && dotenv::from_filename(env_file).is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(ConfigManager::validate_config(&config).is_ok());
        assert_eq!(config.pipeline.batch_size, 50);
        assert_eq!(config.queue.translation.max_attempts, 3);
        assert_eq!(config.queue.callback.backoff_base_ms, 10_000);
    }

    #[test]
    fn test_validation_rejects_zero_values() {
        let mut config = AppConfig::default();
        config.pipeline.batch_size = 0;
        assert!(ConfigManager::validate_config(&config).is_err());

        let mut config = AppConfig::default();
        config.queue.callback.concurrency = 0;
        assert!(ConfigManager::validate_config(&config).is_err());

        let mut config = AppConfig::default();
        config.queue.translation.max_attempts = 0;
        assert!(ConfigManager::validate_config(&config).is_err());
    }

    #[test]
    fn test_mongo_backend_requires_uri() {
        let mut config = AppConfig::default();
        config.storage.backend = StorageBackend::Mongo;
        assert!(ConfigManager::validate_config(&config).is_err());

        config.storage.uri = Some("mongodb://localhost:27017".into());
        assert!(ConfigManager::validate_config(&config).is_ok());
    }

    #[test]
    fn test_overrides_are_applied() {
        let mut config = AppConfig::default();
        ConfigManager::apply_overrides(
            &mut config,
            EnvOverrides {
                deepl_auth_key: Some("key:fx".into()),
                ai_api_key: Some("sk-test".into()),
                callback_retry_limit: Some(4),
                port: Some(8080),
                mongodb_uri: Some("mongodb://db:27017".into()),
                ..Default::default()
            },
        );

        assert_eq!(config.provider.auth_key.as_deref(), Some("key:fx"));
        assert!(config.shortener.is_enabled());
        assert_eq!(config.queue.callback.max_attempts, 4);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.storage.backend, StorageBackend::Mongo);
    }
}
