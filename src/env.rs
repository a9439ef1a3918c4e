//! 统一的环境变量管理系统
//!
//! 以类型安全的方式读取部署环境中的扁平环境变量（`DEEPL_AUTH_KEY`、`PORT` 等），
//! 由配置管理器在分层配置之后统一覆盖。

use std::env;
use std::fmt;

/// 环境变量解析错误
#[derive(Debug, Clone)]
pub struct EnvError {
    pub variable: String,
    pub message: String,
}

impl fmt::Display for EnvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Environment variable '{}': {}", self.variable, self.message)
    }
}

impl std::error::Error for EnvError {}

pub type EnvResult<T> = Result<T, EnvError>;

/// 环境变量访问器特性
pub trait EnvVar<T> {
    const NAME: &'static str;
    const DEFAULT: Option<T>;
    const DESCRIPTION: &'static str;

    fn parse(value: &str) -> EnvResult<T>;

    fn get() -> EnvResult<T> {
        match env::var(Self::NAME) {
            Ok(value) => Self::parse(&value),
            Err(_) => {
                if let Some(default) = Self::DEFAULT {
                    Ok(default)
                } else {
                    Err(EnvError {
                        variable: Self::NAME.to_string(),
                        message: "Required environment variable not set".to_string(),
                    })
                }
            }
        }
    }

    /// 未设置（或为空）时返回 `None`，设置了则必须能解析
    fn get_optional() -> EnvResult<Option<T>> {
        match env::var(Self::NAME) {
            Ok(value) if !value.trim().is_empty() => Self::parse(&value).map(Some),
            _ => Ok(None),
        }
    }
}

/// 核心环境变量定义
pub mod core {
    use super::*;

    /// 日志级别
    pub struct LogLevel;
    impl EnvVar<String> for LogLevel {
        const NAME: &'static str = "LOG_LEVEL";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Log level: trace, debug, info, warn, error";

        fn get() -> EnvResult<String> {
            match env::var(Self::NAME) {
                Ok(value) => Self::parse(&value),
                Err(_) => Ok("info".to_string()),
            }
        }

        fn parse(value: &str) -> EnvResult<String> {
            match value.to_lowercase().as_str() {
                "trace" | "debug" | "info" | "warn" | "error" => Ok(value.to_lowercase()),
                _ => Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: format!(
                        "Invalid log level '{}'. Use: trace, debug, info, warn, error",
                        value
                    ),
                }),
            }
        }
    }
}

/// 翻译服务相关环境变量
pub mod provider {
    use super::*;

    /// DeepL 授权密钥
    pub struct DeeplAuthKey;
    impl EnvVar<String> for DeeplAuthKey {
        const NAME: &'static str = "DEEPL_AUTH_KEY";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "DeepL API authentication key";

        fn parse(value: &str) -> EnvResult<String> {
            Ok(value.trim().to_string())
        }
    }

    /// DeepL 接口地址
    pub struct DeeplApiUrl;
    impl EnvVar<String> for DeeplApiUrl {
        const NAME: &'static str = "DEEPL_API_URL";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "DeepL translate endpoint URL";

        fn parse(value: &str) -> EnvResult<String> {
            parse_http_url(value, Self::NAME)
        }
    }
}

/// 文本缩写（生成式模型）相关环境变量
pub mod shortener {
    use super::*;

    pub struct AiApiKey;
    impl EnvVar<String> for AiApiKey {
        const NAME: &'static str = "AI_API_KEY";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "API key of the OpenAI-compatible shortening service";

        fn parse(value: &str) -> EnvResult<String> {
            Ok(value.trim().to_string())
        }
    }

    pub struct AiBaseUrl;
    impl EnvVar<String> for AiBaseUrl {
        const NAME: &'static str = "AI_BASE_URL";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Base URL of the OpenAI-compatible API";

        fn parse(value: &str) -> EnvResult<String> {
            parse_http_url(value, Self::NAME)
        }
    }

    pub struct AiModel;
    impl EnvVar<String> for AiModel {
        const NAME: &'static str = "AI_MODEL";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Model used for shortening over-length translations";

        fn parse(value: &str) -> EnvResult<String> {
            let model = value.trim();
            if model.is_empty() {
                return Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "Model name must not be empty".to_string(),
                });
            }
            Ok(model.to_string())
        }
    }
}

/// 队列相关环境变量
pub mod queue {
    use super::*;

    /// 翻译任务最大尝试次数
    pub struct TranslationRetryLimit;
    impl EnvVar<u32> for TranslationRetryLimit {
        const NAME: &'static str = "TRANSLATION_RETRY_LIMIT";
        const DEFAULT: Option<u32> = Some(3);
        const DESCRIPTION: &'static str = "Maximum attempts for a translation job";

        fn parse(value: &str) -> EnvResult<u32> {
            parse_bounded_u32(value, Self::NAME, 1, 50)
        }
    }

    /// 回调投递最大尝试次数
    pub struct CallbackRetryLimit;
    impl EnvVar<u32> for CallbackRetryLimit {
        const NAME: &'static str = "CALLBACK_RETRY_LIMIT";
        const DEFAULT: Option<u32> = Some(10);
        const DESCRIPTION: &'static str = "Maximum attempts for a callback delivery";

        fn parse(value: &str) -> EnvResult<u32> {
            parse_bounded_u32(value, Self::NAME, 1, 100)
        }
    }
}

/// Web 相关环境变量
pub mod web {
    use super::*;

    pub struct Port;
    impl EnvVar<u16> for Port {
        const NAME: &'static str = "PORT";
        const DEFAULT: Option<u16> = Some(3000);
        const DESCRIPTION: &'static str = "HTTP listen port";

        fn parse(value: &str) -> EnvResult<u16> {
            value.trim().parse::<u16>().map_err(|_| EnvError {
                variable: Self::NAME.to_string(),
                message: format!("Invalid port '{}'", value),
            })
        }
    }
}

/// 存储相关环境变量
pub mod storage {
    use super::*;

    pub struct MongoUri;
    impl EnvVar<String> for MongoUri {
        const NAME: &'static str = "MONGODB_URI";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "MongoDB connection string";

        fn parse(value: &str) -> EnvResult<String> {
            let uri = value.trim();
            if uri.starts_with("mongodb://") || uri.starts_with("mongodb+srv://") {
                Ok(uri.to_string())
            } else {
                Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "Connection string must start with mongodb:// or mongodb+srv://"
                        .to_string(),
                })
            }
        }
    }

    pub struct MongoDatabase;
    impl EnvVar<String> for MongoDatabase {
        const NAME: &'static str = "MONGODB_DATABASE";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "MongoDB database name";

        fn parse(value: &str) -> EnvResult<String> {
            Ok(value.trim().to_string())
        }
    }
}

fn parse_http_url(value: &str, var_name: &str) -> EnvResult<String> {
    let url = value.trim();
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(url.trim_end_matches('/').to_string())
    } else {
        Err(EnvError {
            variable: var_name.to_string(),
            message: "URL must start with http:// or https://".to_string(),
        })
    }
}

fn parse_bounded_u32(value: &str, var_name: &str, min: u32, max: u32) -> EnvResult<u32> {
    let num: u32 = value.trim().parse().map_err(|_| EnvError {
        variable: var_name.to_string(),
        message: "Must be a valid positive number".to_string(),
    })?;

    if num < min {
        return Err(EnvError {
            variable: var_name.to_string(),
            message: format!("Value {} is below minimum {}", num, min),
        });
    }

    if num > max {
        return Err(EnvError {
            variable: var_name.to_string(),
            message: format!("Value {} exceeds maximum {}", num, max),
        });
    }

    Ok(num)
}

/// 部署环境中显式设置的覆盖项
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    pub deepl_auth_key: Option<String>,
    pub deepl_api_url: Option<String>,
    pub ai_api_key: Option<String>,
    pub ai_base_url: Option<String>,
    pub ai_model: Option<String>,
    pub translation_retry_limit: Option<u32>,
    pub callback_retry_limit: Option<u32>,
    pub port: Option<u16>,
    pub mongodb_uri: Option<String>,
    pub mongodb_database: Option<String>,
}

impl EnvOverrides {
    /// 从环境变量加载
    pub fn from_env() -> EnvResult<Self> {
        Ok(Self {
            deepl_auth_key: provider::DeeplAuthKey::get_optional()?,
            deepl_api_url: provider::DeeplApiUrl::get_optional()?,
            ai_api_key: shortener::AiApiKey::get_optional()?,
            ai_base_url: shortener::AiBaseUrl::get_optional()?,
            ai_model: shortener::AiModel::get_optional()?,
            translation_retry_limit: queue::TranslationRetryLimit::get_optional()?,
            callback_retry_limit: queue::CallbackRetryLimit::get_optional()?,
            port: web::Port::get_optional()?,
            mongodb_uri: storage::MongoUri::get_optional()?,
            mongodb_database: storage::MongoDatabase::get_optional()?,
        })
    }
}

/// 环境变量文档生成器
pub fn generate_env_docs() -> String {
    let mut docs = String::new();
    docs.push_str("# Environment Variables\n\n");

    let entries: &[(&str, &str)] = &[
        (core::LogLevel::NAME, core::LogLevel::DESCRIPTION),
        (provider::DeeplAuthKey::NAME, provider::DeeplAuthKey::DESCRIPTION),
        (provider::DeeplApiUrl::NAME, provider::DeeplApiUrl::DESCRIPTION),
        (shortener::AiApiKey::NAME, shortener::AiApiKey::DESCRIPTION),
        (shortener::AiBaseUrl::NAME, shortener::AiBaseUrl::DESCRIPTION),
        (shortener::AiModel::NAME, shortener::AiModel::DESCRIPTION),
        (queue::TranslationRetryLimit::NAME, queue::TranslationRetryLimit::DESCRIPTION),
        (queue::CallbackRetryLimit::NAME, queue::CallbackRetryLimit::DESCRIPTION),
        (web::Port::NAME, web::Port::DESCRIPTION),
        (storage::MongoUri::NAME, storage::MongoUri::DESCRIPTION),
        (storage::MongoDatabase::NAME, storage::MongoDatabase::DESCRIPTION),
    ];

    for (name, description) in entries {
        docs.push_str(&format!("- `{}`: {}\n", name, description));
    }

    docs
}
