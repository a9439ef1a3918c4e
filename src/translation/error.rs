//! 翻译模块统一错误处理
//!
//! 提供结构化错误类型、可重试分类和错误统计

use std::fmt;

use thiserror::Error;

/// 翻译错误类型
#[derive(Error, Debug, Clone)]
pub enum TranslationError {
    /// 配置错误
    #[error("配置错误: {0}")]
    ConfigError(String),

    /// 网络错误
    #[error("网络错误: {0}")]
    NetworkError(String),

    /// 速率限制错误
    #[error("请求速率过快，已达到限制")]
    RateLimitExceeded,

    /// 输入验证错误
    #[error("输入无效: {0}")]
    InvalidInput(String),

    /// 缓存错误
    #[error("缓存错误: {0}")]
    CacheError(String),

    /// 存储错误
    #[error("存储错误: {0}")]
    StorageError(String),

    /// 翻译服务错误
    #[error("翻译服务错误: {0}")]
    TranslationServiceError(String),

    /// 文本缩写服务错误
    #[error("文本缩写失败: {0}")]
    ShorteningError(String),

    /// 超时错误
    #[error("操作超时: {0}")]
    TimeoutError(String),

    /// 序列化错误
    #[error("序列化错误: {0}")]
    SerializationError(String),

    /// 资源不足错误（如服务配额用尽）
    #[error("资源不足: {0}")]
    ResourceExhausted(String),

    /// 路径无法解析（结构不变量被破坏）
    #[error("路径无法解析: {path}")]
    PathResolution { path: String },

    /// 片段数量与占位符数量不一致
    #[error("片段数量不匹配: {path} 期望 {expected} 个，实际 {actual} 个")]
    FragmentMismatch {
        path: String,
        expected: usize,
        actual: usize,
    },

    /// 回调投递失败
    #[error("回调投递失败 (HTTP {status}): {message}")]
    CallbackError { status: u16, message: String },

    /// 队列已关闭
    #[error("队列已关闭: {0}")]
    QueueClosed(String),

    /// 内部错误
    #[error("内部错误: {0}")]
    InternalError(String),
}

impl TranslationError {
    /// 检查错误是否可重试
    pub fn is_retryable(&self) -> bool {
        match self {
            TranslationError::NetworkError(_) => true,
            TranslationError::TimeoutError(_) => true,
            TranslationError::TranslationServiceError(_) => true,
            TranslationError::ResourceExhausted(_) => true,
            // 接收方或服务方限流，退避后重试
            TranslationError::RateLimitExceeded => true,
            TranslationError::CacheError(_) => true,
            TranslationError::StorageError(_) => true,
            TranslationError::ShorteningError(_) => true,
            TranslationError::CallbackError { .. } => true,
            TranslationError::QueueClosed(_) => true,
            TranslationError::ConfigError(_) => false,
            TranslationError::InvalidInput(_) => false,
            TranslationError::SerializationError(_) => false,
            TranslationError::PathResolution { .. } => false,
            TranslationError::FragmentMismatch { .. } => false,
            TranslationError::InternalError(_) => false,
        }
    }

    /// 是否属于程序不变量被破坏（需要运维关注）
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            TranslationError::PathResolution { .. }
                | TranslationError::FragmentMismatch { .. }
                | TranslationError::InternalError(_)
        )
    }

    /// 获取错误的严重程度
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            TranslationError::ConfigError(_) => ErrorSeverity::Critical,
            TranslationError::NetworkError(_) => ErrorSeverity::Warning,
            TranslationError::RateLimitExceeded => ErrorSeverity::Warning,
            TranslationError::InvalidInput(_) => ErrorSeverity::Info,
            TranslationError::CacheError(_) => ErrorSeverity::Warning,
            TranslationError::StorageError(_) => ErrorSeverity::Error,
            TranslationError::TranslationServiceError(_) => ErrorSeverity::Error,
            TranslationError::ShorteningError(_) => ErrorSeverity::Warning,
            TranslationError::TimeoutError(_) => ErrorSeverity::Warning,
            TranslationError::SerializationError(_) => ErrorSeverity::Error,
            TranslationError::ResourceExhausted(_) => ErrorSeverity::Warning,
            TranslationError::PathResolution { .. } => ErrorSeverity::Critical,
            TranslationError::FragmentMismatch { .. } => ErrorSeverity::Critical,
            TranslationError::CallbackError { .. } => ErrorSeverity::Warning,
            TranslationError::QueueClosed(_) => ErrorSeverity::Warning,
            TranslationError::InternalError(_) => ErrorSeverity::Critical,
        }
    }

    /// 获取错误类别
    pub fn category(&self) -> ErrorCategory {
        match self {
            TranslationError::ConfigError(_) => ErrorCategory::Configuration,
            TranslationError::NetworkError(_) => ErrorCategory::Network,
            TranslationError::RateLimitExceeded => ErrorCategory::RateLimit,
            TranslationError::InvalidInput(_) => ErrorCategory::Input,
            TranslationError::CacheError(_) => ErrorCategory::Cache,
            TranslationError::StorageError(_) => ErrorCategory::Storage,
            TranslationError::TranslationServiceError(_) => ErrorCategory::Service,
            TranslationError::ShorteningError(_) => ErrorCategory::Service,
            TranslationError::TimeoutError(_) => ErrorCategory::Timeout,
            TranslationError::SerializationError(_) => ErrorCategory::Serialization,
            TranslationError::ResourceExhausted(_) => ErrorCategory::Resource,
            TranslationError::PathResolution { .. } => ErrorCategory::Invariant,
            TranslationError::FragmentMismatch { .. } => ErrorCategory::Invariant,
            TranslationError::CallbackError { .. } => ErrorCategory::Delivery,
            TranslationError::QueueClosed(_) => ErrorCategory::Concurrency,
            TranslationError::InternalError(_) => ErrorCategory::Internal,
        }
    }

    /// 创建带上下文的错误
    pub fn with_context<T: fmt::Display>(mut self, context: T) -> Self {
        match &mut self {
            TranslationError::ConfigError(ref mut msg)
            | TranslationError::NetworkError(ref mut msg)
            | TranslationError::InvalidInput(ref mut msg)
            | TranslationError::CacheError(ref mut msg)
            | TranslationError::StorageError(ref mut msg)
            | TranslationError::TranslationServiceError(ref mut msg)
            | TranslationError::ShorteningError(ref mut msg)
            | TranslationError::TimeoutError(ref mut msg)
            | TranslationError::SerializationError(ref mut msg)
            | TranslationError::ResourceExhausted(ref mut msg)
            | TranslationError::QueueClosed(ref mut msg)
            | TranslationError::InternalError(ref mut msg) => {
                *msg = format!("{} (上下文: {})", msg, context);
            }
            TranslationError::CallbackError { ref mut message, .. } => {
                *message = format!("{} (上下文: {})", message, context);
            }
            TranslationError::RateLimitExceeded
            | TranslationError::PathResolution { .. }
            | TranslationError::FragmentMismatch { .. } => {}
        }

        self
    }
}

/// 错误严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Configuration,
    Network,
    RateLimit,
    Input,
    Cache,
    Storage,
    Service,
    Timeout,
    Serialization,
    Resource,
    Invariant,
    Delivery,
    Concurrency,
    Internal,
}

impl From<serde_json::Error> for TranslationError {
    fn from(error: serde_json::Error) -> Self {
        TranslationError::SerializationError(format!("JSON序列化错误: {}", error))
    }
}

impl From<config::ConfigError> for TranslationError {
    fn from(error: config::ConfigError) -> Self {
        TranslationError::ConfigError(error.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for TranslationError {
    fn from(error: tokio::time::error::Elapsed) -> Self {
        TranslationError::TimeoutError(format!("异步操作超时: {}", error))
    }
}

impl From<url::ParseError> for TranslationError {
    fn from(error: url::ParseError) -> Self {
        TranslationError::InvalidInput(format!("URL无效: {}", error))
    }
}

impl From<reqwest::Error> for TranslationError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            TranslationError::TimeoutError(error.to_string())
        } else if error.is_decode() {
            TranslationError::TranslationServiceError(format!("响应解析失败: {}", error))
        } else {
            TranslationError::NetworkError(error.to_string())
        }
    }
}

#[cfg(feature = "mongo")]
impl From<mongodb::error::Error> for TranslationError {
    fn from(error: mongodb::error::Error) -> Self {
        TranslationError::StorageError(error.to_string())
    }
}

#[cfg(feature = "mongo")]
impl From<bson::ser::Error> for TranslationError {
    fn from(error: bson::ser::Error) -> Self {
        TranslationError::SerializationError(format!("BSON序列化错误: {}", error))
    }
}

#[cfg(feature = "mongo")]
impl From<bson::de::Error> for TranslationError {
    fn from(error: bson::de::Error) -> Self {
        TranslationError::SerializationError(format!("BSON反序列化错误: {}", error))
    }
}

/// 错误结果类型别名
pub type TranslationResult<T> = Result<T, TranslationError>;

/// 错误处理助手函数
pub mod helpers {
    use super::*;

    /// 按严重程度记录错误
    pub fn log_error(error: &TranslationError) {
        match error.severity() {
            ErrorSeverity::Info => tracing::info!(category = ?error.category(), "翻译信息: {}", error),
            ErrorSeverity::Warning => {
                tracing::warn!(category = ?error.category(), "翻译警告: {}", error)
            }
            ErrorSeverity::Error => {
                tracing::error!(category = ?error.category(), "翻译错误: {}", error)
            }
            ErrorSeverity::Critical => {
                tracing::error!(category = ?error.category(), "翻译严重错误: {}", error)
            }
        }
    }
}
