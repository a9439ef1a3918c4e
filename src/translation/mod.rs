//! 翻译模块
//!
//! 提供 JSON 文档翻译的完整流水线，采用清晰的模块化架构：
//! - **core**: 翻译引擎和外部服务接口
//! - **pipeline**: 文本处理管道（遍历、标记拆分、句子切分、批次、长度约束）
//! - **storage**: 句子级缓存和持久化存储
//! - **config**: 配置管理
//! - **error**: 错误处理
//!
//! # 基本用法
//!
//! ```rust,no_run
//! use std::collections::BTreeMap;
//! use std::sync::Arc;
//! use json_translator::translation::{
//!     config::PipelineConfig,
//!     core::{mock::MockTranslator, DocumentRequest, TranslationEngine},
//!     storage::{MemoryStore, TranslationCache},
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let cache = Arc::new(TranslationCache::new(Arc::new(MemoryStore::new()), 1000));
//! let engine = TranslationEngine::new(
//!     Arc::new(MockTranslator::suffix(" (fr)")),
//!     cache,
//!     None,
//!     &PipelineConfig::default(),
//! );
//!
//! let document = serde_json::json!({"title": "Hello World"});
//! let constraints = BTreeMap::new();
//! let output = engine
//!     .translate_document(DocumentRequest {
//!         document: &document,
//!         source_lang: None,
//!         target_lang: "fr",
//!         glossary_id: None,
//!         constraints: &constraints,
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// 子模块声明
// ============================================================================

/// 配置管理模块
pub mod config;

/// 翻译引擎与服务适配器
pub mod core;

/// 统一的错误类型和处理机制
pub mod error;

/// 文本处理管道
pub mod pipeline;

/// 缓存和持久化存储
pub mod storage;

// ============================================================================
// 公共API导出
// ============================================================================

pub use config::{AppConfig, ConfigManager};
pub use core::{TextShortener, TranslationEngine, TranslationProvider};
pub use error::{TranslationError, TranslationResult};
pub use storage::{CacheStats, TranslationCache};
