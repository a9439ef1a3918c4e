//! 翻译系统核心模块
//!
//! - **能力接口** (`provider.rs`): 翻译服务与文本缩写服务的抽象
//! - **引擎** (`engine.rs`): 串联遍历、拆分、缓存、批量翻译和长度约束
//! - **适配器** (`deepl.rs`, `shortener.rs`): 基于 HTTP 的外部服务实现
//! - **模拟实现** (`mock.rs`): 不依赖网络的确定性实现，供测试使用
//!
//! ```text
//! TranslationEngine (engine.rs)
//!     ├── MarkupSplitter (pipeline/markup.rs)
//!     ├── Segmenter (pipeline/segmenter.rs)
//!     ├── TranslationCache (storage/cache.rs)
//!     ├── BatchTranslator (pipeline/batch.rs)
//!     │       └── dyn TranslationProvider
//!     └── LengthEnforcer (pipeline/length.rs)
//!             └── dyn TextShortener
//! ```

pub mod deepl;
pub mod engine;
pub mod mock;
pub mod provider;
pub mod shortener;

pub use deepl::DeeplProvider;
pub use engine::{DocumentRequest, EngineStats, TranslationEngine};
pub use provider::{TextShortener, TranslationProvider};
pub use shortener::ChatShortener;
