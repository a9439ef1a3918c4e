//! 存储模块
//!
//! 句子级翻译缓存及其持久化后端。

pub mod cache;
pub mod memory;
#[cfg(feature = "mongo")]
pub mod mongo;

pub use cache::{fingerprint, CacheEntry, CacheStats, CacheStore, TranslationCache, AUTO_SOURCE_LANG};
pub use memory::MemoryStore;
#[cfg(feature = "mongo")]
pub use mongo::MongoStore;
