//! 翻译缓存模块
//!
//! 以句子为粒度的内容寻址缓存：键为（文本 SHA-256、源语言、目标语言），
//! 条目一经写入不再修改。进程内 LRU 作为前置层，持久层通过 [`CacheStore`] 抽象。

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lru::LruCache;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

use crate::translation::config::constants;
use crate::translation::error::TranslationResult;

/// 自动检测源语言时使用的缓存键
pub const AUTO_SOURCE_LANG: &str = "auto";

// ============================================================================
// 核心类型
// ============================================================================

/// 缓存条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub hash: String,
    pub source_text: String,
    pub source_lang: String,
    pub target_lang: String,
    pub translated_text: String,
    pub created_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(source_text: &str, translated_text: &str, source_lang: &str, target_lang: &str) -> Self {
        Self {
            hash: fingerprint(source_text),
            source_text: source_text.to_string(),
            source_lang: source_lang.to_string(),
            target_lang: target_lang.to_string(),
            translated_text: translated_text.to_string(),
            created_at: Utc::now(),
        }
    }
}

/// 缓存统计信息
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub total_requests: u64,
    pub local_hits: u64,
    pub store_hits: u64,
    pub cache_misses: u64,
    pub entries_written: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            (self.local_hits + self.store_hits) as f64 / self.total_requests as f64
        }
    }
}

/// 持久化缓存存储
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// 按指纹批量查询
    async fn find(
        &self,
        hashes: &[String],
        source_lang: &str,
        target_lang: &str,
    ) -> TranslationResult<Vec<CacheEntry>>;

    /// 批量写入，已存在的键静默跳过；返回实际新增的条目数
    async fn insert_many(&self, entries: &[CacheEntry]) -> TranslationResult<usize>;
}

/// 文本指纹：原文 UTF-8 字节的 SHA-256 十六进制串，不做任何规范化
pub fn fingerprint(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

// ============================================================================
// 实现
// ============================================================================

#[derive(Debug, Default)]
struct Counters {
    total_requests: AtomicU64,
    local_hits: AtomicU64,
    store_hits: AtomicU64,
    cache_misses: AtomicU64,
    entries_written: AtomicU64,
}

/// 翻译缓存（LRU 前置 + 持久层）
pub struct TranslationCache {
    store: Arc<dyn CacheStore>,
    local: Mutex<LruCache<String, String>>,
    counters: Counters,
}

impl TranslationCache {
    pub fn new(store: Arc<dyn CacheStore>, local_cache_size: usize) -> Self {
        let capacity = NonZeroUsize::new(local_cache_size)
            .or_else(|| NonZeroUsize::new(constants::DEFAULT_LOCAL_CACHE_SIZE))
            .unwrap_or(NonZeroUsize::MIN);

        Self {
            store,
            local: Mutex::new(LruCache::new(capacity)),
            counters: Counters::default(),
        }
    }

    /// 查询一组去重后的句子，返回 原文 → 译文
    pub async fn lookup(
        &self,
        segments: &[String],
        source_lang: Option<&str>,
        target_lang: &str,
    ) -> TranslationResult<HashMap<String, String>> {
        let source_lang = source_lang.unwrap_or(AUTO_SOURCE_LANG);
        let mut found = HashMap::with_capacity(segments.len());
        let mut remaining: HashMap<String, &String> = HashMap::new();

        self.counters
            .total_requests
            .fetch_add(segments.len() as u64, Ordering::Relaxed);

        {
            let mut local = self.local.lock().await;
            for segment in segments {
                let hash = fingerprint(segment);
                let key = local_key(&hash, source_lang, target_lang);
                match local.get(&key) {
                    Some(translation) => {
                        found.insert(segment.clone(), translation.clone());
                    }
                    None => {
                        remaining.insert(hash, segment);
                    }
                }
            }
        }
        self.counters
            .local_hits
            .fetch_add(found.len() as u64, Ordering::Relaxed);

        if remaining.is_empty() {
            return Ok(found);
        }

        let hashes: Vec<String> = remaining.keys().cloned().collect();
        let entries = self.store.find(&hashes, source_lang, target_lang).await?;

        let mut store_hits = 0u64;
        let mut local = self.local.lock().await;
        for entry in entries {
            if let Some(segment) = remaining.remove(&entry.hash) {
                local.put(
                    local_key(&entry.hash, source_lang, target_lang),
                    entry.translated_text.clone(),
                );
                found.insert(segment.clone(), entry.translated_text);
                store_hits += 1;
            }
        }
        drop(local);

        self.counters.store_hits.fetch_add(store_hits, Ordering::Relaxed);
        self.counters
            .cache_misses
            .fetch_add(remaining.len() as u64, Ordering::Relaxed);

        tracing::debug!(
            requested = segments.len(),
            hits = found.len(),
            misses = remaining.len(),
            "缓存查询完成"
        );

        Ok(found)
    }

    /// 保存新翻译；并发重复写入不会报错
    pub async fn save(
        &self,
        pairs: &[(String, String)],
        source_lang: Option<&str>,
        target_lang: &str,
    ) -> TranslationResult<()> {
        if pairs.is_empty() {
            return Ok(());
        }

        let source_lang = source_lang.unwrap_or(AUTO_SOURCE_LANG);
        let entries: Vec<CacheEntry> = pairs
            .iter()
            .map(|(source, translated)| CacheEntry::new(source, translated, source_lang, target_lang))
            .collect();

        let written = self.store.insert_many(&entries).await?;
        self.counters
            .entries_written
            .fetch_add(written as u64, Ordering::Relaxed);

        let mut local = self.local.lock().await;
        for entry in &entries {
            local.put(
                local_key(&entry.hash, source_lang, target_lang),
                entry.translated_text.clone(),
            );
        }

        Ok(())
    }

    /// 获取统计快照
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            total_requests: self.counters.total_requests.load(Ordering::Relaxed),
            local_hits: self.counters.local_hits.load(Ordering::Relaxed),
            store_hits: self.counters.store_hits.load(Ordering::Relaxed),
            cache_misses: self.counters.cache_misses.load(Ordering::Relaxed),
            entries_written: self.counters.entries_written.load(Ordering::Relaxed),
        }
    }

    /// 清空进程内前置缓存（持久层不受影响）
    pub async fn clear_local(&self) {
        self.local.lock().await.clear();
    }
}

fn local_key(hash: &str, source_lang: &str, target_lang: &str) -> String {
    format!("{}:{}:{}", source_lang, target_lang, hash)
}
