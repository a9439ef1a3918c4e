//! 进程内存储
//!
//! 基于 `DashMap` 的并发存储，同时实现缓存、任务和回调记录接口。
//! 适用于单进程部署和测试，进程退出后数据丢失。

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::cache::{CacheEntry, CacheStore};
use crate::jobs::model::{CallbackAttempt, TranslationJob};
use crate::jobs::store::{CallbackLog, JobStore};
use crate::translation::error::{TranslationError, TranslationResult};

type CacheKey = (String, String, String);

/// 内存存储
#[derive(Debug, Default)]
pub struct MemoryStore {
    cache: DashMap<CacheKey, CacheEntry>,
    jobs: DashMap<String, TranslationJob>,
    attempts: DashMap<String, Vec<CallbackAttempt>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 缓存条目数
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn find(
        &self,
        hashes: &[String],
        source_lang: &str,
        target_lang: &str,
    ) -> TranslationResult<Vec<CacheEntry>> {
        Ok(hashes
            .iter()
            .filter_map(|hash| {
                self.cache
                    .get(&(hash.clone(), source_lang.to_string(), target_lang.to_string()))
                    .map(|entry| entry.value().clone())
            })
            .collect())
    }

    async fn insert_many(&self, entries: &[CacheEntry]) -> TranslationResult<usize> {
        let mut inserted = 0;
        for entry in entries {
            let key = (
                entry.hash.clone(),
                entry.source_lang.clone(),
                entry.target_lang.clone(),
            );
            if let Entry::Vacant(slot) = self.cache.entry(key) {
                slot.insert(entry.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn insert(&self, job: &TranslationJob) -> TranslationResult<()> {
        match self.jobs.entry(job.id.clone()) {
            Entry::Occupied(_) => Err(TranslationError::StorageError(format!(
                "任务已存在: {}",
                job.id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(job.clone());
                Ok(())
            }
        }
    }

    async fn get(&self, id: &str) -> TranslationResult<Option<TranslationJob>> {
        Ok(self.jobs.get(id).map(|job| job.value().clone()))
    }

    async fn record_attempt(&self, id: &str, attempts: u32) -> TranslationResult<()> {
        let mut job = self
            .jobs
            .get_mut(id)
            .ok_or_else(|| TranslationError::StorageError(format!("任务不存在: {}", id)))?;
        if !job.is_terminal() {
            job.attempts = attempts;
            job.updated_at = chrono::Utc::now();
        }
        Ok(())
    }

    async fn finalize(&self, job: &TranslationJob) -> TranslationResult<bool> {
        let mut existing = self
            .jobs
            .get_mut(&job.id)
            .ok_or_else(|| TranslationError::StorageError(format!("任务不存在: {}", job.id)))?;

        if existing.is_terminal() {
            return Ok(false);
        }
        *existing = job.clone();
        Ok(true)
    }

    async fn pending(&self) -> TranslationResult<Vec<TranslationJob>> {
        let mut jobs: Vec<TranslationJob> = self
            .jobs
            .iter()
            .filter(|job| !job.is_terminal())
            .map(|job| job.value().clone())
            .collect();
        jobs.sort_by_key(|job| job.created_at);
        Ok(jobs)
    }

    async fn settle_callback(&self, id: &str) -> TranslationResult<()> {
        if let Some(mut job) = self.jobs.get_mut(id) {
            if job.is_terminal() {
                job.callback_settled = true;
            }
        }
        Ok(())
    }

    async fn unsettled_callbacks(&self) -> TranslationResult<Vec<TranslationJob>> {
        let mut jobs: Vec<TranslationJob> = self
            .jobs
            .iter()
            .filter(|job| job.is_terminal() && !job.callback_settled)
            .map(|job| job.value().clone())
            .collect();
        jobs.sort_by_key(|job| job.updated_at);
        Ok(jobs)
    }
}

#[async_trait]
impl CallbackLog for MemoryStore {
    async fn append(&self, attempt: &CallbackAttempt) -> TranslationResult<()> {
        self.attempts
            .entry(attempt.job_id.clone())
            .or_default()
            .push(attempt.clone());
        Ok(())
    }

    async fn attempts_for(&self, job_id: &str) -> TranslationResult<Vec<CallbackAttempt>> {
        Ok(self
            .attempts
            .get(job_id)
            .map(|attempts| attempts.value().clone())
            .unwrap_or_default())
    }
}
