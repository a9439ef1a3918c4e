//! MongoDB 持久化
//!
//! 三个集合：`translation_cache`、`translation_jobs`、`callback_attempts`。
//! 缓存集合上的唯一索引保证并发写入同一条目时只保留一份。

use async_trait::async_trait;
use bson::{doc, Document};
use futures::stream::TryStreamExt;
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::IndexOptions;
use mongodb::{Client, Collection, Database, IndexModel};

use super::cache::{CacheEntry, CacheStore};
use crate::jobs::model::{CallbackAttempt, JobStatus, TranslationJob};
use crate::jobs::store::{CallbackLog, JobStore};
use crate::translation::error::{TranslationError, TranslationResult};

const CACHE_COLLECTION: &str = "translation_cache";
const JOBS_COLLECTION: &str = "translation_jobs";
const ATTEMPTS_COLLECTION: &str = "callback_attempts";

/// 重复键错误码
const DUPLICATE_KEY: i32 = 11000;

/// MongoDB 存储
#[derive(Clone)]
pub struct MongoStore {
    client: Client,
    db: Database,
    cache: Collection<CacheEntry>,
    jobs: Collection<TranslationJob>,
    attempts: Collection<CallbackAttempt>,
}

impl MongoStore {
    /// 连接数据库并确保索引存在
    pub async fn connect(uri: &str, database: &str) -> TranslationResult<Self> {
        let client = Client::with_uri_str(uri).await?;
        let db = client.database(database);

        let store = Self {
            cache: db.collection(CACHE_COLLECTION),
            jobs: db.collection(JOBS_COLLECTION),
            attempts: db.collection(ATTEMPTS_COLLECTION),
            client,
            db,
        };

        store.ping().await?;
        store.create_indexes().await?;
        tracing::info!("已连接 MongoDB 数据库: {}", database);

        Ok(store)
    }

    pub async fn ping(&self) -> TranslationResult<()> {
        self.db.run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }

    /// 创建索引
    pub async fn create_indexes(&self) -> TranslationResult<()> {
        self.cache
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "hash": 1, "sourceLang": 1, "targetLang": 1 })
                    .options(
                        IndexOptions::builder()
                            .unique(true)
                            .name("hash_langs_unique".to_string())
                            .build(),
                    )
                    .build(),
            )
            .await?;

        self.jobs
            .create_indexes(vec![
                IndexModel::builder()
                    .keys(doc! { "id": 1 })
                    .options(
                        IndexOptions::builder()
                            .unique(true)
                            .name("job_id_unique".to_string())
                            .build(),
                    )
                    .build(),
                IndexModel::builder()
                    .keys(doc! { "status": 1, "createdAt": 1 })
                    .options(IndexOptions::builder().name("status_created".to_string()).build())
                    .build(),
                IndexModel::builder()
                    .keys(doc! { "callbackSettled": 1, "status": 1 })
                    .options(IndexOptions::builder().name("callback_settled".to_string()).build())
                    .build(),
            ])
            .await?;

        self.attempts
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "jobId": 1, "timestamp": 1 })
                    .options(IndexOptions::builder().name("job_timestamp".to_string()).build())
                    .build(),
            )
            .await?;

        Ok(())
    }

    /// 关闭连接
    pub async fn close(self) {
        self.client.shutdown().await;
    }

    fn job_filter(id: &str, pending_only: bool) -> Document {
        let mut filter = doc! { "id": id };
        if pending_only {
            filter.insert("status", JobStatus::Pending.as_str());
        }
        filter
    }
}

#[async_trait]
impl CacheStore for MongoStore {
    async fn find(
        &self,
        hashes: &[String],
        source_lang: &str,
        target_lang: &str,
    ) -> TranslationResult<Vec<CacheEntry>> {
        if hashes.is_empty() {
            return Ok(Vec::new());
        }

        let filter = doc! {
            "hash": { "$in": hashes.to_vec() },
            "sourceLang": source_lang,
            "targetLang": target_lang,
        };

        let cursor = self.cache.find(filter).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn insert_many(&self, entries: &[CacheEntry]) -> TranslationResult<usize> {
        if entries.is_empty() {
            return Ok(0);
        }

        match self.cache.insert_many(entries).ordered(false).await {
            Ok(result) => Ok(result.inserted_ids.len()),
            Err(error) => match *error.kind {
                ErrorKind::InsertMany(ref failure)
                    if failure.write_concern_error.is_none()
                        && failure
                            .write_errors
                            .as_ref()
                            .is_some_and(|errors| errors.iter().all(|e| e.code == DUPLICATE_KEY)) =>
                {
                    let duplicates = failure.write_errors.as_ref().map_or(0, Vec::len);
                    tracing::debug!(duplicates, "缓存写入跳过重复条目");
                    Ok(entries.len().saturating_sub(duplicates))
                }
                ErrorKind::Write(WriteFailure::WriteError(ref e)) if e.code == DUPLICATE_KEY => {
                    Ok(0)
                }
                _ => Err(error.into()),
            },
        }
    }
}

#[async_trait]
impl JobStore for MongoStore {
    async fn insert(&self, job: &TranslationJob) -> TranslationResult<()> {
        self.jobs.insert_one(job).await?;
        Ok(())
    }

    async fn get(&self, id: &str) -> TranslationResult<Option<TranslationJob>> {
        Ok(self.jobs.find_one(Self::job_filter(id, false)).await?)
    }

    async fn record_attempt(&self, id: &str, attempts: u32) -> TranslationResult<()> {
        self.jobs
            .update_one(
                Self::job_filter(id, true),
                doc! { "$set": {
                    "attempts": i64::from(attempts),
                    "updatedAt": chrono::Utc::now().to_rfc3339(),
                } },
            )
            .await?;
        Ok(())
    }

    async fn finalize(&self, job: &TranslationJob) -> TranslationResult<bool> {
        if !job.is_terminal() {
            return Err(TranslationError::InternalError(format!(
                "任务 {} 尚未进入终态",
                job.id
            )));
        }

        let result = self
            .jobs
            .replace_one(Self::job_filter(&job.id, true), job)
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn pending(&self) -> TranslationResult<Vec<TranslationJob>> {
        let cursor = self
            .jobs
            .find(doc! { "status": JobStatus::Pending.as_str() })
            .sort(doc! { "createdAt": 1 })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn settle_callback(&self, id: &str) -> TranslationResult<()> {
        self.jobs
            .update_one(
                doc! { "id": id, "status": { "$ne": JobStatus::Pending.as_str() } },
                doc! { "$set": { "callbackSettled": true } },
            )
            .await?;
        Ok(())
    }

    async fn unsettled_callbacks(&self) -> TranslationResult<Vec<TranslationJob>> {
        let cursor = self
            .jobs
            .find(doc! {
                "status": { "$ne": JobStatus::Pending.as_str() },
                "callbackSettled": { "$ne": true },
            })
            .sort(doc! { "updatedAt": 1 })
            .await?;
        Ok(cursor.try_collect().await?)
    }
}

#[async_trait]
impl CallbackLog for MongoStore {
    async fn append(&self, attempt: &CallbackAttempt) -> TranslationResult<()> {
        self.attempts.insert_one(attempt).await?;
        Ok(())
    }

    async fn attempts_for(&self, job_id: &str) -> TranslationResult<Vec<CallbackAttempt>> {
        let cursor = self
            .attempts
            .find(doc! { "jobId": job_id })
            .sort(doc! { "timestamp": 1 })
            .await?;
        Ok(cursor.try_collect().await?)
    }
}
