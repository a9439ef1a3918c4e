//! 任务调度器
//!
//! 任务状态的唯一写入方：接收请求并持久化为 `Pending`，交给翻译队列执行，
//! 根据失败分类决定重试或写入终态，写入终态后排入回调。
//! 启动时从存储恢复未完成的任务和未结束的回调，已用的尝试次数计入重试预算。

use std::sync::Arc;

use async_trait::async_trait;

use super::callback::CallbackDispatcher;
use super::model::{TranslationJob, TranslationRequest};
use super::queue::{Delivery, JobFailure, QueueHandler, QueueStats, RetryPolicy, WorkQueue};
use super::store::JobStore;
use crate::translation::core::TranslationEngine;
use crate::translation::error::TranslationResult;

const QUEUE_NAME: &str = "translation";

/// 翻译队列处理器
struct TranslationWorker {
    engine: Arc<TranslationEngine>,
    store: Arc<dyn JobStore>,
    callbacks: Arc<CallbackDispatcher>,
}

impl TranslationWorker {
    /// 写入终态并排入回调
    async fn finish(&self, job: TranslationJob) -> TranslationResult<()> {
        if !self.store.finalize(&job).await? {
            tracing::debug!(job_id = %job.id, "任务已由其他执行写入终态，跳过");
            return Ok(());
        }

        if let Err(e) = self.callbacks.enqueue_for(&job) {
            tracing::error!(job_id = %job.id, "回调排队失败: {}", e);
        }
        Ok(())
    }

    /// 把仍待处理的任务写为失败
    async fn fail(&self, job_id: &str, attempts: u32, message: String) {
        let mut job = match self.store.get(job_id).await {
            Ok(Some(job)) if !job.is_terminal() => job,
            Ok(_) => return,
            Err(e) => {
                tracing::error!(job_id = %job_id, "无法读取任务，失败状态未写入: {}", e);
                return;
            }
        };

        job.attempts = attempts;
        if let Err(e) = job.fail(message) {
            tracing::error!(job_id = %job_id, "{}", e);
            return;
        }
        if let Err(e) = self.finish(job).await {
            tracing::error!(job_id = %job_id, "写入失败状态出错: {}", e);
        }
    }
}

#[async_trait]
impl QueueHandler<String> for TranslationWorker {
    async fn handle(&self, delivery: &Delivery<String>) -> Result<(), JobFailure> {
        let job_id = &delivery.payload;

        let Some(mut job) = self.store.get(job_id).await.map_err(JobFailure::Retryable)? else {
            tracing::warn!(job_id = %job_id, "任务不存在，丢弃");
            return Ok(());
        };

        if job.is_terminal() {
            tracing::debug!(job_id = %job_id, status = job.status.as_str(), "任务已结束，跳过");
            return Ok(());
        }

        if let Err(e) = self.store.record_attempt(job_id, delivery.attempt).await {
            tracing::warn!(job_id = %job_id, "记录尝试次数失败: {}", e);
        }
        tracing::info!(job_id = %job_id, attempt = delivery.attempt, "开始处理翻译任务");

        let output = self.engine.run(&job).await?;
        let (total_segments, cache_hits) = (output.total_segments, output.cache_hits);

        job.attempts = delivery.attempt;
        job.complete(output).map_err(JobFailure::Fatal)?;
        self.finish(job).await.map_err(JobFailure::Retryable)?;

        tracing::info!(job_id = %job_id, total_segments, cache_hits, "翻译任务完成");
        Ok(())
    }

    async fn on_exhausted(&self, delivery: &Delivery<String>, failure: JobFailure) {
        let job_id = &delivery.payload;
        let error = failure.error();

        if failure.is_fatal() {
            tracing::error!(
                job_id = %job_id,
                attempt = delivery.attempt,
                category = ?error.category(),
                invariant = error.is_invariant_violation(),
                "翻译任务致命失败: {}",
                error
            );
        } else {
            tracing::error!(job_id = %job_id, attempts = delivery.attempt, "翻译任务重试次数耗尽: {}", error);
        }

        self.fail(job_id, delivery.attempt, error.to_string()).await;
    }
}

/// 启动恢复的结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// 重新入队的待处理任务
    pub resumed: usize,
    /// 尝试次数已用尽、直接写为失败的任务
    pub exhausted: usize,
    /// 重新排入的回调
    pub callbacks: usize,
}

/// 任务调度器
pub struct JobScheduler {
    store: Arc<dyn JobStore>,
    worker: Arc<TranslationWorker>,
    policy: RetryPolicy,
    queue: WorkQueue<String>,
}

impl JobScheduler {
    pub fn start(
        engine: Arc<TranslationEngine>,
        store: Arc<dyn JobStore>,
        callbacks: Arc<CallbackDispatcher>,
        policy: RetryPolicy,
        concurrency: usize,
    ) -> Self {
        let worker = Arc::new(TranslationWorker {
            engine,
            store: store.clone(),
            callbacks,
        });

        Self {
            store,
            worker: worker.clone(),
            policy,
            queue: WorkQueue::start(QUEUE_NAME, worker, policy, concurrency),
        }
    }

    /// 校验并接收请求，返回已持久化的待处理任务
    pub async fn submit(&self, request: TranslationRequest) -> TranslationResult<TranslationJob> {
        request.validate()?;

        let job = TranslationJob::from_request(request);
        self.store.insert(&job).await?;
        self.queue.enqueue(job.id.clone())?;

        tracing::info!(
            job_id = %job.id,
            target_lang = %job.target_lang,
            callback_url = %job.callback_url,
            "翻译任务已接收"
        );
        Ok(job)
    }

    pub async fn get(&self, id: &str) -> TranslationResult<Option<TranslationJob>> {
        self.store.get(id).await
    }

    /// 恢复上次运行遗留的工作
    ///
    /// 待处理任务从已记录的尝试次数之后继续；次数已用尽的直接写为失败。
    /// 已结束但回调未结束的任务重新排入回调。
    pub async fn recover(&self) -> TranslationResult<RecoveryReport> {
        let mut report = RecoveryReport::default();
        // 先取回调列表，下面写为失败的任务已由 finish 排入回调
        let unsettled = self.store.unsettled_callbacks().await?;

        for job in self.store.pending().await? {
            if self.policy.allows_retry(job.attempts) {
                self.queue.enqueue_at(job.id, job.attempts + 1)?;
                report.resumed += 1;
            } else {
                tracing::warn!(job_id = %job.id, attempts = job.attempts, "恢复时尝试次数已用尽");
                let message = format!("已执行 {} 次仍未完成，不再重试", job.attempts);
                self.worker.fail(&job.id, job.attempts, message).await;
                report.exhausted += 1;
            }
        }

        for job in unsettled {
            self.worker.callbacks.enqueue_for(&job)?;
            report.callbacks += 1;
        }

        if report != RecoveryReport::default() {
            tracing::info!(
                resumed = report.resumed,
                exhausted = report.exhausted,
                callbacks = report.callbacks,
                "已恢复上次运行遗留的任务"
            );
        }
        Ok(report)
    }

    pub fn stats(&self) -> &QueueStats {
        self.queue.stats()
    }

    pub async fn shutdown(&self) {
        self.queue.shutdown().await;
    }
}
