//! 回调投递
//!
//! 回调有独立的队列和重试策略。每次 POST 都会追加一条尝试记录；
//! 投递成功或重试耗尽后在任务上标记回调结束，重试耗尽不会修改任务状态。
//! 未标记的终态任务会在下次启动时重新回调。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::model::{CallbackAttempt, CallbackPayload, TranslationJob};
use super::queue::{Delivery, JobFailure, QueueHandler, QueueStats, RetryPolicy, WorkQueue};
use super::store::{CallbackLog, JobStore};
use crate::translation::error::{TranslationError, TranslationResult};

const QUEUE_NAME: &str = "callback";

/// 接收方的 HTTP 响应
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookResponse {
    pub status: u16,
    pub body: String,
}

impl WebhookResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Webhook 发送能力
///
/// 只有传输层失败（连接、超时）才返回错误，任何 HTTP 响应都视为成功送达。
#[async_trait]
pub trait WebhookClient: Send + Sync {
    async fn post(&self, url: &str, payload: &CallbackPayload) -> TranslationResult<WebhookResponse>;
}

/// 基于 reqwest 的 Webhook 客户端
#[derive(Debug, Clone)]
pub struct HttpWebhookClient {
    client: reqwest::Client,
}

impl HttpWebhookClient {
    pub fn new(timeout: Duration) -> TranslationResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TranslationError::ConfigError(format!("创建HTTP客户端失败: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl WebhookClient for HttpWebhookClient {
    async fn post(&self, url: &str, payload: &CallbackPayload) -> TranslationResult<WebhookResponse> {
        let response = self.client.post(url).json(payload).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Ok(WebhookResponse { status, body })
    }
}

/// 一次待投递的回调
#[derive(Debug, Clone)]
pub struct CallbackTask {
    pub job_id: String,
    pub url: String,
    pub payload: CallbackPayload,
}

impl CallbackTask {
    /// 终态任务的回调；非终态任务返回 `None`
    pub fn for_job(job: &TranslationJob) -> Option<Self> {
        CallbackPayload::for_job(job).map(|payload| Self {
            job_id: job.id.clone(),
            url: job.callback_url.clone(),
            payload,
        })
    }
}

/// 单次投递器：一次 POST，一条记录
pub struct CallbackSender {
    client: Arc<dyn WebhookClient>,
    log: Arc<dyn CallbackLog>,
    jobs: Arc<dyn JobStore>,
}

impl CallbackSender {
    pub fn new(
        client: Arc<dyn WebhookClient>,
        log: Arc<dyn CallbackLog>,
        jobs: Arc<dyn JobStore>,
    ) -> Self {
        Self { client, log, jobs }
    }

    /// 标记回调结束；写入失败时下次启动会再投递一次
    async fn settle(&self, job_id: &str) {
        if let Err(e) = self.jobs.settle_callback(job_id).await {
            tracing::warn!(job_id, "回调状态写入失败: {}", e);
        }
    }

    /// 投递一次并记录结果；非 2xx 或传输失败返回 `CallbackError`
    pub async fn deliver(
        &self,
        job_id: &str,
        url: &str,
        payload: &CallbackPayload,
    ) -> TranslationResult<()> {
        let outcome = self.client.post(url, payload).await;

        let (attempt, result) = match outcome {
            Ok(response) if response.is_success() => (
                CallbackAttempt::new(job_id, response.status, &response.body, None),
                Ok(()),
            ),
            Ok(response) => {
                let message = format!("接收方返回 HTTP {}", response.status);
                (
                    CallbackAttempt::new(job_id, response.status, &response.body, Some(message.clone())),
                    Err(TranslationError::CallbackError {
                        status: response.status,
                        message,
                    }),
                )
            }
            Err(error) => (
                CallbackAttempt::new(job_id, 0, "", Some(error.to_string())),
                Err(TranslationError::CallbackError {
                    status: 0,
                    message: error.to_string(),
                }),
            ),
        };

        if let Err(e) = self.log.append(&attempt).await {
            tracing::warn!(job_id, "回调记录写入失败: {}", e);
        }

        match &result {
            Ok(()) => tracing::info!(job_id, url, status = attempt.http_status, "回调投递成功"),
            Err(TranslationError::CallbackError { status: 429, .. }) => {
                tracing::warn!(job_id, url, "回调地址限流 (HTTP 429)，稍后重试")
            }
            Err(e) => tracing::warn!(job_id, url, status = attempt.http_status, "回调投递失败: {}", e),
        }

        result
    }
}

#[async_trait]
impl QueueHandler<CallbackTask> for CallbackSender {
    async fn handle(&self, delivery: &Delivery<CallbackTask>) -> Result<(), JobFailure> {
        let task = &delivery.payload;
        self.deliver(&task.job_id, &task.url, &task.payload)
            .await
            .map_err(JobFailure::Retryable)?;
        self.settle(&task.job_id).await;
        Ok(())
    }

    async fn on_exhausted(&self, delivery: &Delivery<CallbackTask>, failure: JobFailure) {
        tracing::error!(
            job_id = %delivery.payload.job_id,
            url = %delivery.payload.url,
            attempts = delivery.attempt,
            "回调投递重试次数耗尽: {}",
            failure.error()
        );
        self.settle(&delivery.payload.job_id).await;
    }
}

/// 回调分发器
pub struct CallbackDispatcher {
    queue: WorkQueue<CallbackTask>,
}

impl CallbackDispatcher {
    pub fn start(
        client: Arc<dyn WebhookClient>,
        log: Arc<dyn CallbackLog>,
        jobs: Arc<dyn JobStore>,
        policy: RetryPolicy,
        concurrency: usize,
    ) -> Self {
        let sender = Arc::new(CallbackSender::new(client, log, jobs));
        Self {
            queue: WorkQueue::start(QUEUE_NAME, sender, policy, concurrency),
        }
    }

    /// 为终态任务排入回调
    pub fn enqueue_for(&self, job: &TranslationJob) -> TranslationResult<()> {
        let task = CallbackTask::for_job(job).ok_or_else(|| {
            TranslationError::InternalError(format!("任务 {} 尚未结束，不能回调", job.id))
        })?;
        self.queue.enqueue(task)
    }

    pub fn stats(&self) -> &QueueStats {
        self.queue.stats()
    }

    pub async fn shutdown(&self) {
        self.queue.shutdown().await;
    }
}
