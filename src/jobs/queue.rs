//! 进程内工作队列
//!
//! 每个队列由一个无界通道和一个信号量限流的工作池组成：
//! 分发任务从通道取出投递，获取许可后在独立任务中执行处理器。
//! 可重试的失败按指数退避重新入队，直到尝试次数用尽；
//! 致命失败和处理器 panic 立即结束。关闭时先停止接收，处理完通道里
//! 已有的投递，再等待所有在途投递完成。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch, Mutex, Semaphore};
use tokio::task::JoinHandle;

use crate::translation::config::PoolConfig;
use crate::translation::error::{TranslationError, TranslationResult};

/// 执行失败的分类
#[derive(Debug, Clone)]
pub enum JobFailure {
    /// 退避后重试
    Retryable(TranslationError),
    /// 不再重试
    Fatal(TranslationError),
}

impl JobFailure {
    /// 按错误本身的可重试性分类
    pub fn classify(error: TranslationError) -> Self {
        if error.is_retryable() {
            JobFailure::Retryable(error)
        } else {
            JobFailure::Fatal(error)
        }
    }

    pub fn error(&self) -> &TranslationError {
        match self {
            JobFailure::Retryable(error) | JobFailure::Fatal(error) => error,
        }
    }

    pub fn into_error(self) -> TranslationError {
        match self {
            JobFailure::Retryable(error) | JobFailure::Fatal(error) => error,
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, JobFailure::Fatal(_))
    }
}

impl From<TranslationError> for JobFailure {
    fn from(error: TranslationError) -> Self {
        Self::classify(error)
    }
}

/// 重试策略：第 n 次失败后等待 `base * 2^(n-1)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_base: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff_base: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_base,
        }
    }

    /// 第 `attempt` 次尝试失败后的等待时间
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.backoff_base.saturating_mul(1u32 << exponent)
    }

    pub fn allows_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

impl From<&PoolConfig> for RetryPolicy {
    fn from(config: &PoolConfig) -> Self {
        Self::new(config.max_attempts, config.backoff_base())
    }
}

/// 一次投递
#[derive(Debug, Clone)]
pub struct Delivery<T> {
    pub payload: T,
    /// 从 1 开始
    pub attempt: u32,
}

/// 队列处理器
#[async_trait]
pub trait QueueHandler<T>: Send + Sync + 'static {
    async fn handle(&self, delivery: &Delivery<T>) -> Result<(), JobFailure>;

    /// 致命失败或重试次数耗尽时调用一次
    async fn on_exhausted(&self, delivery: &Delivery<T>, failure: JobFailure);
}

/// 队列统计
#[derive(Debug, Default)]
pub struct QueueStats {
    pub enqueued: AtomicUsize,
    pub succeeded: AtomicUsize,
    pub retried: AtomicUsize,
    pub exhausted: AtomicUsize,
}

impl QueueStats {
    pub fn get_succeeded(&self) -> usize {
        self.succeeded.load(Ordering::Relaxed)
    }

    pub fn get_retried(&self) -> usize {
        self.retried.load(Ordering::Relaxed)
    }

    pub fn get_exhausted(&self) -> usize {
        self.exhausted.load(Ordering::Relaxed)
    }
}

/// 工作队列
pub struct WorkQueue<T> {
    name: String,
    sender: mpsc::UnboundedSender<Delivery<T>>,
    shutdown: watch::Sender<bool>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
    stats: Arc<QueueStats>,
}

impl<T: Clone + Send + Sync + 'static> WorkQueue<T> {
    /// 启动队列和工作池
    pub fn start(
        name: impl Into<String>,
        handler: Arc<dyn QueueHandler<T>>,
        policy: RetryPolicy,
        concurrency: usize,
    ) -> Self {
        let name = name.into();
        let (sender, receiver) = mpsc::unbounded_channel();
        let (shutdown, shutdown_rx) = watch::channel(false);
        let stats = Arc::new(QueueStats::default());

        let worker = Dispatcher {
            name: name.clone(),
            handler,
            policy,
            concurrency: concurrency.max(1),
            sender: sender.clone(),
            stats: stats.clone(),
        };
        let dispatcher = tokio::spawn(worker.run(receiver, shutdown_rx));

        tracing::info!(queue = %name, concurrency, max_attempts = policy.max_attempts, "队列已启动");

        Self {
            name,
            sender,
            shutdown,
            dispatcher: Mutex::new(Some(dispatcher)),
            stats,
        }
    }

    /// 加入队列（第一次尝试）
    pub fn enqueue(&self, payload: T) -> TranslationResult<()> {
        self.enqueue_at(payload, 1)
    }

    /// 以指定的尝试序号加入队列，用于恢复已执行过的任务
    pub fn enqueue_at(&self, payload: T, attempt: u32) -> TranslationResult<()> {
        if *self.shutdown.borrow() {
            return Err(TranslationError::QueueClosed(self.name.clone()));
        }
        self.sender
            .send(Delivery {
                payload,
                attempt: attempt.max(1),
            })
            .map_err(|_| TranslationError::QueueClosed(self.name.clone()))?;
        self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub fn stats(&self) -> &QueueStats {
        &self.stats
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 停止接收新投递，处理完通道中已有的投递并等待其完成
    ///
    /// 处于退避等待中的重试会被丢弃，由持久化状态在下次启动时恢复。
    pub async fn shutdown(&self) {
        let _ = self.shutdown.send(true);
        if let Some(handle) = self.dispatcher.lock().await.take() {
            if let Err(e) = handle.await {
                tracing::error!(queue = %self.name, "分发任务异常退出: {}", e);
            }
        }
        tracing::info!(queue = %self.name, "队列已关闭");
    }
}

struct Dispatcher<T> {
    name: String,
    handler: Arc<dyn QueueHandler<T>>,
    policy: RetryPolicy,
    concurrency: usize,
    sender: mpsc::UnboundedSender<Delivery<T>>,
    stats: Arc<QueueStats>,
}

impl<T: Clone + Send + Sync + 'static> Dispatcher<T> {
    async fn run(
        self,
        mut receiver: mpsc::UnboundedReceiver<Delivery<T>>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));

        loop {
            let delivery = tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                delivery = receiver.recv() => match delivery {
                    Some(delivery) => delivery,
                    None => break,
                },
            };
            self.dispatch(delivery, &semaphore, &shutdown).await;
        }

        // 关闭通道后继续处理已入队的投递
        receiver.close();
        let mut drained = 0usize;
        while let Some(delivery) = receiver.recv().await {
            self.dispatch(delivery, &semaphore, &shutdown).await;
            drained += 1;
        }

        // 等待在途投递全部释放许可
        let _ = semaphore.acquire_many(self.concurrency as u32).await;
        tracing::debug!(queue = %self.name, drained, "工作池已排空");
    }

    async fn dispatch(
        &self,
        delivery: Delivery<T>,
        semaphore: &Arc<Semaphore>,
        shutdown: &watch::Receiver<bool>,
    ) {
        let permit = match semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => return,
        };

        let handler = self.handler.clone();
        let sender = self.sender.clone();
        let stats = self.stats.clone();
        let policy = self.policy;
        let name = self.name.clone();
        let retry_shutdown = shutdown.clone();

        tokio::spawn(async move {
            let outcome = run_handler(&handler, &delivery).await;

            match outcome {
                Ok(()) => {
                    stats.succeeded.fetch_add(1, Ordering::Relaxed);
                }
                Err(JobFailure::Retryable(error)) if policy.allows_retry(delivery.attempt) => {
                    let delay = policy.delay_for(delivery.attempt);
                    tracing::warn!(
                        queue = %name,
                        attempt = delivery.attempt,
                        delay_ms = delay.as_millis() as u64,
                        "处理失败，稍后重试: {}",
                        error
                    );
                    stats.retried.fetch_add(1, Ordering::Relaxed);
                    // 退避期间不占用许可
                    drop(permit);
                    schedule_retry(sender, delivery, delay, retry_shutdown).await;
                }
                Err(failure) => {
                    handler.on_exhausted(&delivery, failure).await;
                    stats.exhausted.fetch_add(1, Ordering::Relaxed);
                }
            }
        });
    }
}

/// 在独立任务中执行处理器，panic 视为致命失败
async fn run_handler<T: Clone + Send + Sync + 'static>(
    handler: &Arc<dyn QueueHandler<T>>,
    delivery: &Delivery<T>,
) -> Result<(), JobFailure> {
    let handler = handler.clone();
    let delivery = delivery.clone();
    match tokio::spawn(async move { handler.handle(&delivery).await }).await {
        Ok(outcome) => outcome,
        Err(e) => Err(JobFailure::Fatal(TranslationError::InternalError(format!(
            "处理器异常终止: {}",
            e
        )))),
    }
}

async fn schedule_retry<T>(
    sender: mpsc::UnboundedSender<Delivery<T>>,
    delivery: Delivery<T>,
    delay: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    tokio::select! {
        _ = tokio::time::sleep(delay) => {
            let next = Delivery {
                payload: delivery.payload,
                attempt: delivery.attempt + 1,
            };
            if sender.send(next).is_err() {
                tracing::debug!("队列已关闭，丢弃重试");
            }
        }
        _ = shutdown.wait_for(|closed| *closed) => {
            tracing::debug!(attempt = delivery.attempt, "关闭期间丢弃待重试投递");
        }
    }
}
