// 集成测试公共模块
//
// 提供测试辅助工具和共享功能

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use json_translator::jobs::{
    CallbackDispatcher, CallbackPayload, JobScheduler, RetryPolicy, TranslationJob,
    TranslationRequest, WebhookClient, WebhookResponse,
};
use json_translator::translation::config::PipelineConfig;
use json_translator::translation::core::{TextShortener, TranslationEngine, TranslationProvider};
use json_translator::translation::error::{TranslationError, TranslationResult};
use json_translator::translation::storage::{MemoryStore, TranslationCache};

/// 测试用的快速重试策略
pub fn fast_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::new(max_attempts, Duration::from_millis(2))
}

/// 构建基于内存存储的翻译引擎
pub fn build_engine(
    provider: Arc<dyn TranslationProvider>,
    shortener: Option<Arc<dyn TextShortener>>,
    store: Arc<MemoryStore>,
) -> TranslationEngine {
    let cache = Arc::new(TranslationCache::new(store, 1000));
    TranslationEngine::new(provider, cache, shortener, &PipelineConfig::default())
}

/// 按顺序返回预设结果并记录所有请求的 Webhook 客户端
///
/// 状态码 0 表示传输层失败；脚本用完后一律返回 200。
#[derive(Default)]
pub struct RecordingClient {
    script: Mutex<VecDeque<u16>>,
    received: Mutex<Vec<(String, CallbackPayload)>>,
}

impl RecordingClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scripted(statuses: &[u16]) -> Self {
        Self {
            script: Mutex::new(statuses.iter().copied().collect()),
            received: Mutex::new(Vec::new()),
        }
    }

    pub fn received(&self) -> Vec<(String, CallbackPayload)> {
        self.received.lock().unwrap().clone()
    }
}

#[async_trait]
impl WebhookClient for RecordingClient {
    async fn post(&self, url: &str, payload: &CallbackPayload) -> TranslationResult<WebhookResponse> {
        self.received
            .lock()
            .unwrap()
            .push((url.to_string(), payload.clone()));

        match self.script.lock().unwrap().pop_front() {
            Some(0) => Err(TranslationError::NetworkError("connection refused".into())),
            Some(status) => Ok(WebhookResponse {
                status,
                body: format!("status {}", status),
            }),
            None => Ok(WebhookResponse {
                status: 200,
                body: "ok".into(),
            }),
        }
    }
}

/// 完整的任务运行环境：内存存储 + 模拟服务 + 记录回调的客户端
pub struct TestEnvironment {
    pub store: Arc<MemoryStore>,
    pub client: Arc<RecordingClient>,
    pub callbacks: Arc<CallbackDispatcher>,
    pub scheduler: JobScheduler,
}

impl TestEnvironment {
    pub fn new(provider: Arc<dyn TranslationProvider>, client: RecordingClient) -> Self {
        Self::with_store(provider, client, Arc::new(MemoryStore::new()), 3)
    }

    pub fn with_store(
        provider: Arc<dyn TranslationProvider>,
        client: RecordingClient,
        store: Arc<MemoryStore>,
        max_attempts: u32,
    ) -> Self {
        Self::with_policies(provider, client, store, fast_policy(max_attempts), fast_policy(5))
    }

    /// 自定义翻译与回调的重试策略
    pub fn with_policies(
        provider: Arc<dyn TranslationProvider>,
        client: RecordingClient,
        store: Arc<MemoryStore>,
        translation_policy: RetryPolicy,
        callback_policy: RetryPolicy,
    ) -> Self {
        let client = Arc::new(client);
        let engine = Arc::new(build_engine(provider, None, store.clone()));
        let callbacks = Arc::new(CallbackDispatcher::start(
            client.clone(),
            store.clone(),
            store.clone(),
            callback_policy,
            2,
        ));
        let scheduler = JobScheduler::start(
            engine,
            store.clone(),
            callbacks.clone(),
            translation_policy,
            2,
        );

        Self {
            store,
            client,
            callbacks,
            scheduler,
        }
    }

    /// 轮询直到任务进入终态
    pub async fn wait_for_terminal(&self, id: &str) -> TranslationJob {
        for _ in 0..400 {
            if let Some(job) = self.scheduler.get(id).await.unwrap() {
                if job.is_terminal() {
                    return job;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("job {} did not finish in time", id);
    }

    /// 轮询直到收到指定数量的回调请求
    pub async fn wait_for_callbacks(&self, count: usize) -> Vec<(String, CallbackPayload)> {
        for _ in 0..400 {
            let received = self.client.received();
            if received.len() >= count {
                return received;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("expected {} callbacks, got {}", count, self.client.received().len());
    }

    pub async fn shutdown(&self) {
        self.scheduler.shutdown().await;
        self.callbacks.shutdown().await;
    }
}

/// 构造提交请求
pub fn request(document: Value, constraints: &[(&str, usize)]) -> TranslationRequest {
    let constraints: BTreeMap<String, usize> = constraints
        .iter()
        .map(|(path, max)| (path.to_string(), *max))
        .collect();

    serde_json::from_value(json!({
        "json": document,
        "constraints": constraints,
        "targetLang": "fr",
        "callbackUrl": "http://localhost:9000/hook",
        "metadata": {"requestId": "r-1"}
    }))
    .unwrap()
}
