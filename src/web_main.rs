//! 翻译中继服务主程序入口

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use json_translator::env::{core::LogLevel, EnvVar};
use json_translator::jobs::{
    CallbackDispatcher, CallbackLog, HttpWebhookClient, JobScheduler, JobStore, RetryPolicy,
};
use json_translator::translation::config::{AppConfig, ConfigManager, StorageBackend};
use json_translator::translation::core::{
    ChatShortener, DeeplProvider, TextShortener, TranslationEngine,
};
use json_translator::translation::error::{TranslationError, TranslationResult};
use json_translator::translation::storage::{CacheStore, MemoryStore, TranslationCache};
use json_translator::web::WebServer;

#[cfg(feature = "mongo")]
use json_translator::translation::storage::MongoStore;

#[derive(Parser, Debug)]
#[command(name = "json-translator", version, about = "Asynchronous JSON translation relay")]
struct Args {
    /// 配置文件路径
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// 打印支持的环境变量并退出
    #[arg(long)]
    env_docs: bool,
}

/// 打开的存储后端
struct Storage {
    cache: Arc<dyn CacheStore>,
    jobs: Arc<dyn JobStore>,
    callbacks: Arc<dyn CallbackLog>,
    #[cfg(feature = "mongo")]
    mongo: Option<MongoStore>,
}

impl Storage {
    async fn open(config: &AppConfig) -> TranslationResult<Self> {
        match config.storage.backend {
            StorageBackend::Memory => {
                tracing::warn!("使用内存存储，进程重启后任务与缓存将丢失");
                let store = Arc::new(MemoryStore::new());
                Ok(Self {
                    cache: store.clone(),
                    jobs: store.clone(),
                    callbacks: store,
                    #[cfg(feature = "mongo")]
                    mongo: None,
                })
            }
            #[cfg(feature = "mongo")]
            StorageBackend::Mongo => {
                let uri = config.storage.uri.as_deref().ok_or_else(|| {
                    TranslationError::ConfigError("MongoDB 后端需要配置 storage.uri".to_string())
                })?;
                let client = MongoStore::connect(uri, &config.storage.database).await?;
                let store = Arc::new(client.clone());
                Ok(Self {
                    cache: store.clone(),
                    jobs: store.clone(),
                    callbacks: store,
                    mongo: Some(client),
                })
            }
            #[cfg(not(feature = "mongo"))]
            StorageBackend::Mongo => Err(TranslationError::ConfigError(
                "MongoDB 后端需要启用 mongo feature".to_string(),
            )),
        }
    }

    async fn close(self) {
        #[cfg(feature = "mongo")]
        if let Some(client) = self.mongo {
            client.close().await;
            tracing::info!("MongoDB 连接已关闭");
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = LogLevel::get().unwrap_or_else(|e| {
            eprintln!("警告: {}", e);
            "info".to_string()
        });
        EnvFilter::new(level)
    });

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("无法监听 Ctrl-C 信号: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("收到停止信号，开始关闭");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    if args.env_docs {
        println!("{}", json_translator::env::generate_env_docs());
        return Ok(());
    }

    // 日志级别可能来自 .env
    ConfigManager::load_dotenv();
    init_tracing();
    let config = ConfigManager::load(args.config.as_deref())?.into_config();

    let storage = Storage::open(&config).await?;

    let provider = Arc::new(DeeplProvider::new(&config.provider)?);
    let shortener = ChatShortener::from_config(&config.shortener)?
        .map(|shortener| Arc::new(shortener) as Arc<dyn TextShortener>);
    let cache = Arc::new(TranslationCache::new(
        storage.cache.clone(),
        config.cache.local_cache_size,
    ));
    let engine = Arc::new(TranslationEngine::new(
        provider,
        cache,
        shortener,
        &config.pipeline,
    ));

    let callbacks = Arc::new(CallbackDispatcher::start(
        Arc::new(HttpWebhookClient::new(config.queue.callback_timeout())?),
        storage.callbacks.clone(),
        storage.jobs.clone(),
        RetryPolicy::from(&config.queue.callback),
        config.queue.callback.concurrency,
    ));
    let scheduler = Arc::new(JobScheduler::start(
        engine,
        storage.jobs.clone(),
        callbacks.clone(),
        RetryPolicy::from(&config.queue.translation),
        config.queue.translation.concurrency,
    ));

    scheduler.recover().await?;

    let server = WebServer::new(config.server.clone(), scheduler.clone());
    server.start(shutdown_signal()).await?;

    // 翻译队列排空时产生的回调进入回调队列，回调队列随后排空
    scheduler.shutdown().await;
    callbacks.shutdown().await;
    storage.close().await;

    tracing::info!("服务已停止");
    Ok(())
}
