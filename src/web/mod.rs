//! Web 服务器模块
//!
//! 提供任务提交、任务查询和健康检查三个接口

pub mod handlers;
pub mod routes;
pub mod types;

pub use handlers::*;
pub use routes::*;
pub use types::*;

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::jobs::JobScheduler;
use crate::translation::config::ServerConfig;
use crate::translation::error::{TranslationError, TranslationResult};

/// Web 服务器
pub struct WebServer {
    config: ServerConfig,
    scheduler: Arc<JobScheduler>,
}

impl WebServer {
    /// 创建新的 Web 服务器
    pub fn new(config: ServerConfig, scheduler: Arc<JobScheduler>) -> Self {
        Self { config, scheduler }
    }

    /// 创建路由器
    pub fn router(&self) -> Router {
        let app_state = Arc::new(AppState {
            scheduler: self.scheduler.clone(),
        });

        create_routes()
            .with_state(app_state)
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
    }

    /// 启动 Web 服务器，`shutdown` 完成后停止接收新连接
    pub async fn start<F>(&self, shutdown: F) -> TranslationResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let address = self.config.address();
        let listener = tokio::net::TcpListener::bind(&address)
            .await
            .map_err(|e| TranslationError::ConfigError(format!("无法绑定地址 {}: {}", address, e)))?;

        tracing::info!("Web 服务器启动于 http://{}", address);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| TranslationError::InternalError(format!("服务器错误: {}", e)))?;

        tracing::info!("Web 服务器已停止");
        Ok(())
    }
}
