//! HTTP 请求处理器

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};

use super::types::{ApiError, AppState, HealthResponse, QueuedResponse};
use crate::jobs::{TranslationJob, TranslationRequest};
use crate::translation::error::TranslationError;

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

const INVALID_BODY: &str = "Invalid request body";

fn api_error(status: StatusCode, error: &str, details: Option<String>) -> (StatusCode, Json<ApiError>) {
    (status, Json(ApiError::new(error, details)))
}

/// 提交翻译任务
///
/// 请求体自行解析，以便解析失败与校验失败返回同样的 400 结构。
pub async fn submit_translation(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ApiResult<QueuedResponse> {
    let request: TranslationRequest = serde_json::from_slice(&body)
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, INVALID_BODY, Some(e.to_string())))?;

    match state.scheduler.submit(request).await {
        Ok(job) => Ok(Json(QueuedResponse {
            message: "Translation job queued".to_string(),
            job_id: job.id,
        })),
        Err(TranslationError::InvalidInput(details)) => {
            Err(api_error(StatusCode::BAD_REQUEST, INVALID_BODY, Some(details)))
        }
        Err(e) => {
            tracing::error!("任务提交失败: {}", e);
            Err(api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to queue translation job",
                None,
            ))
        }
    }
}

/// 查询任务
pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<TranslationJob> {
    match state.scheduler.get(&id).await {
        Ok(Some(job)) => Ok(Json(job)),
        Ok(None) => Err(api_error(StatusCode::NOT_FOUND, "Job not found", None)),
        Err(e) => {
            tracing::error!(job_id = %id, "查询任务失败: {}", e);
            Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to load job", None))
        }
    }
}

/// 健康检查
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}
