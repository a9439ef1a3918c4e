//! 任务数据模型
//!
//! 提交请求、持久化的任务记录、回调载荷和回调尝试记录。

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::translation::config::constants;
use crate::translation::error::{TranslationError, TranslationResult};

/// 翻译提交请求
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationRequest {
    pub json: Value,
    /// 路径字符串 → 最大字符数
    #[serde(default)]
    pub constraints: BTreeMap<String, usize>,
    /// 为空表示自动检测
    #[serde(default)]
    pub source_lang: Option<String>,
    pub target_lang: String,
    pub callback_url: String,
    #[serde(default)]
    pub glossary_id: Option<String>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

impl TranslationRequest {
    /// 在创建任务之前校验请求
    pub fn validate(&self) -> TranslationResult<()> {
        if self.target_lang.trim().is_empty() {
            return Err(TranslationError::InvalidInput("targetLang 不能为空".to_string()));
        }

        let url = url::Url::parse(&self.callback_url)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(TranslationError::InvalidInput(format!(
                "callbackUrl 必须是 http(s) 地址: {}",
                self.callback_url
            )));
        }

        if let Some((path, _)) = self.constraints.iter().find(|(_, max)| **max == 0) {
            return Err(TranslationError::InvalidInput(format!(
                "约束 {} 的最大长度必须大于0",
                path
            )));
        }

        Ok(())
    }
}

/// 任务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, JobStatus::Pending)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

/// 一次成功执行的产出
#[derive(Debug, Clone, PartialEq)]
pub struct JobOutput {
    pub output_json: Value,
    pub total_segments: usize,
    pub cache_hits: usize,
}

/// 持久化的翻译任务
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationJob {
    pub id: String,
    pub status: JobStatus,
    pub source_lang: Option<String>,
    pub target_lang: String,
    pub input_json: Value,
    pub output_json: Option<Value>,
    #[serde(default)]
    pub constraints: BTreeMap<String, usize>,
    pub callback_url: String,
    pub glossary_id: Option<String>,
    pub metadata: Option<Value>,
    pub error: Option<String>,
    pub total_segments: usize,
    pub cache_hits: usize,
    pub attempts: u32,
    /// 回调已投递成功或重试耗尽；为 `false` 的终态任务在启动时重新回调
    #[serde(default)]
    pub callback_settled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TranslationJob {
    /// 由已校验的请求创建待处理任务
    pub fn from_request(request: TranslationRequest) -> Self {
        let now = Utc::now();
        let source_lang = request
            .source_lang
            .map(|lang| lang.trim().to_string())
            .filter(|lang| !lang.is_empty());

        Self {
            id: Uuid::new_v4().to_string(),
            status: JobStatus::Pending,
            source_lang,
            target_lang: request.target_lang,
            input_json: request.json,
            output_json: None,
            constraints: request.constraints,
            callback_url: request.callback_url,
            glossary_id: request.glossary_id,
            metadata: request.metadata,
            error: None,
            total_segments: 0,
            cache_hits: 0,
            attempts: 0,
            callback_settled: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// 转为完成状态；终态任务拒绝再次转换
    pub fn complete(&mut self, output: JobOutput) -> TranslationResult<()> {
        self.ensure_pending(JobStatus::Completed)?;
        self.status = JobStatus::Completed;
        self.output_json = Some(output.output_json);
        self.total_segments = output.total_segments;
        self.cache_hits = output.cache_hits;
        self.error = None;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// 转为失败状态；终态任务拒绝再次转换
    pub fn fail(&mut self, error: impl Into<String>) -> TranslationResult<()> {
        self.ensure_pending(JobStatus::Failed)?;
        self.status = JobStatus::Failed;
        self.output_json = None;
        self.error = Some(error.into());
        self.updated_at = Utc::now();
        Ok(())
    }

    fn ensure_pending(&self, target: JobStatus) -> TranslationResult<()> {
        if self.is_terminal() {
            return Err(TranslationError::InternalError(format!(
                "任务 {} 已处于 {} 状态，不能再转为 {}",
                self.id,
                self.status.as_str(),
                target.as_str()
            )));
        }
        Ok(())
    }
}

/// 回调结果状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallbackStatus {
    Completed,
    Failed,
}

/// 投递给调用方的回调载荷
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackPayload {
    pub status: CallbackStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub source_lang: Option<String>,
    pub target_lang: String,
    pub metadata: Option<Value>,
    pub timestamp: String,
}

impl CallbackPayload {
    /// 根据终态任务构建载荷，非终态任务返回 `None`
    pub fn for_job(job: &TranslationJob) -> Option<Self> {
        let (status, data, error) = match job.status {
            JobStatus::Pending => return None,
            JobStatus::Completed => (CallbackStatus::Completed, job.output_json.clone(), None),
            JobStatus::Failed => (
                CallbackStatus::Failed,
                None,
                Some(job.error.clone().unwrap_or_else(|| "unknown error".to_string())),
            ),
        };

        Some(Self {
            status,
            data,
            error,
            source_lang: job.source_lang.clone(),
            target_lang: job.target_lang.clone(),
            metadata: job.metadata.clone(),
            timestamp: Utc::now().to_rfc3339(),
        })
    }
}

/// 单次回调投递记录（只追加）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackAttempt {
    pub job_id: String,
    /// 没有收到响应时为 0
    pub http_status: u16,
    pub response_body: String,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl CallbackAttempt {
    pub fn new(
        job_id: impl Into<String>,
        http_status: u16,
        response_body: &str,
        error: Option<String>,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            http_status,
            response_body: response_body
                .chars()
                .take(constants::CALLBACK_BODY_LIMIT)
                .collect(),
            error,
            timestamp: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.http_status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request() -> TranslationRequest {
        serde_json::from_value(json!({
            "json": {"title": "Hello"},
            "targetLang": "fr",
            "callbackUrl": "https://example.com/hook",
            "metadata": {"ref": 7}
        }))
        .unwrap()
    }

    #[test]
    fn test_request_defaults() {
        let req = request();
        assert!(req.source_lang.is_none());
        assert!(req.constraints.is_empty());
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_request_validation() {
        let mut req = request();
        req.callback_url = "ftp://example.com/hook".into();
        assert!(matches!(req.validate(), Err(TranslationError::InvalidInput(_))));

        let mut req = request();
        req.callback_url = "not a url".into();
        assert!(req.validate().is_err());

        let mut req = request();
        req.target_lang = " ".into();
        assert!(req.validate().is_err());

        let mut req = request();
        req.constraints.insert("title".into(), 0);
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_empty_source_lang_means_auto() {
        let mut req = request();
        req.source_lang = Some("".into());
        assert!(TranslationJob::from_request(req).source_lang.is_none());
    }

    #[test]
    fn test_single_terminal_transition() {
        let mut job = TranslationJob::from_request(request());
        assert_eq!(job.status, JobStatus::Pending);

        job.complete(JobOutput {
            output_json: json!({"title": "Bonjour"}),
            total_segments: 1,
            cache_hits: 0,
        })
        .unwrap();
        assert_eq!(job.status, JobStatus::Completed);

        assert!(job.fail("late failure").is_err());
        assert!(job
            .complete(JobOutput {
                output_json: json!(null),
                total_segments: 0,
                cache_hits: 0
            })
            .is_err());
        assert_eq!(job.output_json, Some(json!({"title": "Bonjour"})));
    }

    #[test]
    fn test_callback_payload_shape() {
        let mut job = TranslationJob::from_request(request());
        assert!(CallbackPayload::for_job(&job).is_none());

        job.fail("provider down").unwrap();
        let payload = serde_json::to_value(CallbackPayload::for_job(&job).unwrap()).unwrap();

        assert_eq!(payload["status"], "failed");
        assert_eq!(payload["error"], "provider down");
        assert!(payload.get("data").is_none());
        assert_eq!(payload["targetLang"], "fr");
        assert_eq!(payload["metadata"], json!({"ref": 7}));
    }

    #[test]
    fn test_attempt_body_is_truncated() {
        let body = "x".repeat(5000);
        let attempt = CallbackAttempt::new("job", 500, &body, None);
        assert_eq!(attempt.response_body.chars().count(), 1000);
        assert!(!attempt.is_success());
    }
}
