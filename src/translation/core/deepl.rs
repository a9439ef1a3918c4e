//! DeepL 翻译服务适配器

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use super::provider::TranslationProvider;
use crate::translation::config::ProviderConfig;
use crate::translation::error::{TranslationError, TranslationResult};

/// DeepL 配额用尽时返回的状态码
const QUOTA_EXCEEDED: u16 = 456;

#[derive(Debug, Serialize)]
struct TranslateRequest<'a> {
    text: &'a [String],
    target_lang: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_lang: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    glossary_id: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    translations: Vec<Translation>,
}

#[derive(Debug, Deserialize)]
struct Translation {
    text: String,
}

/// DeepL 客户端
#[derive(Debug, Clone)]
pub struct DeeplProvider {
    client: reqwest::Client,
    api_url: String,
    auth_key: String,
}

impl DeeplProvider {
    pub fn new(config: &ProviderConfig) -> TranslationResult<Self> {
        let auth_key = config
            .auth_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| TranslationError::ConfigError("未配置 DeepL 授权密钥".to_string()))?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| TranslationError::ConfigError(format!("创建HTTP客户端失败: {}", e)))?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            auth_key,
        })
    }

    /// 非 2xx 响应一律归为服务方错误，由任务队列按退避重试
    fn map_status(status: StatusCode, body: String) -> TranslationError {
        match status.as_u16() {
            429 => TranslationError::RateLimitExceeded,
            QUOTA_EXCEEDED => TranslationError::ResourceExhausted("DeepL 字符配额已用尽".to_string()),
            _ => TranslationError::TranslationServiceError(format!("DeepL 返回 {}: {}", status, body)),
        }
    }
}

#[async_trait]
impl TranslationProvider for DeeplProvider {
    fn provider_name(&self) -> &str {
        "deepl"
    }

    async fn translate_batch(
        &self,
        texts: &[String],
        source_lang: Option<&str>,
        target_lang: &str,
        glossary_id: Option<&str>,
    ) -> TranslationResult<Vec<String>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let body = TranslateRequest {
            text: texts,
            target_lang: target_lang.to_uppercase(),
            source_lang: source_lang.map(str::to_uppercase),
            glossary_id,
        };

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("DeepL-Auth-Key {}", self.auth_key))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(Self::map_status(status, error_text));
        }

        let parsed: TranslateResponse = response.json().await?;
        if parsed.translations.len() != texts.len() {
            return Err(TranslationError::TranslationServiceError(format!(
                "DeepL 返回 {} 条结果，期望 {} 条",
                parsed.translations.len(),
                texts.len()
            )));
        }

        tracing::debug!(count = texts.len(), target_lang, "DeepL 批量翻译完成");
        Ok(parsed.translations.into_iter().map(|t| t.text).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_auth_key() {
        let config = ProviderConfig::default();
        assert!(matches!(
            DeeplProvider::new(&config),
            Err(TranslationError::ConfigError(_))
        ));
    }

    #[test]
    fn test_status_mapping() {
        let map = |code: u16| {
            DeeplProvider::map_status(StatusCode::from_u16(code).unwrap(), String::new())
        };

        assert!(matches!(map(400), TranslationError::TranslationServiceError(_)));
        assert!(matches!(map(403), TranslationError::TranslationServiceError(_)));
        assert!(matches!(map(429), TranslationError::RateLimitExceeded));
        assert!(matches!(map(456), TranslationError::ResourceExhausted(_)));
        assert!(matches!(map(503), TranslationError::TranslationServiceError(_)));
        for code in [400, 401, 403, 456, 503] {
            assert!(map(code).is_retryable(), "{}", code);
        }
        assert!(map(401).to_string().contains("401"));
    }

    #[test]
    fn test_request_body_shape() {
        let texts = vec!["Hello".to_string()];
        let body = serde_json::to_value(TranslateRequest {
            text: &texts,
            target_lang: "FR".into(),
            source_lang: None,
            glossary_id: Some("g-1"),
        })
        .unwrap();

        assert_eq!(body["text"][0], "Hello");
        assert_eq!(body["target_lang"], "FR");
        assert!(body.get("source_lang").is_none());
        assert_eq!(body["glossary_id"], "g-1");
    }
}
