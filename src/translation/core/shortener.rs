//! 基于 OpenAI 兼容接口的文本缩写

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::provider::TextShortener;
use crate::translation::config::ShortenerConfig;
use crate::translation::error::{TranslationError, TranslationResult};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// 聊天补全缩写器
#[derive(Debug, Clone)]
pub struct ChatShortener {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl ChatShortener {
    /// 未配置 API 密钥时返回 `Ok(None)`
    pub fn from_config(config: &ShortenerConfig) -> TranslationResult<Option<Self>> {
        let Some(api_key) = config.api_key.clone().filter(|key| !key.is_empty()) else {
            tracing::info!("未配置 AI_API_KEY，超长译文将直接截断");
            return Ok(None);
        };

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| TranslationError::ConfigError(format!("创建HTTP客户端失败: {}", e)))?;

        Ok(Some(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
        }))
    }
}

fn system_prompt(language: &str, max_length: usize) -> String {
    format!(
        "You are a professional editor. Your task is to shorten the provided text in {} \
         to be under {} characters (including spaces). Maintain the original tone and meaning \
         as much as possible. Output ONLY the shortened text, no explanations, no quotes.",
        language, max_length
    )
}

#[async_trait]
impl TextShortener for ChatShortener {
    async fn shorten(
        &self,
        text: &str,
        max_length: usize,
        language: &str,
    ) -> TranslationResult<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system_prompt(language, max_length),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: text.to_string(),
                },
            ],
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(TranslationError::ShorteningError(format!(
                "缩写接口返回 {}: {}",
                status, error_text
            )));
        }

        let parsed: ChatResponse = response.json().await?;
        let shortened = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| TranslationError::ShorteningError("缩写接口返回空内容".to_string()))?;

        Ok(shortened)
    }
}
