//! 测试用的确定性服务实现
//!
//! 不需要网络或密钥即可驱动完整流水线。
//!
//! ```ignore
//! let provider = MockTranslator::suffix(" (fr)");
//! let out = provider.translate_batch(&["Hello".into()], None, "fr", None).await?;
//! assert_eq!(out, vec!["Hello (fr)"]);
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::provider::{TextShortener, TranslationProvider};
use crate::translation::error::{TranslationError, TranslationResult};

/// 模拟翻译模式
#[derive(Debug, Clone)]
pub enum MockMode {
    /// 在原文后追加后缀
    Suffix(String),
    /// 按映射表翻译，未命中时原样返回
    Mappings(HashMap<String, String>),
    /// 少返回一条结果，模拟服务端数量错误
    ShortResponse,
    /// 总是失败
    Error(TranslationError),
}

/// 模拟翻译服务
#[derive(Debug)]
pub struct MockTranslator {
    mode: MockMode,
    delay: Duration,
    /// 前 N 次调用返回 `failure`
    remaining_failures: AtomicUsize,
    failure: TranslationError,
    calls: Mutex<Vec<Vec<String>>>,
}

impl MockTranslator {
    pub fn new(mode: MockMode) -> Self {
        Self {
            mode,
            delay: Duration::ZERO,
            remaining_failures: AtomicUsize::new(0),
            failure: TranslationError::NetworkError("模拟网络故障".to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn suffix(suffix: &str) -> Self {
        Self::new(MockMode::Suffix(suffix.to_string()))
    }

    /// 前 `times` 次调用返回给定错误，之后恢复正常
    pub fn failing_first(mut self, times: usize, error: TranslationError) -> Self {
        self.remaining_failures = AtomicUsize::new(times);
        self.failure = error;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// 每次调用收到的文本
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// 所有调用中送翻的文本总数
    pub fn texts_translated(&self) -> usize {
        self.calls().iter().map(Vec::len).sum()
    }

    fn translate_one(&self, text: &str) -> String {
        match &self.mode {
            MockMode::Suffix(suffix) => format!("{}{}", text, suffix),
            MockMode::Mappings(map) => map.get(text).cloned().unwrap_or_else(|| text.to_string()),
            MockMode::ShortResponse | MockMode::Error(_) => text.to_string(),
        }
    }
}

#[async_trait]
impl TranslationProvider for MockTranslator {
    fn provider_name(&self) -> &str {
        "mock"
    }

    async fn translate_batch(
        &self,
        texts: &[String],
        _source_lang: Option<&str>,
        _target_lang: &str,
        _glossary_id: Option<&str>,
    ) -> TranslationResult<Vec<String>> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(texts.to_vec());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let should_fail = self
            .remaining_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(self.failure.clone());
        }

        match &self.mode {
            MockMode::Error(error) => Err(error.clone()),
            MockMode::ShortResponse => Ok(texts
                .iter()
                .skip(1)
                .map(|text| self.translate_one(text))
                .collect()),
            _ => Ok(texts.iter().map(|text| self.translate_one(text)).collect()),
        }
    }
}

/// 模拟缩写服务
#[derive(Debug)]
pub struct MockShortener {
    reply: Option<String>,
    calls: AtomicUsize,
}

impl MockShortener {
    /// 总是返回固定文本
    pub fn returning(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    /// 总是失败
    pub fn failing() -> Self {
        Self {
            reply: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextShortener for MockShortener {
    async fn shorten(
        &self,
        _text: &str,
        _max_length: usize,
        _language: &str,
    ) -> TranslationResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply
            .clone()
            .ok_or_else(|| TranslationError::ShorteningError("模拟缩写失败".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_suffix_mode_records_calls() {
        let mock = MockTranslator::suffix(" (fr)");
        let out = mock
            .translate_batch(&["Hello".into(), "World".into()], None, "fr", None)
            .await
            .unwrap();

        assert_eq!(out, vec!["Hello (fr)", "World (fr)"]);
        assert_eq!(mock.call_count(), 1);
        assert_eq!(mock.texts_translated(), 2);
    }

    #[tokio::test]
    async fn test_fails_then_recovers() {
        let mock = MockTranslator::suffix("!")
            .failing_first(2, TranslationError::TimeoutError("slow".into()));
        let texts = vec!["a".to_string()];

        assert!(mock.translate_batch(&texts, None, "de", None).await.is_err());
        assert!(mock.translate_batch(&texts, None, "de", None).await.is_err());
        assert_eq!(
            mock.translate_batch(&texts, None, "de", None).await.unwrap(),
            vec!["a!"]
        );
    }
}
