//! 批量翻译模块
//!
//! 把缓存未命中的句子按固定大小分批送往翻译服务，保证结果与输入
//! 一一对应。任何一批失败都会使本次执行整体失败，由任务调度层决定是否重试。

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::translation::config::constants;
use crate::translation::core::provider::TranslationProvider;
use crate::translation::error::{TranslationError, TranslationResult};

/// 批量翻译器
pub struct BatchTranslator {
    provider: Arc<dyn TranslationProvider>,
    batch_size: usize,
    stats: BatchStats,
}

impl BatchTranslator {
    pub fn new(provider: Arc<dyn TranslationProvider>, batch_size: usize) -> Self {
        Self {
            provider,
            batch_size: batch_size.max(1),
            stats: BatchStats::default(),
        }
    }

    pub fn with_default_size(provider: Arc<dyn TranslationProvider>) -> Self {
        Self::new(provider, constants::BATCH_SIZE)
    }

    pub fn provider_name(&self) -> &str {
        self.provider.provider_name()
    }

    /// 翻译全部文本，返回与输入顺序一致的结果
    pub async fn translate(
        &self,
        texts: &[String],
        source_lang: Option<&str>,
        target_lang: &str,
        glossary_id: Option<&str>,
    ) -> TranslationResult<Vec<String>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let start = Instant::now();
        let mut results = Vec::with_capacity(texts.len());
        self.stats.add_input_items(texts.len());

        for (index, chunk) in texts.chunks(self.batch_size).enumerate() {
            let translated = self
                .provider
                .translate_batch(chunk, source_lang, target_lang, glossary_id)
                .await
                .map_err(|e| e.with_context(format!("第 {} 批", index + 1)))?;

            if translated.len() != chunk.len() {
                return Err(TranslationError::TranslationServiceError(format!(
                    "{} 返回 {} 条结果，期望 {} 条",
                    self.provider.provider_name(),
                    translated.len(),
                    chunk.len()
                )));
            }

            self.stats.inc_output_batches();
            results.extend(translated);
        }

        self.stats.add_processing_time(start.elapsed());
        tracing::debug!(
            texts = texts.len(),
            batches = texts.len().div_ceil(self.batch_size),
            "批量翻译完成"
        );

        Ok(results)
    }

    pub fn stats(&self) -> &BatchStats {
        &self.stats
    }
}

/// 批次统计
#[derive(Debug, Default)]
pub struct BatchStats {
    /// 送翻的文本总数
    pub input_items: AtomicUsize,
    /// 成功的批次数
    pub output_batches: AtomicUsize,
    /// 总处理时间（微秒）
    pub processing_time: AtomicU64,
}

impl BatchStats {
    pub fn add_input_items(&self, count: usize) {
        self.input_items.fetch_add(count, Ordering::Relaxed);
    }

    pub fn inc_output_batches(&self) {
        self.output_batches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_processing_time(&self, duration: Duration) {
        self.processing_time
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn get_input_items(&self) -> usize {
        self.input_items.load(Ordering::Relaxed)
    }

    pub fn get_output_batches(&self) -> usize {
        self.output_batches.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translation::core::mock::{MockMode, MockTranslator};

    fn texts(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("text {}", i)).collect()
    }

    #[tokio::test]
    async fn test_chunks_of_fifty() {
        let mock = Arc::new(MockTranslator::suffix("_fr"));
        let translator = BatchTranslator::with_default_size(mock.clone());

        let input = texts(120);
        let out = translator.translate(&input, None, "fr", None).await.unwrap();

        assert_eq!(out.len(), 120);
        assert_eq!(out[119], "text 119_fr");
        let sizes: Vec<usize> = mock.calls().iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![50, 50, 20]);
        assert_eq!(translator.stats().get_output_batches(), 3);
    }

    #[tokio::test]
    async fn test_empty_input_skips_provider() {
        let mock = Arc::new(MockTranslator::suffix("_fr"));
        let translator = BatchTranslator::new(mock.clone(), 10);
        assert!(translator.translate(&[], None, "fr", None).await.unwrap().is_empty());
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_wrong_result_count_is_error() {
        let mock = Arc::new(MockTranslator::new(MockMode::ShortResponse));
        let translator = BatchTranslator::new(mock, 10);

        let error = translator
            .translate(&texts(3), None, "fr", None)
            .await
            .unwrap_err();
        assert!(matches!(error, TranslationError::TranslationServiceError(_)));
    }

    #[tokio::test]
    async fn test_batch_failure_fails_whole_call() {
        let mock = Arc::new(
            MockTranslator::suffix("_fr").failing_first(1, TranslationError::RateLimitExceeded),
        );
        let translator = BatchTranslator::new(mock, 10);
        let error = translator
            .translate(&texts(5), Some("en"), "fr", None)
            .await
            .unwrap_err();
        assert!(error.is_retryable());
    }
}
