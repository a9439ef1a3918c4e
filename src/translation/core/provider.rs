//! 外部服务能力接口

use async_trait::async_trait;

use crate::translation::error::TranslationResult;

/// 批量翻译服务
///
/// 返回结果与输入一一对应、顺序一致。`source_lang` 为 `None` 时由服务自动检测。
#[async_trait]
pub trait TranslationProvider: Send + Sync {
    fn provider_name(&self) -> &str;

    async fn translate_batch(
        &self,
        texts: &[String],
        source_lang: Option<&str>,
        target_lang: &str,
        glossary_id: Option<&str>,
    ) -> TranslationResult<Vec<String>>;
}

/// 文本缩写服务
///
/// 尽力把文本缩短到 `max_length` 个字符以内，不保证一定满足。
#[async_trait]
pub trait TextShortener: Send + Sync {
    async fn shorten(&self, text: &str, max_length: usize, language: &str)
        -> TranslationResult<String>;
}
