//! 长度约束
//!
//! 对带有最大长度约束的叶子，先尝试调用缩写服务，失败或未配置时硬截断。
//! 长度按 Unicode 字符计数，处理完成后约束一定成立。

use std::collections::BTreeMap;
use std::sync::Arc;

use super::walker::StringNode;
use crate::translation::config::constants;
use crate::translation::core::provider::TextShortener;
use crate::translation::error::helpers::log_error;

/// 长度约束执行器
#[derive(Clone, Default)]
pub struct LengthEnforcer {
    shortener: Option<Arc<dyn TextShortener>>,
}

impl LengthEnforcer {
    pub fn new(shortener: Option<Arc<dyn TextShortener>>) -> Self {
        Self { shortener }
    }

    pub fn has_shortener(&self) -> bool {
        self.shortener.is_some()
    }

    /// 对所有超长叶子执行约束，返回被修改的叶子数
    pub async fn enforce(
        &self,
        nodes: &mut [StringNode],
        constraints: &BTreeMap<String, usize>,
        target_lang: &str,
    ) -> usize {
        if constraints.is_empty() {
            return 0;
        }

        let mut adjusted = 0;
        for node in nodes.iter_mut() {
            let path = node.path_string();
            let Some(&max_length) = constraints.get(&path) else {
                continue;
            };
            if node.value.chars().count() <= max_length {
                continue;
            }

            node.value = self.fit(&node.value, max_length, target_lang).await;
            adjusted += 1;
            tracing::debug!(path = %path, max_length, "译文超长，已处理");
        }
        adjusted
    }

    /// 把单个文本压到 `max_length` 个字符以内
    pub async fn fit(&self, text: &str, max_length: usize, target_lang: &str) -> String {
        let Some(shortener) = &self.shortener else {
            return truncate(text, max_length);
        };

        match shortener.shorten(text, max_length, target_lang).await {
            Ok(shortened) if shortened.chars().count() <= max_length => shortened,
            Ok(shortened) => truncate_with_ellipsis(&shortened, max_length),
            Err(error) => {
                log_error(&error);
                truncate(text, max_length)
            }
        }
    }
}

impl std::fmt::Debug for LengthEnforcer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LengthEnforcer")
            .field("shortener", &self.shortener.is_some())
            .finish()
    }
}

/// 截取前 `max_length` 个字符
pub fn truncate(text: &str, max_length: usize) -> String {
    text.chars().take(max_length).collect()
}

/// 截断并追加省略号，总长度不超过 `max_length`
pub fn truncate_with_ellipsis(text: &str, max_length: usize) -> String {
    let ellipsis_len = constants::ELLIPSIS.chars().count();
    if max_length <= ellipsis_len {
        return truncate(text, max_length);
    }
    let mut out = truncate(text, max_length - ellipsis_len);
    out.push_str(constants::ELLIPSIS);
    out
}
