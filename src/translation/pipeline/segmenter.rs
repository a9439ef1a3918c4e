//! 句子切分器
//!
//! 长片段按句子切分，提高缓存命中的粒度。切分规则是启发式的：
//! 在 `.`、`!`、`?` 组成的标点串之后，若紧跟空白、大写字母或文本结尾，
//! 则视为句子边界。不做缩写识别，"Dr. Smith" 这类文本会被切开。

use crate::translation::config::constants;

/// 句子切分器
#[derive(Debug, Clone, Copy)]
pub struct Segmenter {
    threshold: usize,
}

impl Segmenter {
    /// `threshold` 为开始切分的最小字符数
    pub fn new(threshold: usize) -> Self {
        Self { threshold }
    }

    /// 切分片段
    ///
    /// 短于阈值、或只识别出一个句子时原样返回；
    /// 非空输入永远不会得到空结果，也不会丢弃文本。
    pub fn split(&self, fragment: &str) -> Vec<String> {
        if fragment.chars().count() < self.threshold {
            return vec![fragment.to_string()];
        }

        let chars: Vec<(usize, char)> = fragment.char_indices().collect();
        let mut segments = Vec::new();
        let mut start = 0;
        let mut i = 0;

        while i < chars.len() {
            if !is_terminal(chars[i].1) {
                i += 1;
                continue;
            }

            let mut j = i;
            while j < chars.len() && is_terminal(chars[j].1) {
                j += 1;
            }

            let at_boundary =
                j == chars.len() || chars[j].1.is_whitespace() || chars[j].1.is_uppercase();
            if at_boundary {
                let end = chars.get(j).map_or(fragment.len(), |(pos, _)| *pos);
                push_trimmed(&fragment[start..end], &mut segments);
                start = end;
            }
            i = j;
        }
        push_trimmed(&fragment[start..], &mut segments);

        if segments.len() <= 1 {
            return vec![fragment.to_string()];
        }
        segments
    }

    /// 用翻译后的句子重新拼装片段
    ///
    /// 句子之间以单个空格连接，片段首尾的空白保持不变。
    pub fn join(original: &str, translated_segments: &[String]) -> String {
        if translated_segments.len() == 1 {
            return translated_segments[0].clone();
        }

        let trimmed_start = original.trim_start();
        let leading = &original[..original.len() - trimmed_start.len()];
        let trailing = &trimmed_start[trimmed_start.trim_end().len()..];

        format!("{}{}{}", leading, translated_segments.join(" "), trailing)
    }
}

impl Default for Segmenter {
    fn default() -> Self {
        Self::new(constants::SEGMENT_THRESHOLD)
    }
}

fn is_terminal(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

fn push_trimmed(piece: &str, segments: &mut Vec<String>) {
    let piece = piece.trim();
    if !piece.is_empty() {
        segments.push(piece.to_string());
    }
}
