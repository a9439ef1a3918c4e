//! HTML 标记拆分器
//!
//! 把含有 HTML 的叶子拆成“模板 + 纯文本片段”。块级标签原样保留在模板中，
//! 标签之间的文本替换为 `[i]` 占位符；行内标签（`b`、`em`、`a` 等）留在片段
//! 内部，随内容一起送去翻译。
//!
//! 标签分类通过 [`MarkupClassifier`] 抽象，默认实现基于正则，是尽力而为的
//! 启发式拆分，并不是完整的 DOM 解析器。

use std::collections::HashSet;
use std::sync::{Arc, OnceLock};

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

/// 保留在片段内部的行内标签
pub const INLINE_TAGS: &[&str] = &[
    "b", "i", "u", "strong", "em", "span", "a", "code", "small", "sub", "sup",
];

static MARKUP_RE: OnceLock<Regex> = OnceLock::new();
static TAG_RE: OnceLock<Regex> = OnceLock::new();
static TAG_NAME_RE: OnceLock<Regex> = OnceLock::new();
static PLACEHOLDER_RE: OnceLock<Regex> = OnceLock::new();

fn markup_regex() -> &'static Regex {
    MARKUP_RE.get_or_init(|| Regex::new(r"<[a-zA-Z][\s\S]*>").expect("标记检测正则必须合法"))
}

fn tag_regex() -> &'static Regex {
    TAG_RE.get_or_init(|| Regex::new(r"<[^<>]+>").expect("标签正则必须合法"))
}

fn tag_name_regex() -> &'static Regex {
    TAG_NAME_RE.get_or_init(|| Regex::new(r"^</?([a-zA-Z1-6]+)").expect("标签名正则必须合法"))
}

fn placeholder_regex() -> &'static Regex {
    // 第一分支吞掉整段标签，避免替换标签属性里形如 [0] 的文本
    PLACEHOLDER_RE.get_or_init(|| Regex::new(r"<[^>]*>|\[(\d+)\]").expect("占位符正则必须合法"))
}

/// 标签类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    /// 块级标签：划分片段边界
    Block,
    /// 行内标签：保留在片段文本中
    Inline,
}

/// 标签在原文中的字节区间
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagSpan {
    pub start: usize,
    pub end: usize,
    pub kind: TagKind,
}

/// 标签分类能力
///
/// 给定原始文本，按文档顺序返回其中各标签的位置和类别。
pub trait MarkupClassifier: Send + Sync {
    /// 文本中是否包含类似标签的子串
    fn is_markup(&self, text: &str) -> bool;

    /// 返回所有可识别标签，按出现顺序排列且互不重叠
    fn classify(&self, text: &str) -> Vec<TagSpan>;
}

/// 基于正则的默认分类器
#[derive(Debug, Clone)]
pub struct RegexClassifier {
    inline_tags: HashSet<String>,
}

impl RegexClassifier {
    pub fn new() -> Self {
        Self::with_inline_tags(INLINE_TAGS.iter().copied())
    }

    /// 使用自定义的行内标签列表
    pub fn with_inline_tags<'a>(tags: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            inline_tags: tags.into_iter().map(|t| t.to_ascii_lowercase()).collect(),
        }
    }
}

impl Default for RegexClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkupClassifier for RegexClassifier {
    fn is_markup(&self, text: &str) -> bool {
        markup_regex().is_match(text)
    }

    fn classify(&self, text: &str) -> Vec<TagSpan> {
        tag_regex()
            .find_iter(text)
            .filter_map(|m| {
                // 无法识别标签名的（注释、DOCTYPE 等）不视为标签，留在文本里
                let name = tag_name_regex()
                    .captures(m.as_str())
                    .and_then(|caps| caps.get(1))?
                    .as_str()
                    .to_ascii_lowercase();

                let kind = if self.inline_tags.contains(&name) {
                    TagKind::Inline
                } else {
                    TagKind::Block
                };

                Some(TagSpan {
                    start: m.start(),
                    end: m.end(),
                    kind,
                })
            })
            .collect()
    }
}

/// 模板与片段
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HtmlMap {
    pub template: String,
    pub fragments: Vec<String>,
}

impl HtmlMap {
    /// 不含标记的文本：整段作为唯一片段，空白文本不产生片段
    pub fn plain(text: &str) -> Self {
        if text.trim().is_empty() {
            Self {
                template: text.to_string(),
                fragments: Vec::new(),
            }
        } else {
            Self {
                template: "[0]".to_string(),
                fragments: vec![text.to_string()],
            }
        }
    }

    /// 模板中标签之外的 `[i]` 占位符个数
    pub fn placeholder_count(&self) -> usize {
        placeholder_regex()
            .captures_iter(&self.template)
            .filter(|caps| caps.get(1).is_some())
            .count()
    }

    /// 用给定片段还原
    pub fn restore_with(&self, fragments: &[String]) -> String {
        restore(&self.template, fragments)
    }
}

/// 标记拆分器
#[derive(Clone)]
pub struct MarkupSplitter {
    classifier: Arc<dyn MarkupClassifier>,
}

impl MarkupSplitter {
    pub fn new(classifier: Arc<dyn MarkupClassifier>) -> Self {
        Self { classifier }
    }

    pub fn is_markup(&self, text: &str) -> bool {
        self.classifier.is_markup(text)
    }

    /// 拆分叶子文本；非标记文本走 [`HtmlMap::plain`]
    pub fn split(&self, text: &str) -> HtmlMap {
        if self.is_markup(text) {
            self.extract(text)
        } else {
            HtmlMap::plain(text)
        }
    }

    /// 按块级标签拆分 HTML
    pub fn extract(&self, html: &str) -> HtmlMap {
        let mut template = String::with_capacity(html.len());
        let mut fragments = Vec::new();
        let mut last = 0;

        for span in self.classifier.classify(html) {
            if span.kind != TagKind::Block || span.start < last {
                continue;
            }
            push_run(&html[last..span.start], &mut template, &mut fragments);
            template.push_str(&html[span.start..span.end]);
            last = span.end;
        }
        push_run(&html[last..], &mut template, &mut fragments);

        HtmlMap {
            template,
            fragments,
        }
    }
}

impl Default for MarkupSplitter {
    fn default() -> Self {
        Self::new(Arc::new(RegexClassifier::new()))
    }
}

impl std::fmt::Debug for MarkupSplitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarkupSplitter").finish_non_exhaustive()
    }
}

fn push_run(run: &str, template: &mut String, fragments: &mut Vec<String>) {
    if run.trim().is_empty() {
        template.push_str(run);
    } else {
        template.push_str(&format!("[{}]", fragments.len()));
        fragments.push(run.to_string());
    }
}

/// 文本中是否包含标签（默认分类器）
pub fn is_markup(text: &str) -> bool {
    markup_regex().is_match(text)
}

/// 使用默认分类器拆分 HTML
pub fn extract(html: &str) -> HtmlMap {
    MarkupSplitter::default().extract(html)
}

/// 把片段填回模板
///
/// 越界的占位符原样保留，表示上游片段数量不一致。
pub fn restore(template: &str, fragments: &[String]) -> String {
    placeholder_regex()
        .replace_all(template, |caps: &Captures| {
            let whole = &caps[0];
            match caps.get(1) {
                Some(index) => index
                    .as_str()
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| fragments.get(i))
                    .cloned()
                    .unwrap_or_else(|| whole.to_string()),
                None => whole.to_string(),
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_markup() {
        assert!(is_markup("<p>Hello</p>"));
        assert!(is_markup("Click <a href=\"#\">here</a>"));
        assert!(!is_markup("3 < 4 and 5 > 2"));
        assert!(!is_markup("plain text"));
    }

    #[test]
    fn test_inline_tags_stay_in_fragment() {
        let map = extract("<p>Hello <b>World</b></p>");
        assert_eq!(map.template, "<p>[0]</p>");
        assert_eq!(map.fragments, vec!["Hello <b>World</b>"]);

        let restored = restore(&map.template, &["Bonjour <b>Monde</b>".to_string()]);
        assert_eq!(restored, "<p>Bonjour <b>Monde</b></p>");
    }

    #[test]
    fn test_block_tags_split_fragments() {
        let html = "<div><h1>Title</h1>\n  <p>First <em>para</em>.</p><br/>Tail</div>";
        let map = extract(html);

        assert_eq!(
            map.template,
            "<div><h1>[0]</h1>\n  <p>[1]</p><br/>[2]</div>"
        );
        assert_eq!(map.fragments, vec!["Title", "First <em>para</em>.", "Tail"]);
    }

    #[test]
    fn test_round_trip_is_lossless() {
        let samples = [
            "<p>Hello <b>World</b></p>",
            "<ul>\n  <li>One</li>\n  <li>Two <span class=\"x\">2</span></li>\n</ul>",
            "<div>  </div>",
            "<P>Upper case</P>",
            "text before <hr> text after",
            "<table><tr><td>a</td><td> </td></tr></table>",
        ];

        for html in samples {
            let map = extract(html);
            assert_eq!(restore(&map.template, &map.fragments), html, "{}", html);
        }
    }

    #[test]
    fn test_whitespace_runs_are_not_fragments() {
        let map = extract("<ul>\n  <li>One</li>\n</ul>");
        assert_eq!(map.fragments, vec!["One"]);
        assert!(map.template.contains("\n  "));
    }

    #[test]
    fn test_no_block_tags_yields_single_fragment() {
        let map = extract("Only <i>inline</i> here");
        assert_eq!(map.template, "[0]");
        assert_eq!(map.fragments, vec!["Only <i>inline</i> here"]);

        assert_eq!(HtmlMap::plain("Hello"), map_of("[0]", &["Hello"]));
        assert_eq!(HtmlMap::plain("   "), map_of("   ", &[]));
    }

    #[test]
    fn test_out_of_range_placeholder_is_kept() {
        let restored = restore("<p>[0]</p><p>[1]</p>", &["A".to_string()]);
        assert_eq!(restored, "<p>A</p><p>[1]</p>");
    }

    #[test]
    fn test_brackets_inside_tags_are_not_placeholders() {
        let html = "<input name=\"items[0]\"><p>Label</p>";
        let map = extract(html);
        assert_eq!(map.fragments, vec!["Label"]);
        assert_eq!(restore(&map.template, &map.fragments), html);
    }

    #[test]
    fn test_bare_angle_bracket_keeps_closing_tag() {
        let map = extract("<p>a < b</p><p>c</p>");
        assert_eq!(map.template, "<p>[0]</p><p>[1]</p>");
        assert_eq!(map.fragments, vec!["a < b", "c"]);
        assert_eq!(map.restore_with(&map.fragments), "<p>a < b</p><p>c</p>");
    }

    #[test]
    fn test_placeholder_count_skips_tag_attributes() {
        assert_eq!(map_of("<input name=\"a[3]\"><p>[0]</p>", &["x"]).placeholder_count(), 1);
        assert_eq!(map_of("<p>[0]</p><p>[1]</p>", &["x"]).placeholder_count(), 2);
        assert_eq!(HtmlMap::plain("   ").placeholder_count(), 0);
    }

    #[test]
    fn test_custom_classifier() {
        let splitter = MarkupSplitter::new(Arc::new(RegexClassifier::with_inline_tags(["p"])));
        let map = splitter.split("<p>Hello</p><div>World</div>");
        assert_eq!(map.fragments, vec!["<p>Hello</p>", "World"]);
    }

    fn map_of(template: &str, fragments: &[&str]) -> HtmlMap {
        HtmlMap {
            template: template.to_string(),
            fragments: fragments.iter().map(|s| s.to_string()).collect(),
        }
    }
}
