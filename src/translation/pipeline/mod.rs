//! 翻译管道模块
//!
//! 文档 → 叶子 → 片段 → 句子的逐层拆分，以及反向还原和长度约束

pub mod batch;
pub mod length;
pub mod markup;
pub mod segmenter;
pub mod walker;

// 重新导出主要类型
pub use batch::{BatchStats, BatchTranslator};
pub use length::LengthEnforcer;
pub use markup::{HtmlMap, MarkupClassifier, MarkupSplitter, RegexClassifier, TagKind, TagSpan};
pub use segmenter::Segmenter;
pub use walker::{PathSegment, StringNode};
