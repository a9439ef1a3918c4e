//! # JSON Translator
//!
//! 异步 JSON 文档翻译中继：接收任意 JSON 文档，翻译其中所有字符串叶子，
//! 保留键、结构和内嵌 HTML 标记，并通过 Webhook 回传结果。
//!
//! ## 模块组织
//!
//! - `translation` - 翻译流水线、句子级缓存、配置与错误类型
//! - `jobs` - 任务模型、工作队列、调度与回调投递
//! - `env` - 类型化的环境变量
//! - `web` - HTTP 提交接口（可选）

pub mod env;
pub mod jobs;
pub mod translation;
#[cfg(feature = "web")]
pub mod web;
