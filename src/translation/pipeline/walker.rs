//! JSON 树遍历器
//!
//! 把任意 JSON 文档拆成按深度优先顺序排列的字符串叶子（路径 + 文本），
//! 翻译完成后再按路径写回文档副本。数字、布尔值和 null 不会被提取，
//! 写回时保持原样。

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::translation::error::{TranslationError, TranslationResult};

/// 路径中的一段：对象键或数组下标
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(key) => write!(f, "{}", key),
            PathSegment::Index(index) => write!(f, "{}", index),
        }
    }
}

/// 字符串叶子节点
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringNode {
    pub path: Vec<PathSegment>,
    pub value: String,
}

impl StringNode {
    /// 约束表使用的路径字符串，例如 `items.0.name`
    pub fn path_string(&self) -> String {
        path_to_string(&self.path)
    }
}

/// 把路径拼接为以 `.` 分隔的字符串
pub fn path_to_string(path: &[PathSegment]) -> String {
    path.iter()
        .map(|segment| segment.to_string())
        .collect::<Vec<_>>()
        .join(".")
}

/// 提取文档中所有字符串叶子
///
/// 对象按键的原始顺序遍历（依赖 serde_json 的 `preserve_order`），
/// 数组按下标遍历。
pub fn extract(value: &Value) -> Vec<StringNode> {
    let mut nodes = Vec::new();
    let mut path = Vec::new();
    collect(value, &mut path, &mut nodes);
    nodes
}

fn collect(value: &Value, path: &mut Vec<PathSegment>, nodes: &mut Vec<StringNode>) {
    match value {
        Value::String(text) => nodes.push(StringNode {
            path: path.clone(),
            value: text.clone(),
        }),
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                path.push(PathSegment::Index(index));
                collect(item, path, nodes);
                path.pop();
            }
        }
        Value::Object(map) => {
            for (key, item) in map {
                path.push(PathSegment::Key(key.clone()));
                collect(item, path, nodes);
                path.pop();
            }
        }
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}

/// 将翻译后的叶子写回原文档的深拷贝
///
/// 路径必须仍然指向一个字符串叶子，否则返回 `PathResolution`。
pub fn reconstruct(original: &Value, translated: &[StringNode]) -> TranslationResult<Value> {
    let mut document = original.clone();

    for node in translated {
        let slot = resolve_mut(&mut document, &node.path).ok_or_else(|| {
            TranslationError::PathResolution {
                path: node.path_string(),
            }
        })?;

        match slot {
            Value::String(text) => *text = node.value.clone(),
            _ => {
                return Err(TranslationError::PathResolution {
                    path: node.path_string(),
                })
            }
        }
    }

    Ok(document)
}

fn resolve_mut<'a>(value: &'a mut Value, path: &[PathSegment]) -> Option<&'a mut Value> {
    let mut current = value;
    for segment in path {
        current = match (current, segment) {
            (Value::Object(map), PathSegment::Key(key)) => map.get_mut(key)?,
            (Value::Array(items), PathSegment::Index(index)) => items.get_mut(*index)?,
            _ => return None,
        };
    }
    Some(current)
}
