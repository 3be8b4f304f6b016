//! 结果文档生成：按映射顺序从空对象重放路径赋值
//!
//! 结果完全由映射序列决定，删除映射 = 去掉该项后重新生成，
//! 不在旧结果上做原地删除。
//!
//! 路径冲突的处理规则：
//! - 目标路径为空：跳过该映射；
//! - 中间段已有非对象值（标量或数组）：替换为空对象后继续写入。
//!
//! 每次冲突都会记录在 [`Materialized::conflicts`] 中并输出 warn 日志。

use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::model::mapping_store::Mapping;
use crate::model::tree_builder::PATH_SEPARATOR;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConflictKind {
    /// 目标路径为空字符串
    EmptyPath,
    /// 中间段上已有非对象值
    NonContainerSegment,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathConflict {
    /// 冲突映射在序列中的位置
    pub mapping_index: usize,
    pub target_path: String,
    /// 发生冲突的路径段（空路径时为 None）
    pub segment: Option<String>,
    pub kind: ConflictKind,
}

impl fmt::Display for PathConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.kind, &self.segment) {
            (ConflictKind::EmptyPath, _) => {
                write!(f, "映射 #{} 的目标路径为空，已跳过", self.mapping_index)
            }
            (ConflictKind::NonContainerSegment, Some(seg)) => write!(
                f,
                "映射 #{} 的目标路径 {} 在段 {} 处覆盖了非对象值",
                self.mapping_index, self.target_path, seg
            ),
            (ConflictKind::NonContainerSegment, None) => write!(
                f,
                "映射 #{} 的目标路径 {} 覆盖了非对象值",
                self.mapping_index, self.target_path
            ),
        }
    }
}

/// 生成结果：文档 + 生成过程中处理过的冲突
#[derive(Debug, Clone, PartialEq)]
pub struct Materialized {
    pub document: Value,
    pub conflicts: Vec<PathConflict>,
}

impl Default for Materialized {
    fn default() -> Self {
        Self {
            document: Value::Object(Map::new()),
            conflicts: Vec::new(),
        }
    }
}

/// 从空对象开始依次写入每条映射，后写覆盖先写
pub fn materialize(mappings: &[Mapping]) -> Materialized {
    let mut root = Map::new();
    let mut conflicts = Vec::new();

    for (index, mapping) in mappings.iter().enumerate() {
        if mapping.target_path.is_empty() {
            let conflict = PathConflict {
                mapping_index: index,
                target_path: String::new(),
                segment: None,
                kind: ConflictKind::EmptyPath,
            };
            tracing::warn!("{}", conflict);
            conflicts.push(conflict);
            continue;
        }

        let keys: Vec<&str> = mapping.target_path.split(PATH_SEPARATOR).collect();
        assign_path(&mut root, &keys, mapping.source_value.clone(), &mut |segment: &str| {
            let conflict = PathConflict {
                mapping_index: index,
                target_path: mapping.target_path.clone(),
                segment: Some(segment.to_string()),
                kind: ConflictKind::NonContainerSegment,
            };
            tracing::warn!("{}", conflict);
            conflicts.push(conflict);
        });
    }

    Materialized {
        document: Value::Object(root),
        conflicts,
    }
}

fn assign_path(container: &mut Map<String, Value>, keys: &[&str], value: Value, on_conflict: &mut dyn FnMut(&str)) {
    match keys {
        [] => {}
        [last] => {
            container.insert((*last).to_string(), value);
        }
        [head, rest @ ..] => {
            let slot = container
                .entry((*head).to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                on_conflict(*head);
                *slot = Value::Object(Map::new());
            }
            if let Value::Object(child) = slot {
                assign_path(child, rest, value, on_conflict);
            }
        }
    }
}
