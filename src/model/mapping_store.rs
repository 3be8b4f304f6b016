//! MappingStore：有序映射列表 + 组合字段（firstName/lastName → fullName）暂存

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::session::MapperError;
use crate::model::tree_builder::PATH_SEPARATOR;

/// 触发组合规则的源路径段
pub const FIRST_NAME_SEGMENT: &str = "firstName";
pub const LAST_NAME_SEGMENT: &str = "lastName";
/// 组合映射固定使用的源路径
pub const COMPOSITE_SOURCE_PATH: &str = "fullName";
/// 组合值的默认连接符
pub const DEFAULT_COMPOSITE_SEPARATOR: &str = " ";

/// 一条已提交的映射：源路径 → 目标路径，携带要写入的值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mapping {
    pub source_path: String,
    pub target_path: String,
    pub source_value: Value,
}

impl Mapping {
    pub fn new(source_path: impl Into<String>, target_path: impl Into<String>, source_value: Value) -> Self {
        Self {
            source_path: source_path.into(),
            target_path: target_path.into(),
            source_value,
        }
    }

    /// 列表展示用标签："sourcePath → targetPath"
    pub fn label(&self) -> String {
        format!("{} → {}", self.source_path, self.target_path)
    }

    /// 是否由组合规则合成
    pub fn is_composite(&self) -> bool {
        self.source_path == COMPOSITE_SOURCE_PATH
    }
}

/// 组合字段暂存槽位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CompositeSlot {
    FirstName,
    LastName,
}

impl CompositeSlot {
    /// 按路径段判断是否为组合源；同时含两者时以 firstName 为准
    pub fn classify(source_path: &str) -> Option<Self> {
        let has_segment = |name: &str| source_path.split(PATH_SEPARATOR).any(|seg| seg == name);
        if has_segment(FIRST_NAME_SEGMENT) {
            Some(CompositeSlot::FirstName)
        } else if has_segment(LAST_NAME_SEGMENT) {
            Some(CompositeSlot::LastName)
        } else {
            None
        }
    }
}

/// 半完成的组合映射。两个槽位同时就绪的瞬间即被消费并清空
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingComposite {
    pub first_name: Option<Value>,
    pub last_name: Option<Value>,
}

impl PendingComposite {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none() && self.last_name.is_none()
    }

    /// 写入槽位（同一槽位重复写入时直接覆盖）
    fn fill(&mut self, slot: CompositeSlot, value: Value) {
        match slot {
            CompositeSlot::FirstName => self.first_name = Some(value),
            CompositeSlot::LastName => self.last_name = Some(value),
        }
    }

    /// 两个槽位都就绪时按 firstName、lastName 顺序连接并清空
    fn take_joined(&mut self, separator: &str) -> Option<String> {
        if self.first_name.is_none() || self.last_name.is_none() {
            return None;
        }
        let first = self.first_name.take()?;
        let last = self.last_name.take()?;
        Some(format!("{}{}{}", join_text(&first), separator, join_text(&last)))
    }
}

fn join_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// `add` 的结果：要么提交了一条映射，要么组合字段仍在等待另一半
#[derive(Debug, Clone, PartialEq)]
pub enum AddOutcome {
    Committed { mapping: Mapping, composite: bool },
    Pending(CompositeSlot),
}

impl AddOutcome {
    pub fn mapping(&self) -> Option<&Mapping> {
        match self {
            AddOutcome::Committed { mapping, .. } => Some(mapping),
            AddOutcome::Pending(_) => None,
        }
    }

    pub fn is_committed(&self) -> bool {
        matches!(self, AddOutcome::Committed { .. })
    }
}

#[derive(Debug, Clone)]
pub struct MappingStore {
    mappings: Vec<Mapping>,
    pending: PendingComposite,
    separator: String,
}

impl Default for MappingStore {
    fn default() -> Self {
        Self::with_separator(DEFAULT_COMPOSITE_SEPARATOR)
    }
}

impl MappingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_separator(separator: impl Into<String>) -> Self {
        Self {
            mappings: Vec::new(),
            pending: PendingComposite::default(),
            separator: separator.into(),
        }
    }

    /// 记录一次拖放。
    ///
    /// 普通源路径直接追加一条映射；firstName/lastName 源路径先进入暂存，
    /// 两个都到齐时才合成一条 `fullName` 映射（目标路径取本次调用的），
    /// 因此这类拖放不是“一次拖放一行”。
    pub fn add(&mut self, source_path: &str, source_value: Value, target_path: &str) -> AddOutcome {
        let Some(slot) = CompositeSlot::classify(source_path) else {
            let mapping = Mapping::new(source_path, target_path, source_value);
            self.mappings.push(mapping.clone());
            tracing::debug!("追加映射: {}", mapping.label());
            return AddOutcome::Committed {
                mapping,
                composite: false,
            };
        };

        self.pending.fill(slot, source_value);
        match self.pending.take_joined(&self.separator) {
            Some(joined) => {
                let mapping = Mapping::new(COMPOSITE_SOURCE_PATH, target_path, Value::String(joined));
                self.mappings.push(mapping.clone());
                tracing::debug!("组合字段完成: {}", mapping.label());
                AddOutcome::Committed {
                    mapping,
                    composite: true,
                }
            }
            None => {
                tracing::debug!("组合字段等待另一半: {:?}", slot);
                AddOutcome::Pending(slot)
            }
        }
    }

    /// 按当前展示顺序删除映射（不影响组合暂存）
    pub fn remove(&mut self, index: usize) -> Result<Mapping, MapperError> {
        if index >= self.mappings.len() {
            return Err(MapperError::OutOfRange {
                index,
                len: self.mappings.len(),
            });
        }
        Ok(self.mappings.remove(index))
    }

    pub fn mappings(&self) -> &[Mapping] {
        &self.mappings
    }

    pub fn pending(&self) -> &PendingComposite {
        &self.pending
    }

    /// 丢弃半完成的组合映射
    pub fn clear_pending(&mut self) {
        self.pending = PendingComposite::default();
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }
}
