//! VM桥接层：把展示层的动作（拖放/删除）转成会话调用，并提供展示用的行数据

use serde::{Deserialize, Serialize};

use crate::model::mapping_store::{AddOutcome, Mapping};
use crate::model::session::{MapperError, MappingSession};

// === 常量定义（消除魔法值） ===
pub const STATUS_READY: &str = "就绪";
pub const STATUS_LOADED: &str = "文件加载完成";
pub const STATUS_MAPPING_ADDED: &str = "已添加映射";
pub const STATUS_COMPOSITE_PENDING: &str = "组合字段已暂存，等待另一半";
pub const STATUS_MAPPING_DELETED: &str = "已删除映射";
pub const STATUS_SAVED: &str = "结果已保存";
pub const STATUS_NO_MAPPINGS: &str = "暂无映射";
pub const STATUS_ERROR_PREFIX: &str = "错误: ";

/// 映射列表中的一行
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MappingRow {
    pub index: usize,
    pub label: String,
    pub source_path: String,
    pub target_path: String,
}

impl From<(usize, &Mapping)> for MappingRow {
    fn from((index, mapping): (usize, &Mapping)) -> Self {
        Self {
            index,
            label: mapping.label(),
            source_path: mapping.source_path.clone(),
            target_path: mapping.target_path.clone(),
        }
    }
}

/// 当前映射序列的展示行
pub fn mapping_rows(session: &MappingSession) -> Vec<MappingRow> {
    session
        .mappings()
        .iter()
        .enumerate()
        .map(MappingRow::from)
        .collect()
}

/// 展示层录制的单个手势
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Gesture {
    Drop { source: String, target: String },
    Delete { index: usize },
}

/// 执行一个手势，返回给用户的状态文字
pub fn apply_gesture(session: &mut MappingSession, gesture: &Gesture) -> Result<String, MapperError> {
    match gesture {
        Gesture::Drop { source, target } => match session.on_drop_paths(source, target)? {
            AddOutcome::Committed { mapping, .. } => {
                Ok(format!("{}: {}", STATUS_MAPPING_ADDED, mapping.label()))
            }
            AddOutcome::Pending(slot) => Ok(format!("{} ({:?})", STATUS_COMPOSITE_PENDING, slot)),
        },
        Gesture::Delete { index } => {
            let removed = session.on_delete_request(*index)?;
            Ok(format!("{}: {}", STATUS_MAPPING_DELETED, removed.label()))
        }
    }
}

/// 依次执行一组手势。单个手势失败只记录错误并继续，不中断会话
pub fn replay_gestures(session: &mut MappingSession, gestures: &[Gesture]) -> Vec<String> {
    gestures
        .iter()
        .map(|gesture| match apply_gesture(session, gesture) {
            Ok(status) => status,
            Err(e) => {
                tracing::error!("手势 {:?} 执行失败: {}", gesture, e);
                format!("{}{}", STATUS_ERROR_PREFIX, e)
            }
        })
        .collect()
}
