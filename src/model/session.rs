//! MappingSession：一次编辑会话的全部状态（源/目标树、映射列表、结果文档）
//!
//! 每个会话独占自己的映射序列和组合暂存，会话之间不共享。

use std::path::{Path, PathBuf};

use jsonpath_rust::{JsonPath, query::queryable::Queryable}; // 提供 query 扩展
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::model::mapping_store::{AddOutcome, Mapping, MappingStore, PendingComposite, DEFAULT_COMPOSITE_SEPARATOR};
use crate::model::materializer::{materialize, Materialized, PathConflict};
use crate::model::tree_builder::{build_tree, locate, FlatNode, TreeNode};
use crate::utils::fs::{read_json_file, write_json_file};

#[derive(Error, Debug)]
pub enum MapperError {
    #[error("IO失败: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON解析失败: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("映射索引越界: {index}（共 {len} 条）")]
    OutOfRange { index: usize, len: usize },
    #[error("路径冲突: {0}")]
    PathConflict(PathConflict),
    #[error("不能拖放文件夹节点: {0}")]
    FolderDrop(String),
    #[error("路径不存在: {0}")]
    UnknownPath(String),
    #[error("JSONPath错误: {0}")]
    JsonPath(String),
    #[error("状态错误: {0}")]
    State(String),
}

impl From<PathConflict> for MapperError {
    fn from(conflict: PathConflict) -> Self {
        MapperError::PathConflict(conflict)
    }
}

/// 目标路径的记录方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetPathStyle {
    /// 直接使用树上的展示路径
    #[default]
    Display,
    /// 使用目标文档内的键路径（去掉根标签与类型后缀）
    DocumentKeys,
}

/// 会话配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub source_label: String,
    pub target_label: String,
    pub target_path_style: TargetPathStyle,
    pub composite_separator: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            source_label: "Source".to_string(),
            target_label: "Target".to_string(),
            target_path_style: TargetPathStyle::Display,
            composite_separator: DEFAULT_COMPOSITE_SEPARATOR.to_string(),
        }
    }
}

/// 已加载的文档及其映射树
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    pub dom: Value,
    pub tree: TreeNode,
    pub file_path: Option<PathBuf>,
}

/// 哪一侧的文档
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Source,
    Target,
}

/// 把原始文本解析为 JSON；失败时返回 Parse 错误，调用方不应继续建树
pub fn load_document(text: &str) -> Result<Value, MapperError> {
    Ok(serde_json::from_str(text)?)
}

#[derive(Debug, Default)]
pub struct MappingSession {
    config: SessionConfig,
    source: Option<LoadedDocument>,
    target: Option<LoadedDocument>,
    store: MappingStore,
    resultant: Materialized,
}

impl MappingSession {
    pub fn new(config: SessionConfig) -> Self {
        let store = MappingStore::with_separator(config.composite_separator.clone());
        Self {
            config,
            source: None,
            target: None,
            store,
            resultant: Materialized::default(),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// 解析并加载源文档，整体替换旧的源树；已提交的映射保持不变
    pub fn load_source(&mut self, text: &str) -> Result<&TreeNode, MapperError> {
        let dom = load_document(text)?;
        Ok(self.install(Side::Source, dom, None))
    }

    /// 解析并加载目标文档；结果文档仍由映射序列决定，不会被清空
    pub fn load_target(&mut self, text: &str) -> Result<&TreeNode, MapperError> {
        let dom = load_document(text)?;
        Ok(self.install(Side::Target, dom, None))
    }

    /// 从文件加载源文档
    pub fn load_source_file(&mut self, p: &Path) -> Result<&TreeNode, MapperError> {
        let dom = read_json_file(p)?;
        Ok(self.install(Side::Source, dom, Some(p.to_path_buf())))
    }

    /// 从文件加载目标文档
    pub fn load_target_file(&mut self, p: &Path) -> Result<&TreeNode, MapperError> {
        let dom = read_json_file(p)?;
        Ok(self.install(Side::Target, dom, Some(p.to_path_buf())))
    }

    fn install(&mut self, side: Side, dom: Value, file_path: Option<PathBuf>) -> &TreeNode {
        let label = match side {
            Side::Source => &self.config.source_label,
            Side::Target => &self.config.target_label,
        };
        let tree = build_tree(&dom, label);
        tracing::info!(
            "{:?} 文档已加载: {} 个叶子, {} 个容器",
            side,
            tree.leaf_count(),
            tree.folder_count()
        );
        let slot = match side {
            Side::Source => &mut self.source,
            Side::Target => &mut self.target,
        };
        &slot.insert(LoadedDocument { dom, tree, file_path }).tree
    }

    pub fn source(&self) -> Option<&LoadedDocument> {
        self.source.as_ref()
    }

    pub fn target(&self) -> Option<&LoadedDocument> {
        self.target.as_ref()
    }

    pub fn source_tree(&self) -> Option<&TreeNode> {
        self.source.as_ref().map(|d| &d.tree)
    }

    pub fn target_tree(&self) -> Option<&TreeNode> {
        self.target.as_ref().map(|d| &d.tree)
    }

    /// 拖放手势：源节点 → 目标节点。源节点必须是叶子
    pub fn on_drop_gesture(&mut self, source: &FlatNode<'_>, target: &FlatNode<'_>) -> Result<AddOutcome, MapperError> {
        let value = source
            .value()
            .cloned()
            .ok_or_else(|| MapperError::FolderDrop(source.path.clone()))?;
        let target_path = self.target_path_of(target);
        Ok(self.commit_drop(&source.path, value, &target_path))
    }

    /// 按展示路径在已加载的两棵树中定位节点后执行拖放
    pub fn on_drop_paths(&mut self, source_path: &str, target_path: &str) -> Result<AddOutcome, MapperError> {
        let source_tree = self
            .source_tree()
            .ok_or_else(|| MapperError::State("源文档尚未加载".into()))?;
        let target_tree = self
            .target_tree()
            .ok_or_else(|| MapperError::State("目标文档尚未加载".into()))?;

        let source = locate(source_tree, source_path)
            .ok_or_else(|| MapperError::UnknownPath(source_path.to_string()))?;
        let target = locate(target_tree, target_path)
            .ok_or_else(|| MapperError::UnknownPath(target_path.to_string()))?;

        let value = source
            .value()
            .cloned()
            .ok_or_else(|| MapperError::FolderDrop(source.path.clone()))?;
        let resolved_target = self.target_path_of(&target);
        let source_path = source.path;
        Ok(self.commit_drop(&source_path, value, &resolved_target))
    }

    fn target_path_of(&self, target: &FlatNode<'_>) -> String {
        match self.config.target_path_style {
            TargetPathStyle::Display => target.path.clone(),
            TargetPathStyle::DocumentKeys => target.key_path.clone(),
        }
    }

    fn commit_drop(&mut self, source_path: &str, value: Value, target_path: &str) -> AddOutcome {
        let outcome = self.store.add(source_path, value, target_path);
        match &outcome {
            AddOutcome::Committed { mapping, composite } => {
                tracing::info!("新增映射 #{}: {} (组合: {})", self.store.len() - 1, mapping.label(), composite);
                self.rematerialize();
            }
            AddOutcome::Pending(slot) => {
                tracing::info!("组合字段 {:?} 已暂存，等待另一半", slot);
            }
        }
        outcome
    }

    /// 删除第 index 条映射并从头重新生成结果文档
    pub fn on_delete_request(&mut self, index: usize) -> Result<Mapping, MapperError> {
        let removed = self.store.remove(index)?;
        tracing::info!("删除映射 #{}: {}", index, removed.label());
        self.rematerialize();
        Ok(removed)
    }

    fn rematerialize(&mut self) {
        self.resultant = materialize(self.store.mappings());
        if !self.resultant.conflicts.is_empty() {
            tracing::warn!("结果文档生成时处理了 {} 个路径冲突", self.resultant.conflicts.len());
        }
    }

    pub fn mappings(&self) -> &[Mapping] {
        self.store.mappings()
    }

    pub fn pending_composite(&self) -> &PendingComposite {
        self.store.pending()
    }

    pub fn clear_pending_composite(&mut self) {
        self.store.clear_pending();
    }

    pub fn resultant_target(&self) -> &Value {
        &self.resultant.document
    }

    /// 最近一次生成结果文档时处理过的冲突
    pub fn conflicts(&self) -> &[PathConflict] {
        &self.resultant.conflicts
    }

    pub fn resultant_pretty(&self) -> Result<String, MapperError> {
        Ok(serde_json::to_string_pretty(&self.resultant.document)?)
    }

    /// 按 JSONPath 提取结果文档中第一个匹配节点的 pretty 字符串
    pub fn extract_resultant_subtree(&self, json_path: &str) -> Result<String, MapperError> {
        let dom = &self.resultant.document;
        let hits: Vec<&Value> = dom
            .query(json_path)
            .map_err(|e| MapperError::JsonPath(e.to_string()))?;
        let first = hits
            .into_iter()
            .next()
            .ok_or_else(|| MapperError::JsonPath("未匹配到任何节点".into()))?;
        Ok(serde_json::to_string_pretty(first)?)
    }

    /// 将结果文档保存到指定路径
    pub fn save_resultant_to_file(&self, path: &Path) -> Result<(), MapperError> {
        write_json_file(path, &self.resultant.document)?;
        tracing::info!("结果文档已保存到: {}", path.display());
        Ok(())
    }

    /// 源路径在当前源树中已无法定位的映射序号。
    /// 这类映射保留不清除，只做报告；组合映射没有源节点，不计入
    pub fn stale_mappings(&self) -> Vec<usize> {
        self.store
            .mappings()
            .iter()
            .enumerate()
            .filter(|(_, m)| !m.is_composite())
            .filter(|(_, m)| match self.source_tree() {
                Some(tree) => locate(tree, &m.source_path).is_none(),
                None => true,
            })
            .map(|(i, _)| i)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tree_builder::flatten_tree;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    /// 创建临时JSON文件用于测试
    fn create_test_json_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("创建临时文件失败");
        file.write_all(content.as_bytes()).expect("写入临时文件失败");
        file
    }

    fn keyed_session() -> MappingSession {
        MappingSession::new(SessionConfig {
            target_path_style: TargetPathStyle::DocumentKeys,
            ..SessionConfig::default()
        })
    }

    #[test]
    fn test_load_source_builds_tree() {
        let mut session = MappingSession::default();
        let tree = session.load_source(r#"{"name": "test", "value": 42}"#).expect("加载应成功");
        assert_eq!(tree.name(), "Source (Object)");
        assert_eq!(tree.leaf_count(), 2);
    }

    #[test]
    fn test_parse_error_keeps_previous_state() {
        let mut session = MappingSession::default();
        session.load_source(r#"{"age": 30}"#).unwrap();
        session.load_target(r#"{"age": null}"#).unwrap();
        session
            .on_drop_paths("Source (Object).age", "Target (Object).age")
            .unwrap();

        let err = session.load_source(r#"{"invalid": json content}"#).unwrap_err();
        assert!(matches!(err, MapperError::Parse(_)));
        assert_eq!(session.source_tree().unwrap().children()[0].name(), "age");
        assert_eq!(session.mappings().len(), 1);
    }

    #[test]
    fn test_plain_drop_end_to_end() {
        let mut session = keyed_session();
        session.load_source(r#"{"age": 30}"#).unwrap();
        session.load_target(r#"{"profile": {"age": 0}}"#).unwrap();

        let outcome = session
            .on_drop_paths("Source (Object).age", "Target (Object).profile (Object).age")
            .expect("拖放应成功");
        assert!(outcome.is_committed());
        assert_eq!(session.resultant_target(), &json!({"profile": {"age": 30}}));
        assert_eq!(session.mappings()[0].target_path, "profile.age");
    }

    #[test]
    fn test_display_style_uses_tree_path() {
        let mut session = MappingSession::default();
        session.load_source(r#"{"age": 30}"#).unwrap();
        session.load_target(r#"{"age": 0}"#).unwrap();

        session
            .on_drop_paths("Source (Object).age", "Target (Object).age")
            .unwrap();
        assert_eq!(session.resultant_target(), &json!({"Target (Object)": {"age": 30}}));
    }

    #[test]
    fn test_composite_drop_via_gesture() {
        let mut session = keyed_session();
        session
            .load_source(r#"{"person": {"firstName": "Ada", "lastName": "Lovelace"}}"#)
            .unwrap();
        session.load_target(r#"{"person": {"name": ""}}"#).unwrap();

        let source_tree = session.source_tree().unwrap().clone();
        let target_tree = session.target_tree().unwrap().clone();
        let sources = flatten_tree(&source_tree);
        let targets = flatten_tree(&target_tree);
        let first = sources.iter().find(|n| n.name() == "firstName").unwrap();
        let last = sources.iter().find(|n| n.name() == "lastName").unwrap();
        let name = targets.iter().find(|n| n.name() == "name").unwrap();

        let pending = session.on_drop_gesture(first, name).unwrap();
        assert_eq!(pending, AddOutcome::Pending(crate::model::mapping_store::CompositeSlot::FirstName));
        assert!(session.mappings().is_empty());
        assert_eq!(session.resultant_target(), &json!({}));

        session.on_drop_gesture(last, name).unwrap();
        assert_eq!(
            session.mappings(),
            &[Mapping::new("fullName", "person.name", json!("Ada Lovelace"))]
        );
        assert_eq!(session.resultant_target(), &json!({"person": {"name": "Ada Lovelace"}}));
    }

    #[test]
    fn test_folder_drop_is_rejected() {
        let mut session = keyed_session();
        session.load_source(r#"{"person": {"age": 1}}"#).unwrap();
        session.load_target(r#"{"x": 1}"#).unwrap();

        let err = session
            .on_drop_paths("Source (Object).person (Object)", "Target (Object).x")
            .unwrap_err();
        assert!(matches!(err, MapperError::FolderDrop(_)));
        assert!(session.mappings().is_empty());
    }

    #[test]
    fn test_unknown_path_and_missing_document() {
        let mut session = MappingSession::default();
        let err = session.on_drop_paths("a", "b").unwrap_err();
        assert!(matches!(err, MapperError::State(_)));

        session.load_source(r#"{"a": 1}"#).unwrap();
        session.load_target(r#"{"b": 1}"#).unwrap();
        let err = session
            .on_drop_paths("Source (Object).zzz", "Target (Object).b")
            .unwrap_err();
        assert!(matches!(err, MapperError::UnknownPath(p) if p == "Source (Object).zzz"));
    }

    #[test]
    fn test_delete_rematerializes_without_leftovers() {
        let mut session = keyed_session();
        session.load_source(r#"{"name": "Ada", "age": 36}"#).unwrap();
        session
            .load_target(r#"{"person": {"name": "", "age": 0}}"#)
            .unwrap();

        session
            .on_drop_paths("Source (Object).name", "Target (Object).person (Object).name")
            .unwrap();
        session
            .on_drop_paths("Source (Object).age", "Target (Object).person (Object).age")
            .unwrap();
        assert_eq!(session.resultant_target(), &json!({"person": {"name": "Ada", "age": 36}}));

        let removed = session.on_delete_request(1).expect("删除应成功");
        assert_eq!(removed.target_path, "person.age");
        assert_eq!(session.resultant_target(), &json!({"person": {"name": "Ada"}}));

        session.on_delete_request(0).unwrap();
        assert_eq!(session.resultant_target(), &json!({}));
    }

    #[test]
    fn test_delete_out_of_range() {
        let mut session = MappingSession::default();
        let err = session.on_delete_request(0).unwrap_err();
        assert!(matches!(err, MapperError::OutOfRange { index: 0, len: 0 }));
    }

    #[test]
    fn test_reload_source_keeps_stale_mappings() {
        let mut session = keyed_session();
        session.load_source(r#"{"age": 30}"#).unwrap();
        session.load_target(r#"{"age": 0}"#).unwrap();
        session
            .on_drop_paths("Source (Object).age", "Target (Object).age")
            .unwrap();
        assert!(session.stale_mappings().is_empty());

        session.load_source(r#"{"height": 170}"#).unwrap();
        assert_eq!(session.mappings().len(), 1);
        assert_eq!(session.resultant_target(), &json!({"age": 30}));
        assert_eq!(session.stale_mappings(), vec![0]);

        // 重新加载目标文档也不会清空结果
        session.load_target(r#"{"other": 1}"#).unwrap();
        assert_eq!(session.resultant_target(), &json!({"age": 30}));
    }

    #[test]
    fn test_conflicts_are_reported() {
        let mut session = keyed_session();
        session.load_source(r#"{"a": 1, "b": 2}"#).unwrap();
        session.load_target(r#"{"slot": 0}"#).unwrap();
        session.on_drop_paths("Source (Object).a", "Target (Object).slot").unwrap();
        assert!(session.conflicts().is_empty());

        // 新目标文档中 slot 变成了对象
        session.load_target(r#"{"slot": {"deep": 0}}"#).unwrap();
        session
            .on_drop_paths("Source (Object).b", "Target (Object).slot (Object).deep")
            .unwrap();
        assert_eq!(session.resultant_target(), &json!({"slot": {"deep": 2}}));
        assert_eq!(session.conflicts().len(), 1);
        assert_eq!(session.conflicts()[0].segment.as_deref(), Some("slot"));

        session.on_delete_request(1).unwrap();
        assert!(session.conflicts().is_empty());
        assert_eq!(session.resultant_target(), &json!({"slot": 1}));
    }

    #[test]
    fn test_extract_resultant_subtree() {
        let mut session = keyed_session();
        session.load_source(r#"{"age": 30}"#).unwrap();
        session.load_target(r#"{"profile": {"age": 0}}"#).unwrap();
        session
            .on_drop_paths("Source (Object).age", "Target (Object).profile (Object).age")
            .unwrap();

        let age = session.extract_resultant_subtree("$.profile.age").expect("提取应成功");
        assert_eq!(age, "30");
        assert!(session.extract_resultant_subtree("$.nonexistent").is_err());
    }

    #[test]
    fn test_load_files_and_save_resultant() {
        let source = create_test_json_file(r#"{"user": {"age": 30}}"#);
        let target = create_test_json_file(r#"{"profile": {"age": 0}}"#);
        let output = NamedTempFile::new().expect("创建临时文件失败");

        let mut session = keyed_session();
        session.load_source_file(source.path()).expect("加载源文件失败");
        session.load_target_file(target.path()).expect("加载目标文件失败");
        assert_eq!(session.source().unwrap().file_path.as_deref(), Some(source.path()));

        session
            .on_drop_paths(
                "Source (Object).user (Object).age",
                "Target (Object).profile (Object).age",
            )
            .unwrap();
        session.save_resultant_to_file(output.path()).expect("保存失败");

        let saved: Value = serde_json::from_str(&std::fs::read_to_string(output.path()).unwrap()).unwrap();
        assert_eq!(saved, json!({"profile": {"age": 30}}));
    }

    #[test]
    fn test_invalid_json_file() {
        let bad = create_test_json_file(r#"{"invalid": json content}"#);
        let mut session = MappingSession::default();
        assert!(session.load_target_file(bad.path()).is_err());
        assert!(session.target_tree().is_none());
    }

    #[test]
    fn test_config_defaults_from_partial_json() {
        let config: SessionConfig =
            serde_json::from_str(r#"{"target_path_style": "document_keys"}"#).unwrap();
        assert_eq!(config.target_path_style, TargetPathStyle::DocumentKeys);
        assert_eq!(config.source_label, "Source");
        assert_eq!(config.composite_separator, " ");
    }

    #[test]
    fn test_clear_pending_composite() {
        let mut session = keyed_session();
        session.load_source(r#"{"firstName": "Ada", "lastName": "Lovelace"}"#).unwrap();
        session.load_target(r#"{"name": ""}"#).unwrap();

        session
            .on_drop_paths("Source (Object).firstName", "Target (Object).name")
            .unwrap();
        assert!(!session.pending_composite().is_empty());
        session.clear_pending_composite();
        assert!(session.pending_composite().is_empty());

        let outcome = session
            .on_drop_paths("Source (Object).lastName", "Target (Object).name")
            .unwrap();
        assert!(!outcome.is_committed(), "清空后只有一半，不应提交");
    }
}
