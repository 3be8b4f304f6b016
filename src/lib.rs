//! JSON字段映射工具库
//!
//! 把源/目标 JSON 转成可寻址的映射树，记录源路径 → 目标路径的映射，
//! 并由映射序列推导出结果文档。支持 firstName + lastName → fullName 组合字段，
//! 删除映射时从头重放，保证结果与从未添加该映射一致。

pub mod model;
pub mod utils;
pub mod vm;

// 重新导出主要类型
pub use model::mapping_store::{AddOutcome, CompositeSlot, Mapping, MappingStore, PendingComposite};
pub use model::materializer::{materialize, ConflictKind, Materialized, PathConflict};
pub use model::session::{load_document, MapperError, MappingSession, SessionConfig, TargetPathStyle};
pub use model::tree_builder::{build_tree, child_path, flatten_tree, locate, FlatNode, NodeKind, TreeNode};
