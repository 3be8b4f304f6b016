//! 映射树（Mapping Tree）：把任意 JSON 转成可寻址的只读节点树，路径在遍历时计算

use serde_json::Value;

/// 数组/对象节点名的类型后缀
pub const ARRAY_SUFFIX: &str = " (Array)";
pub const OBJECT_SUFFIX: &str = " (Object)";
/// 数组元素的标签前缀
pub const INDEX_LABEL_PREFIX: &str = "Index ";
/// 路径分隔符
pub const PATH_SEPARATOR: char = '.';

/// 节点类型：文件夹（有子节点）或文件（叶子，携带原始值）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Folder,
    File,
}

/// 文件夹节点对应的容器类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    Object,
    Array,
}

impl Container {
    fn suffix(self) -> &'static str {
        match self {
            Container::Object => OBJECT_SUFFIX,
            Container::Array => ARRAY_SUFFIX,
        }
    }
}

/// 节点在父级中的位置（根节点没有键）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKey {
    Root,
    Field(String),
    Index(usize),
}

#[derive(Debug, Clone, PartialEq)]
enum NodeBody {
    Folder {
        container: Container,
        children: Vec<TreeNode>,
    },
    File {
        value: Value,
    },
}

/// 树节点。构建后不可变，路径不存储在节点上
#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode {
    name: String,
    key: NodeKey,
    body: NodeBody,
}

impl TreeNode {
    /// 展示名（键名/索引 + 容器类型后缀）
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key(&self) -> &NodeKey {
        &self.key
    }

    pub fn kind(&self) -> NodeKind {
        match self.body {
            NodeBody::Folder { .. } => NodeKind::Folder,
            NodeBody::File { .. } => NodeKind::File,
        }
    }

    pub fn is_folder(&self) -> bool {
        self.kind() == NodeKind::Folder
    }

    pub fn container(&self) -> Option<Container> {
        match &self.body {
            NodeBody::Folder { container, .. } => Some(*container),
            NodeBody::File { .. } => None,
        }
    }

    /// 子节点（文件节点返回空切片）
    pub fn children(&self) -> &[TreeNode] {
        match &self.body {
            NodeBody::Folder { children, .. } => children,
            NodeBody::File { .. } => &[],
        }
    }

    /// 叶子值（文件夹节点返回 None）
    pub fn value(&self) -> Option<&Value> {
        match &self.body {
            NodeBody::File { value } => Some(value),
            NodeBody::Folder { .. } => None,
        }
    }

    /// 子树中的叶子数量
    pub fn leaf_count(&self) -> usize {
        match &self.body {
            NodeBody::File { .. } => 1,
            NodeBody::Folder { children, .. } => children.iter().map(TreeNode::leaf_count).sum(),
        }
    }

    /// 子树中的文件夹数量（含自身）
    pub fn folder_count(&self) -> usize {
        match &self.body {
            NodeBody::File { .. } => 0,
            NodeBody::Folder { children, .. } => {
                1 + children.iter().map(TreeNode::folder_count).sum::<usize>()
            }
        }
    }

    /// 轻量预览（字符串截断、数字/布尔/空的简短描述）
    pub fn preview(&self) -> String {
        match &self.body {
            NodeBody::File { value } => preview_of(value),
            NodeBody::Folder {
                container: Container::Object,
                children,
            } => format!("{{..}} ({} keys)", children.len()),
            NodeBody::Folder {
                container: Container::Array,
                children,
            } => format!("[..] ({} items)", children.len()),
        }
    }
}

fn preview_of(v: &Value) -> String {
    match v {
        Value::String(s) => {
            let s = s.trim();
            if s.chars().count() > 32 {
                let truncated: String = s.chars().take(32).collect();
                format!("\"{}...\"", truncated)
            } else {
                format!("\"{}\"", s)
            }
        }
        other => other.to_string(),
    }
}

/// 从根 Value 构建映射树，`label` 为根节点标签（如 "Source"/"Target"）
pub fn build_tree(value: &Value, label: &str) -> TreeNode {
    build_node(value, label.to_string(), NodeKey::Root)
}

fn build_node(value: &Value, label: String, key: NodeKey) -> TreeNode {
    match value {
        Value::Array(items) => {
            let children = items
                .iter()
                .enumerate()
                .map(|(i, item)| build_node(item, format!("{}{}", INDEX_LABEL_PREFIX, i), NodeKey::Index(i)))
                .collect();
            folder(label, key, Container::Array, children)
        }
        Value::Object(map) => {
            let children = map
                .iter()
                .map(|(k, v)| build_node(v, k.clone(), NodeKey::Field(k.clone())))
                .collect();
            folder(label, key, Container::Object, children)
        }
        scalar => TreeNode {
            name: label,
            key,
            body: NodeBody::File {
                value: scalar.clone(),
            },
        },
    }
}

fn folder(label: String, key: NodeKey, container: Container, children: Vec<TreeNode>) -> TreeNode {
    TreeNode {
        name: format!("{}{}", label, container.suffix()),
        key,
        body: NodeBody::Folder {
            container,
            children,
        },
    }
}

/// 在祖先路径 `parent` 下挂载名为 `name` 的节点后得到的路径
pub fn child_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}{}{}", parent, PATH_SEPARATOR, name)
    }
}

/// 挂载后的节点视图：节点引用 + 遍历时计算出的路径
#[derive(Debug, Clone, PartialEq)]
pub struct FlatNode<'a> {
    pub node: &'a TreeNode,
    /// 展示路径（祖先名以 '.' 连接）
    pub path: String,
    /// 目标文档内的键路径（去掉根标签与类型后缀，数组索引为数字）
    pub key_path: String,
    /// 节点深度（用于UI缩进显示）
    pub depth: u32,
}

impl<'a> FlatNode<'a> {
    pub fn name(&self) -> &str {
        self.node.name()
    }

    pub fn kind(&self) -> NodeKind {
        self.node.kind()
    }

    pub fn value(&self) -> Option<&'a Value> {
        self.node.value()
    }

    pub fn preview(&self) -> String {
        self.node.preview()
    }
}

fn key_segment(key: &NodeKey) -> Option<String> {
    match key {
        NodeKey::Root => None,
        NodeKey::Field(k) => Some(k.clone()),
        NodeKey::Index(i) => Some(i.to_string()),
    }
}

fn mount(node: &TreeNode, parent: &str, parent_keys: &str) -> (String, String) {
    let path = child_path(parent, node.name());
    let key_path = match key_segment(node.key()) {
        Some(seg) => child_path(parent_keys, &seg),
        None => parent_keys.to_string(),
    };
    (path, key_path)
}

fn walk<'a>(out: &mut Vec<FlatNode<'a>>, node: &'a TreeNode, parent: &str, parent_keys: &str, depth: u32) {
    let (path, key_path) = mount(node, parent, parent_keys);
    out.push(FlatNode {
        node,
        path: path.clone(),
        key_path: key_path.clone(),
        depth,
    });
    for child in node.children() {
        walk(out, child, &path, &key_path, depth + 1);
    }
}

/// 先序展开整棵树，每行带路径与深度
pub fn flatten_tree(root: &TreeNode) -> Vec<FlatNode<'_>> {
    let mut out = Vec::with_capacity(root.leaf_count() + root.folder_count());
    walk(&mut out, root, "", "", 0);
    out
}

/// 按展示路径查找节点；只沿路径前缀匹配的分支下探
pub fn locate<'a>(root: &'a TreeNode, path: &str) -> Option<FlatNode<'a>> {
    fn search<'a>(node: &'a TreeNode, parent: &str, parent_keys: &str, depth: u32, target: &str) -> Option<FlatNode<'a>> {
        let (path, key_path) = mount(node, parent, parent_keys);
        if path == target {
            return Some(FlatNode {
                node,
                path,
                key_path,
                depth,
            });
        }
        let below = target
            .strip_prefix(path.as_str())
            .is_some_and(|rest| rest.starts_with(PATH_SEPARATOR));
        if !below {
            return None;
        }
        node.children()
            .iter()
            .find_map(|child| search(child, &path, &key_path, depth + 1, target))
    }
    search(root, "", "", 0, path)
}
