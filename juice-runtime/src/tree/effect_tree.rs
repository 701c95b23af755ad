//! # EffectTree 模块
//!
//! 效果树：节点的唯一所有者。
//!
//! ## 所有权模型
//!
//! ```text
//! nodes:   NodeId -> EffectNode     （节点仓库）
//! order:   Vec<NodeId>              （注册顺序）
//! parents: NodeId -> NodeId         （唯一权威的父节点表）
//! ```
//!
//! 节点的 `children` 列表只通过树修改，与父节点表同步，
//! 因此每个非根节点最多有一个父节点，且树中不存在环。

use std::collections::{HashMap, HashSet};

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::debug;

use super::group::{GroupManager, NodeGroup, Rect};
use super::kind::EffectKind;
use super::node::{EffectNode, NodeId};
use crate::error::{GroupError, TreeError};
use crate::runtime::Scheduler;

/// 树的变更记录，供 Host 做持久化/撤销
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum TreeChange {
    RootCreated { id: NodeId },
    NodeCreated { id: NodeId },
    NodeRemoved { id: NodeId },
    ChildAdded { parent: NodeId, child: NodeId },
    ChildRemoved { parent: NodeId, child: NodeId },
    GroupsChanged { group: String },
}

/// 效果树
pub struct EffectTree {
    name: String,
    root: Option<NodeId>,
    nodes: HashMap<NodeId, EffectNode>,
    order: Vec<NodeId>,
    parents: HashMap<NodeId, NodeId>,
    groups: GroupManager,
    changes: Vec<TreeChange>,
    dirty: bool,
}

impl std::fmt::Debug for EffectTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectTree")
            .field("name", &self.name)
            .field("root", &self.root)
            .field("nodes", &self.order.len())
            .field("groups", &self.groups.len())
            .field("dirty", &self.dirty)
            .finish()
    }
}

impl EffectTree {
    /// 创建空树（没有根节点）
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            root: None,
            nodes: HashMap::new(),
            order: Vec::new(),
            parents: HashMap::new(),
            groups: GroupManager::new(),
            changes: Vec::new(),
            dirty: false,
        }
    }

    /// 创建带根节点的树
    pub fn with_root(name: impl Into<String>) -> Self {
        let mut tree = Self::new(name);
        tree.set_root_node();
        tree
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.dirty = true;
    }

    fn record(&mut self, change: TreeChange) {
        self.changes.push(change);
        self.dirty = true;
    }

    // ========== 查询 ==========

    pub fn root(&self) -> Option<&NodeId> {
        self.root.as_ref()
    }

    pub fn node(&self, id: &NodeId) -> Option<&EffectNode> {
        self.nodes.get(id)
    }

    pub fn node_mut(&mut self, id: &NodeId) -> Option<&mut EffectNode> {
        self.nodes.get_mut(id)
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// 注册顺序的节点 ID
    pub fn node_ids(&self) -> &[NodeId] {
        &self.order
    }

    /// 按注册顺序遍历节点
    pub fn nodes(&self) -> impl Iterator<Item = &EffectNode> {
        self.order.iter().filter_map(|id| self.nodes.get(id))
    }

    /// 遍历所有节点（无固定顺序）
    pub fn nodes_mut(&mut self) -> impl Iterator<Item = &mut EffectNode> {
        self.nodes.values_mut()
    }

    /// 按名称查找第一个节点
    pub fn find_by_name(&self, name: &str) -> Option<&NodeId> {
        self.order
            .iter()
            .find(|id| self.nodes.get(*id).is_some_and(|n| n.name() == name))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn parent_of(&self, id: &NodeId) -> Option<&NodeId> {
        self.parents.get(id)
    }

    /// `parent` 是否是 `child` 的直接父节点
    pub fn is_parent_of(&self, parent: &NodeId, child: &NodeId) -> bool {
        self.parents.get(child) == Some(parent)
    }

    /// `ancestor` 是否是 `node` 的祖先（不含自身）
    pub fn is_ancestor_of(&self, ancestor: &NodeId, node: &NodeId) -> bool {
        let mut current = self.parents.get(node);
        let mut steps = 0;
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            steps += 1;
            if steps > self.order.len() {
                break;
            }
            current = self.parents.get(parent);
        }
        false
    }

    /// 子孙节点（先序，不含自身）
    pub fn descendants(&self, id: &NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut stack: Vec<&NodeId> = match self.nodes.get(id) {
            Some(node) => node.children().iter().rev().collect(),
            None => return result,
        };
        while let Some(current) = stack.pop() {
            result.push(current.clone());
            if let Some(node) = self.nodes.get(current) {
                stack.extend(node.children().iter().rev());
            }
        }
        result
    }

    /// 不可从根节点到达的节点
    pub fn orphans(&self) -> Vec<NodeId> {
        let reachable: HashSet<NodeId> = match &self.root {
            Some(root) => {
                let mut set: HashSet<NodeId> = self.descendants(root).into_iter().collect();
                set.insert(root.clone());
                set
            }
            None => HashSet::new(),
        };
        self.order
            .iter()
            .filter(|id| !reachable.contains(*id))
            .cloned()
            .collect()
    }

    // ========== 创建 / 删除 ==========

    fn insert(&mut self, node: EffectNode) -> NodeId {
        let id = node.id().clone();
        self.order.push(id.clone());
        self.nodes.insert(id.clone(), node);
        id
    }

    /// 创建根节点（只创建一次，之后返回已有根节点）
    pub fn set_root_node(&mut self) -> NodeId {
        if let Some(root) = &self.root {
            return root.clone();
        }
        let id = self.insert(EffectNode::new(NodeId::generate(), "Root", EffectKind::Root));
        self.root = Some(id.clone());
        self.record(TreeChange::RootCreated { id: id.clone() });
        debug!(root = %id, "创建根节点");
        id
    }

    /// 创建节点，名称默认为类型名
    ///
    /// `EffectKind::Root` 不会创建第二个根节点，而是返回（必要时创建）唯一的根节点。
    pub fn create_node(&mut self, kind: EffectKind) -> NodeId {
        let name = kind.type_name();
        self.create_named_node(name, kind)
    }

    /// 创建指定名称的节点
    pub fn create_named_node(&mut self, name: impl Into<String>, kind: EffectKind) -> NodeId {
        if matches!(kind, EffectKind::Root) {
            return self.set_root_node();
        }
        let id = self.insert(EffectNode::new(NodeId::generate(), name, kind));
        self.record(TreeChange::NodeCreated { id: id.clone() });
        id
    }

    /// 按登记的类型名创建节点
    pub fn create_node_by_type(&mut self, type_name: &str) -> Result<NodeId, TreeError> {
        let kind =
            EffectKind::from_type_name(type_name).ok_or_else(|| TreeError::UnknownNodeType {
                type_name: type_name.to_string(),
            })?;
        Ok(self.create_node(kind))
    }

    /// 删除节点
    ///
    /// 从仓库和父节点的子列表中移除，并移出所有分组。
    /// 子节点不会被递归删除，而是成为孤立节点。根节点不能删除。
    pub fn remove_node(&mut self, id: &NodeId) -> Result<EffectNode, TreeError> {
        if !self.nodes.contains_key(id) {
            return Err(TreeError::NodeNotFound { id: id.clone() });
        }
        if self.root.as_ref() == Some(id) {
            return Err(TreeError::CannotRemoveRoot);
        }

        if let Some(parent) = self.parents.remove(id)
            && let Some(parent_node) = self.nodes.get_mut(&parent)
        {
            parent_node.remove_child(id);
        }

        let node = self
            .nodes
            .remove(id)
            .ok_or_else(|| TreeError::NodeNotFound { id: id.clone() })?;
        for child in node.children() {
            self.parents.remove(child);
        }
        self.order.retain(|n| n != id);
        self.groups.forget_node(id);

        self.record(TreeChange::NodeRemoved { id: id.clone() });
        Ok(node)
    }

    // ========== 父子关系 ==========

    /// 添加子节点
    ///
    /// 已是子节点时返回 `Ok(false)`。子节点原本属于其他父节点时会被移过来。
    /// 任何检查失败都不会修改树。
    pub fn add_child(&mut self, parent: &NodeId, child: &NodeId) -> Result<bool, TreeError> {
        for id in [parent, child] {
            if !self.nodes.contains_key(id) {
                return Err(TreeError::NodeNotFound { id: id.clone() });
            }
        }
        if parent == child {
            return Err(TreeError::SelfParent { id: child.clone() });
        }
        if self.root.as_ref() == Some(child) {
            return Err(TreeError::RootAsChild {
                parent: parent.clone(),
            });
        }
        if self.is_ancestor_of(child, parent) {
            return Err(TreeError::CycleDetected {
                parent: parent.clone(),
                child: child.clone(),
            });
        }
        if self.is_parent_of(parent, child) {
            return Ok(false);
        }

        if let Some(old_parent) = self.parents.remove(child) {
            if let Some(old) = self.nodes.get_mut(&old_parent) {
                old.remove_child(child);
            }
            self.record(TreeChange::ChildRemoved {
                parent: old_parent,
                child: child.clone(),
            });
        }

        if let Some(parent_node) = self.nodes.get_mut(parent) {
            parent_node.add_child(child.clone());
        }
        self.parents.insert(child.clone(), parent.clone());
        self.record(TreeChange::ChildAdded {
            parent: parent.clone(),
            child: child.clone(),
        });
        Ok(true)
    }

    /// 移除子节点引用；不是子节点时返回 `Ok(false)`
    pub fn remove_child(&mut self, parent: &NodeId, child: &NodeId) -> Result<bool, TreeError> {
        let parent_node = self
            .nodes
            .get_mut(parent)
            .ok_or_else(|| TreeError::NodeNotFound { id: parent.clone() })?;
        if !parent_node.remove_child(child) {
            return Ok(false);
        }
        self.parents.remove(child);
        self.record(TreeChange::ChildRemoved {
            parent: parent.clone(),
            child: child.clone(),
        });
        Ok(true)
    }

    // ========== 运行期 ==========

    /// 重置所有节点的运行期状态
    pub fn reset_all_nodes(&mut self) {
        for id in &self.order {
            if let Some(node) = self.nodes.get_mut(id) {
                node.reset();
            }
        }
    }

    /// 停止所有节点正在执行的任务
    pub fn stop_all_nodes(&self, scheduler: &mut Scheduler) {
        for id in &self.order {
            scheduler.cancel_node(id);
        }
    }

    /// 清除所有节点的会话订阅
    pub(crate) fn clear_session_subscriptions(&mut self) {
        for node in self.nodes.values_mut() {
            node.events_mut().clear_session();
        }
    }

    // ========== 分组 ==========

    pub fn groups(&self) -> &GroupManager {
        &self.groups
    }

    /// 创建分组，节点必须都在树中
    pub fn create_group(
        &mut self,
        name: impl Into<String>,
        rect: Rect,
        node_ids: Vec<NodeId>,
    ) -> Result<(), GroupError> {
        if let Some(unknown) = node_ids.iter().find(|id| !self.nodes.contains_key(*id)) {
            let err = GroupError::UnknownNode {
                node: unknown.clone(),
            };
            tracing::warn!(error = %err, "创建分组失败");
            return Err(err);
        }
        let name = name.into();
        self.groups.create_group(name.clone(), rect, node_ids)?;
        self.record(TreeChange::GroupsChanged { group: name });
        Ok(())
    }

    pub fn remove_group(&mut self, name: &str) -> Result<NodeGroup, GroupError> {
        let group = self.groups.remove_group(name)?;
        self.record(TreeChange::GroupsChanged {
            group: name.to_string(),
        });
        Ok(group)
    }

    pub fn rename_group(&mut self, name: &str, new_name: &str) -> Result<(), GroupError> {
        self.groups.rename_group(name, new_name)?;
        self.record(TreeChange::GroupsChanged {
            group: new_name.to_string(),
        });
        Ok(())
    }

    pub fn add_node_to_group(&mut self, name: &str, node: &NodeId) -> Result<(), GroupError> {
        if !self.nodes.contains_key(node) {
            let err = GroupError::UnknownNode { node: node.clone() };
            tracing::warn!(error = %err, "加入分组失败");
            return Err(err);
        }
        self.groups.add_node_to_group(name, node.clone())?;
        self.record(TreeChange::GroupsChanged {
            group: name.to_string(),
        });
        Ok(())
    }

    pub fn remove_node_from_group(&mut self, name: &str, node: &NodeId) -> Result<(), GroupError> {
        self.groups.remove_node_from_group(name, node)?;
        self.record(TreeChange::GroupsChanged {
            group: name.to_string(),
        });
        Ok(())
    }

    // ========== 持久化钩子 ==========

    /// 自上次 `mark_clean()` 以来是否有修改
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// 取出累计的变更记录
    pub fn take_changes(&mut self) -> Vec<TreeChange> {
        std::mem::take(&mut self.changes)
    }

    /// 从序列化数据重建，并校验结构
    fn from_data(data: TreeData) -> Result<Self, TreeError> {
        let mut tree = Self::new(data.name);

        for node in data.nodes {
            if tree.nodes.contains_key(node.id()) {
                return Err(TreeError::DuplicateNode {
                    id: node.id().clone(),
                });
            }
            tree.insert(node);
        }

        if let Some(root) = &data.root {
            match tree.nodes.get(root) {
                None => return Err(TreeError::NodeNotFound { id: root.clone() }),
                Some(node) if !node.is_root() => {
                    return Err(TreeError::RootNotRootKind { id: root.clone() });
                }
                Some(_) => {}
            }
        }
        tree.root = data.root;

        for parent in &tree.order {
            let Some(node) = tree.nodes.get(parent) else {
                continue;
            };
            for child in node.children() {
                if !tree.nodes.contains_key(child) {
                    return Err(TreeError::NodeNotFound { id: child.clone() });
                }
                if tree.root.as_ref() == Some(child) {
                    return Err(TreeError::RootAsChild {
                        parent: parent.clone(),
                    });
                }
                if tree
                    .parents
                    .insert(child.clone(), parent.clone())
                    .is_some()
                {
                    return Err(TreeError::MultipleParents { id: child.clone() });
                }
            }
        }

        // 每个节点最多一个父节点时，沿父链走超过节点数步即说明有环
        for id in &tree.order {
            let mut current = tree.parents.get(id);
            let mut steps = 0;
            while let Some(parent) = current {
                steps += 1;
                if steps > tree.order.len() {
                    return Err(TreeError::CycleDetected {
                        parent: parent.clone(),
                        child: id.clone(),
                    });
                }
                current = tree.parents.get(parent);
            }
        }

        tree.groups = data.groups;
        Ok(tree)
    }
}

#[derive(Serialize)]
struct TreeDataRef<'a> {
    name: &'a str,
    root: &'a Option<NodeId>,
    nodes: Vec<&'a EffectNode>,
    groups: &'a GroupManager,
}

#[derive(Deserialize)]
struct TreeData {
    name: String,
    #[serde(default)]
    root: Option<NodeId>,
    #[serde(default)]
    nodes: Vec<EffectNode>,
    #[serde(default)]
    groups: GroupManager,
}

impl Serialize for EffectTree {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        TreeDataRef {
            name: &self.name,
            root: &self.root,
            nodes: self.nodes().collect(),
            groups: &self.groups,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for EffectTree {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let data = TreeData::deserialize(deserializer)?;
        Self::from_data(data).map_err(D::Error::custom)
    }
}
