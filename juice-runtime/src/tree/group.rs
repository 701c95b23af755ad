//! # Group 模块
//!
//! 节点分组：编辑器中带矩形区域的具名节点集合。
//!
//! 分组只用于组织，不参与执行。所有失败都记录警告，返回错误且不修改状态。

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::node::NodeId;
use crate::error::GroupError;

/// 编辑器矩形区域
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// 两个区域是否有面积重叠（仅边相接不算）
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.x < other.x + other.width
            && other.x < self.x + self.width
            && self.y < other.y + other.height
            && other.y < self.y + self.height
    }
}

/// 节点分组
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeGroup {
    pub name: String,
    pub rect: Rect,
    #[serde(default)]
    pub node_ids: Vec<NodeId>,
}

/// 分组管理器
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupManager {
    groups: Vec<NodeGroup>,
}

impl GroupManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// 所有分组（创建顺序）
    pub fn groups(&self) -> &[NodeGroup] {
        &self.groups
    }

    pub fn get(&self, name: &str) -> Option<&NodeGroup> {
        self.groups.iter().find(|g| g.name == name)
    }

    fn get_mut(&mut self, name: &str) -> Result<&mut NodeGroup, GroupError> {
        self.groups
            .iter_mut()
            .find(|g| g.name == name)
            .ok_or_else(|| GroupError::UnknownGroup {
                name: name.to_string(),
            })
    }

    /// 节点所属分组
    pub fn group_of(&self, node: &NodeId) -> Option<&NodeGroup> {
        self.groups.iter().find(|g| g.node_ids.contains(node))
    }

    /// 创建分组
    ///
    /// 名称必须唯一，区域不能与已有分组重叠，节点不能已属于其他分组。
    pub fn create_group(
        &mut self,
        name: impl Into<String>,
        rect: Rect,
        node_ids: Vec<NodeId>,
    ) -> Result<(), GroupError> {
        let name = name.into();

        let checked = self.check_new_group(&name, &rect, &node_ids);
        if let Err(e) = &checked {
            warn!(group = %name, error = %e, "创建分组失败");
        }
        checked?;

        let mut unique = Vec::with_capacity(node_ids.len());
        for id in node_ids {
            if !unique.contains(&id) {
                unique.push(id);
            }
        }

        self.groups.push(NodeGroup {
            name,
            rect,
            node_ids: unique,
        });
        Ok(())
    }

    fn check_new_group(
        &self,
        name: &str,
        rect: &Rect,
        node_ids: &[NodeId],
    ) -> Result<(), GroupError> {
        if self.get(name).is_some() {
            return Err(GroupError::DuplicateName {
                name: name.to_string(),
            });
        }
        if let Some(other) = self.groups.iter().find(|g| g.rect.overlaps(rect)) {
            return Err(GroupError::Overlap {
                name: name.to_string(),
                other: other.name.clone(),
            });
        }
        if let Some((id, group)) = node_ids
            .iter()
            .find_map(|id| self.group_of(id).map(|g| (id, g)))
        {
            return Err(GroupError::NodeAlreadyGrouped {
                name: group.name.clone(),
                node: id.clone(),
            });
        }
        Ok(())
    }

    /// 删除分组（节点本身不受影响）
    pub fn remove_group(&mut self, name: &str) -> Result<NodeGroup, GroupError> {
        match self.groups.iter().position(|g| g.name == name) {
            Some(index) => Ok(self.groups.remove(index)),
            None => {
                let err = GroupError::UnknownGroup {
                    name: name.to_string(),
                };
                warn!(error = %err, "删除分组失败");
                Err(err)
            }
        }
    }

    /// 重命名分组
    pub fn rename_group(&mut self, name: &str, new_name: impl Into<String>) -> Result<(), GroupError> {
        let new_name = new_name.into();
        if name != new_name && self.get(&new_name).is_some() {
            let err = GroupError::DuplicateName { name: new_name };
            warn!(error = %err, "重命名分组失败");
            return Err(err);
        }
        let group = self.get_mut(name).inspect_err(|e| {
            warn!(error = %e, "重命名分组失败");
        })?;
        group.name = new_name;
        Ok(())
    }

    /// 把节点加入分组
    pub fn add_node_to_group(&mut self, name: &str, node: NodeId) -> Result<(), GroupError> {
        if let Some(existing) = self.group_of(&node) {
            if existing.name == name {
                return Ok(());
            }
            let err = GroupError::NodeAlreadyGrouped {
                name: existing.name.clone(),
                node,
            };
            warn!(error = %err, "加入分组失败");
            return Err(err);
        }
        let group = self.get_mut(name).inspect_err(|e| {
            warn!(error = %e, "加入分组失败");
        })?;
        group.node_ids.push(node);
        Ok(())
    }

    /// 把节点移出分组
    pub fn remove_node_from_group(&mut self, name: &str, node: &NodeId) -> Result<(), GroupError> {
        let result = self.get_mut(name).and_then(|group| {
            let before = group.node_ids.len();
            group.node_ids.retain(|id| id != node);
            if group.node_ids.len() == before {
                Err(GroupError::NodeNotInGroup {
                    name: name.to_string(),
                    node: node.clone(),
                })
            } else {
                Ok(())
            }
        });
        if let Err(e) = &result {
            warn!(error = %e, "移出分组失败");
        }
        result
    }

    /// 从所有分组中移除节点（删除节点时调用，不产生警告）
    pub(crate) fn forget_node(&mut self, node: &NodeId) {
        for group in &mut self.groups {
            group.node_ids.retain(|id| id != node);
        }
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}
