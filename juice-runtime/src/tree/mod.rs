//! # Tree 模块
//!
//! 效果树的数据结构：节点、节点类型、树本身和编辑器分组。
//!
//! ## 模块结构
//!
//! - [`node`]：单个节点（ID、子节点列表、目标、事件槽、运行期状态）
//! - [`kind`]：封闭的节点类型集合
//! - [`effect_tree`]：节点仓库与父子关系
//! - [`group`]：编辑器分组

pub mod effect_tree;
pub mod group;
pub mod kind;
pub mod node;

pub use effect_tree::{EffectTree, TreeChange};
pub use group::{GroupManager, NodeGroup, Rect};
pub use kind::{EffectKind, TargetRequirement, TweenAxis, TweenStart};
pub use node::{AbortPolicy, EffectNode, NodeId, NodeRuntime, Position};
