//! # Node 模块
//!
//! 效果树中的单个节点。
//!
//! 节点只保存有序的子节点 ID 列表；父子关系的权威记录在
//! [`EffectTree`](super::EffectTree) 的父节点表中，子节点列表只能通过树修改。

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::kind::{EffectKind, TargetRequirement, TweenStart};
use crate::event::{EventHandler, EventSlot, EventSlots, SubscriptionId, SubscriptionScope};
use crate::target::TargetRef;

/// 节点 ID（GUID 字符串）
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// 生成新的随机 ID
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// 字符串形式
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// 编辑器中的节点位置（不影响执行）
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// 节点自身动作被中止（缺少目标等）时，是否仍然展开子节点
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortPolicy {
    /// 跳过整个子树
    #[default]
    SkipChildren,
    /// 仍然执行子节点
    RunChildren,
}

/// 节点的运行期状态（不序列化，`reset()` 清空）
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeRuntime {
    /// 激活计数
    pub activations: u32,
    /// 播放前钩子采样的属性值
    pub snapshots: BTreeMap<String, f32>,
}

/// 效果节点
#[derive(Serialize, Deserialize)]
pub struct EffectNode {
    id: NodeId,
    name: String,
    #[serde(default)]
    position: Position,
    #[serde(default)]
    children: Vec<NodeId>,
    kind: EffectKind,
    /// 期望的目标类型（仅供 Host 校验，核心不强制）
    #[serde(default)]
    target_type: Option<String>,
    #[serde(default)]
    on_abort: AbortPolicy,

    #[serde(skip)]
    target: Option<TargetRef>,
    #[serde(skip)]
    auxiliary: Option<TargetRef>,
    #[serde(skip)]
    events: EventSlots,
    #[serde(skip)]
    runtime: NodeRuntime,
}

impl std::fmt::Debug for EffectNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectNode")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("children", &self.children)
            .field("has_target", &self.target.is_some())
            .field("has_auxiliary", &self.auxiliary.is_some())
            .field("events", &self.events)
            .field("runtime", &self.runtime)
            .finish()
    }
}

impl EffectNode {
    pub(crate) fn new(id: NodeId, name: impl Into<String>, kind: EffectKind) -> Self {
        Self {
            id,
            name: name.into(),
            position: Position::default(),
            children: Vec::new(),
            kind,
            target_type: None,
            on_abort: AbortPolicy::default(),
            target: None,
            auxiliary: None,
            events: EventSlots::new(),
            runtime: NodeRuntime::default(),
        }
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn set_position(&mut self, position: Position) {
        self.position = position;
    }

    /// 有序子节点列表
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn kind(&self) -> &EffectKind {
        &self.kind
    }

    /// 修改节点参数（编辑器用）
    pub fn kind_mut(&mut self) -> &mut EffectKind {
        &mut self.kind
    }

    pub fn is_root(&self) -> bool {
        matches!(self.kind, EffectKind::Root)
    }

    pub fn target_type(&self) -> Option<&str> {
        self.target_type.as_deref()
    }

    pub fn set_target_type(&mut self, target_type: Option<String>) {
        self.target_type = target_type;
    }

    /// 声明目标类型（builder 风格）
    pub fn with_target_type(&mut self, target_type: impl Into<String>) -> &mut Self {
        self.target_type = Some(target_type.into());
        self
    }

    pub fn on_abort(&self) -> AbortPolicy {
        self.on_abort
    }

    pub fn set_on_abort(&mut self, policy: AbortPolicy) {
        self.on_abort = policy;
    }

    pub fn target_requirement(&self) -> TargetRequirement {
        self.kind.target_requirement()
    }

    pub fn needs_auxiliary(&self) -> bool {
        self.kind.needs_auxiliary()
    }

    // ========== 子节点 ==========

    /// 添加子节点引用，已存在时不重复添加
    pub(crate) fn add_child(&mut self, child: NodeId) -> bool {
        if self.children.contains(&child) {
            return false;
        }
        self.children.push(child);
        true
    }

    /// 移除子节点引用（不处理子孙）
    pub(crate) fn remove_child(&mut self, child: &NodeId) -> bool {
        let before = self.children.len();
        self.children.retain(|c| c != child);
        self.children.len() != before
    }

    // ========== 目标 ==========

    /// 设置目标；传入 `None` 时保留原目标
    pub fn set_target(&mut self, target: Option<TargetRef>) {
        if let Some(target) = target {
            self.target = Some(target);
        }
    }

    pub fn target(&self) -> Option<&TargetRef> {
        self.target.as_ref()
    }

    /// 设置辅助对象；传入 `None` 时保留原对象
    pub fn set_auxiliary(&mut self, auxiliary: Option<TargetRef>) {
        if let Some(auxiliary) = auxiliary {
            self.auxiliary = Some(auxiliary);
        }
    }

    pub fn auxiliary(&self) -> Option<&TargetRef> {
        self.auxiliary.as_ref()
    }

    // ========== 事件 ==========

    pub fn register_on_started(&mut self, handler: EventHandler) -> SubscriptionId {
        self.events
            .register(EventSlot::Started, handler, SubscriptionScope::Persistent)
    }

    pub fn deregister_on_started(&mut self, id: SubscriptionId) -> bool {
        self.events.deregister(EventSlot::Started, id)
    }

    pub fn register_on_updated(&mut self, handler: EventHandler) -> SubscriptionId {
        self.events
            .register(EventSlot::Updated, handler, SubscriptionScope::Persistent)
    }

    pub fn deregister_on_updated(&mut self, id: SubscriptionId) -> bool {
        self.events.deregister(EventSlot::Updated, id)
    }

    pub fn register_on_completed(&mut self, handler: EventHandler) -> SubscriptionId {
        self.events
            .register(EventSlot::Completed, handler, SubscriptionScope::Persistent)
    }

    pub fn deregister_on_completed(&mut self, id: SubscriptionId) -> bool {
        self.events.deregister(EventSlot::Completed, id)
    }

    pub fn events(&self) -> &EventSlots {
        &self.events
    }

    pub(crate) fn events_mut(&mut self) -> &mut EventSlots {
        &mut self.events
    }

    // ========== 生命周期 ==========

    /// 播放前钩子：为 `Snapshot` 起点的补间轴采样目标当前值
    pub fn initialize_before_running(&mut self) {
        self.runtime.snapshots.clear();

        let (EffectKind::Tween { axes, .. }, Some(target)) = (&self.kind, &self.target) else {
            return;
        };
        for axis in axes {
            if axis.start != TweenStart::Snapshot {
                continue;
            }
            if let Some(value) = target.get_property(&axis.property) {
                self.runtime.snapshots.insert(axis.property.clone(), value);
            }
        }
    }

    /// 清空运行期状态（计数器、快照）
    pub fn reset(&mut self) {
        self.runtime = NodeRuntime::default();
    }

    pub fn runtime(&self) -> &NodeRuntime {
        &self.runtime
    }

    pub(crate) fn runtime_mut(&mut self) -> &mut NodeRuntime {
        &mut self.runtime
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::PropertyTarget;
    use crate::tree::kind::TweenAxis;
    use std::rc::Rc;

    fn node(kind: EffectKind) -> EffectNode {
        EffectNode::new(NodeId::generate(), "test", kind)
    }

    #[test]
    fn test_add_child_idempotent() {
        let mut parent = node(EffectKind::Root);
        let child = NodeId::from("child");

        assert!(parent.add_child(child.clone()));
        assert!(!parent.add_child(child.clone()));
        assert_eq!(parent.children(), &[child.clone()]);

        assert!(parent.remove_child(&child));
        assert!(!parent.remove_child(&child));
        assert!(parent.children().is_empty());
    }

    #[test]
    fn test_set_target_ignores_none() {
        let mut n = node(EffectKind::tween(1.0, vec![TweenAxis::to("x", 1.0)]));
        let target: TargetRef = Rc::new(PropertyTarget::new("T").with_property("x", 3.0));

        n.set_target(Some(target));
        n.set_target(None);
        assert_eq!(n.target().and_then(|t| t.get_property("x")), Some(3.0));
    }

    #[test]
    fn test_snapshot_hook() {
        let mut n = node(EffectKind::tween(
            1.0,
            vec![
                TweenAxis::to("x", 1.0).from_snapshot(),
                TweenAxis::to("y", 1.0),
            ],
        ));
        let target: TargetRef = Rc::new(
            PropertyTarget::new("T")
                .with_property("x", 5.0)
                .with_property("y", 6.0),
        );
        n.set_target(Some(target));

        n.initialize_before_running();
        assert_eq!(n.runtime().snapshots.get("x"), Some(&5.0));
        assert_eq!(n.runtime().snapshots.get("y"), None);

        n.reset();
        assert!(n.runtime().snapshots.is_empty());
    }

    #[test]
    fn test_event_registration() {
        let mut n = node(EffectKind::delay(1.0));
        let id = n.register_on_completed(crate::event::handler(|_| {}));
        assert_eq!(n.events().len(EventSlot::Completed), 1);

        assert!(!n.deregister_on_started(id));
        assert!(n.deregister_on_completed(id));
        assert!(n.events().is_empty());
    }

    #[test]
    fn test_node_json_skips_runtime() {
        let mut n = node(EffectKind::counter(2));
        n.runtime_mut().activations = 1;
        n.set_position(Position::new(10.0, 20.0));

        let json = serde_json::to_string(&n).unwrap();
        let back: EffectNode = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id(), n.id());
        assert_eq!(back.position(), Position::new(10.0, 20.0));
        assert_eq!(back.runtime().activations, 0);
        assert!(back.target().is_none());
    }
}
