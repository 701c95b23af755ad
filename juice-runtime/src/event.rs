//! # Event 模块
//!
//! 节点生命周期事件与订阅。
//!
//! ## 设计说明
//!
//! - 每个节点有三个独立的事件槽：开始、更新、完成
//! - 订阅分为两种作用域：
//!   - `Persistent`：Host 直接注册，跨播放会话保留，需要显式注销
//!   - `Session`：播放器在 `play()` 时绑定，下一次 `play()` 或 `stop()` 时自动清除
//! - 没有订阅者时触发事件是空操作

use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::tree::NodeId;

/// 事件类型
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeEventKind {
    /// 节点开始执行自身动作
    Started,
    /// 动作在挂起点上报进度（0.0 - 1.0）
    Updated { progress: f32 },
    /// 动作完成（每次执行恰好一次）
    Completed,
}

impl NodeEventKind {
    /// 对应的事件槽
    pub fn slot(&self) -> EventSlot {
        match self {
            Self::Started => EventSlot::Started,
            Self::Updated { .. } => EventSlot::Updated,
            Self::Completed => EventSlot::Completed,
        }
    }
}

/// 事件槽
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSlot {
    Started,
    Updated,
    Completed,
}

/// 节点事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeEvent {
    /// 触发事件的节点
    pub node: NodeId,
    /// 事件类型
    pub kind: NodeEventKind,
    /// 触发时的缩放时间
    pub time: f32,
    /// 触发时的帧序号
    pub frame: u64,
}

impl std::fmt::Display for NodeEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            NodeEventKind::Started => write!(f, "[{:.3}] {} started", self.time, self.node),
            NodeEventKind::Updated { progress } => {
                write!(f, "[{:.3}] {} updated {:.3}", self.time, self.node, progress)
            }
            NodeEventKind::Completed => write!(f, "[{:.3}] {} completed", self.time, self.node),
        }
    }
}

/// 事件回调
pub type EventHandler = Rc<RefCell<dyn FnMut(&NodeEvent)>>;

/// 把闭包包装为 [`EventHandler`]
pub fn handler(f: impl FnMut(&NodeEvent) + 'static) -> EventHandler {
    Rc::new(RefCell::new(f))
}

/// 订阅 ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// 内部值
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// 订阅作用域
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionScope {
    /// 跨会话保留
    Persistent,
    /// 仅在当前播放会话内有效
    Session,
}

struct Subscription {
    id: SubscriptionId,
    scope: SubscriptionScope,
    handler: EventHandler,
}

/// 单个节点的三个事件槽
#[derive(Default)]
pub struct EventSlots {
    started: Vec<Subscription>,
    updated: Vec<Subscription>,
    completed: Vec<Subscription>,
    next_id: u64,
}

impl std::fmt::Debug for EventSlots {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSlots")
            .field("started", &self.started.len())
            .field("updated", &self.updated.len())
            .field("completed", &self.completed.len())
            .finish()
    }
}

impl EventSlots {
    /// 创建空事件槽
    pub fn new() -> Self {
        Self::default()
    }

    fn list(&self, slot: EventSlot) -> &Vec<Subscription> {
        match slot {
            EventSlot::Started => &self.started,
            EventSlot::Updated => &self.updated,
            EventSlot::Completed => &self.completed,
        }
    }

    fn list_mut(&mut self, slot: EventSlot) -> &mut Vec<Subscription> {
        match slot {
            EventSlot::Started => &mut self.started,
            EventSlot::Updated => &mut self.updated,
            EventSlot::Completed => &mut self.completed,
        }
    }

    /// 注册订阅
    pub fn register(
        &mut self,
        slot: EventSlot,
        handler: EventHandler,
        scope: SubscriptionScope,
    ) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.list_mut(slot).push(Subscription { id, scope, handler });
        id
    }

    /// 注销订阅，返回是否找到
    pub fn deregister(&mut self, slot: EventSlot, id: SubscriptionId) -> bool {
        let list = self.list_mut(slot);
        let before = list.len();
        list.retain(|s| s.id != id);
        list.len() != before
    }

    /// 清除所有会话作用域的订阅
    pub fn clear_session(&mut self) {
        for slot in [EventSlot::Started, EventSlot::Updated, EventSlot::Completed] {
            self.list_mut(slot)
                .retain(|s| s.scope == SubscriptionScope::Persistent);
        }
    }

    /// 某个槽上的订阅数
    pub fn len(&self, slot: EventSlot) -> usize {
        self.list(slot).len()
    }

    /// 是否没有任何订阅
    pub fn is_empty(&self) -> bool {
        self.started.is_empty() && self.updated.is_empty() && self.completed.is_empty()
    }

    /// 通知对应槽上的所有订阅者（按注册顺序）
    pub fn emit(&self, event: &NodeEvent) {
        for sub in self.list(event.kind.slot()) {
            (&mut *sub.handler.borrow_mut())(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(kind: NodeEventKind) -> NodeEvent {
        NodeEvent {
            node: NodeId::from("n"),
            kind,
            time: 0.0,
            frame: 0,
        }
    }

    #[test]
    fn test_emit_routes_by_slot() {
        let mut slots = EventSlots::new();
        let hits = Rc::new(RefCell::new(Vec::new()));

        let log = hits.clone();
        slots.register(
            EventSlot::Completed,
            handler(move |e| log.borrow_mut().push(e.kind)),
            SubscriptionScope::Persistent,
        );

        slots.emit(&event(NodeEventKind::Started));
        slots.emit(&event(NodeEventKind::Completed));

        assert_eq!(*hits.borrow(), vec![NodeEventKind::Completed]);
    }

    #[test]
    fn test_deregister() {
        let mut slots = EventSlots::new();
        let id = slots.register(
            EventSlot::Started,
            handler(|_| {}),
            SubscriptionScope::Persistent,
        );

        assert!(!slots.deregister(EventSlot::Updated, id));
        assert!(slots.deregister(EventSlot::Started, id));
        assert!(!slots.deregister(EventSlot::Started, id));
        assert!(slots.is_empty());
    }

    #[test]
    fn test_clear_session_keeps_persistent() {
        let mut slots = EventSlots::new();
        slots.register(EventSlot::Updated, handler(|_| {}), SubscriptionScope::Session);
        slots.register(
            EventSlot::Updated,
            handler(|_| {}),
            SubscriptionScope::Persistent,
        );

        slots.clear_session();
        assert_eq!(slots.len(EventSlot::Updated), 1);
    }

    #[test]
    fn test_emit_without_subscribers() {
        let slots = EventSlots::new();
        slots.emit(&event(NodeEventKind::Updated { progress: 0.5 }));
    }

    #[test]
    fn test_event_display() {
        let e = event(NodeEventKind::Updated { progress: 0.25 });
        assert_eq!(e.to_string(), "[0.000] n updated 0.250");
    }
}
