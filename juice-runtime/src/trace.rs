//! # Trace 模块
//!
//! 播放事件的有界记录，用于调试和回看时间线。
//!
//! ## 设计原则
//!
//! - 只保留最近 `capacity` 条事件，防止内存无限增长
//! - 容量为 0 时不记录
//! - 可序列化，Host 可以把时间线写入日志或文件

use std::collections::VecDeque;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::event::{NodeEvent, NodeEventKind};
use crate::tree::{EffectTree, NodeId};

/// 默认最多记录的事件数
pub const DEFAULT_TRACE_CAPACITY: usize = 1000;

/// 事件记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventTrace {
    events: VecDeque<NodeEvent>,
    capacity: usize,
}

impl Default for EventTrace {
    fn default() -> Self {
        Self::new(DEFAULT_TRACE_CAPACITY)
    }
}

impl EventTrace {
    pub fn new(capacity: usize) -> Self {
        Self {
            events: VecDeque::new(),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 记录一条事件，超出容量时丢弃最早的事件
    pub fn push(&mut self, event: NodeEvent) {
        if self.capacity == 0 {
            return;
        }
        self.events.push_back(event);
        while self.events.len() > self.capacity {
            self.events.pop_front();
        }
    }

    pub fn extend<'a>(&mut self, events: impl IntoIterator<Item = &'a NodeEvent>) {
        for event in events {
            self.push(event.clone());
        }
    }

    pub fn events(&self) -> impl Iterator<Item = &NodeEvent> {
        self.events.iter()
    }

    /// 某个节点的事件
    pub fn events_of<'a>(&'a self, node: &'a NodeId) -> impl Iterator<Item = &'a NodeEvent> {
        self.events.iter().filter(move |e| &e.node == node)
    }

    /// 完成事件数
    pub fn completed_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| e.kind == NodeEventKind::Completed)
            .count()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// 渲染文本时间线，节点用名称显示（找不到时显示 ID）
    ///
    /// ```text
    /// [0.000] Delay started
    /// [0.250] Delay updated 0.250
    /// ```
    pub fn render(&self, tree: &EffectTree) -> String {
        let mut out = String::new();
        for event in &self.events {
            let name = tree
                .node(&event.node)
                .map(|n| n.name().to_string())
                .unwrap_or_else(|| event.node.to_string());
            let _ = match event.kind {
                NodeEventKind::Started => writeln!(out, "[{:.3}] {name} started", event.time),
                NodeEventKind::Updated { progress } => {
                    writeln!(out, "[{:.3}] {name} updated {progress:.3}", event.time)
                }
                NodeEventKind::Completed => {
                    writeln!(out, "[{:.3}] {name} completed", event.time)
                }
            };
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::EffectKind;

    fn event(node: &NodeId, kind: NodeEventKind, time: f32) -> NodeEvent {
        NodeEvent {
            node: node.clone(),
            kind,
            time,
            frame: 0,
        }
    }

    #[test]
    fn test_trace_capacity() {
        let node = NodeId::from("n");
        let mut trace = EventTrace::new(3);
        for i in 0..5 {
            trace.push(event(&node, NodeEventKind::Started, i as f32));
        }
        assert_eq!(trace.len(), 3);
        assert_eq!(trace.events().next().unwrap().time, 2.0);
    }

    #[test]
    fn test_zero_capacity_disables() {
        let mut trace = EventTrace::new(0);
        trace.push(event(&NodeId::from("n"), NodeEventKind::Completed, 0.0));
        assert!(trace.is_empty());
    }

    #[test]
    fn test_render_uses_names() {
        let mut tree = EffectTree::with_root("t");
        let id = tree.create_named_node("Wait", EffectKind::delay(1.0));
        let ghost = NodeId::from("ghost");

        let mut trace = EventTrace::default();
        trace.push(event(&id, NodeEventKind::Started, 0.0));
        trace.push(event(&id, NodeEventKind::Updated { progress: 0.5 }, 0.5));
        trace.push(event(&ghost, NodeEventKind::Completed, 1.0));

        assert_eq!(trace.completed_count(), 1);
        assert_eq!(trace.events_of(&id).count(), 2);
        insta::assert_snapshot!(trace.render(&tree).trim_end(), @r"
        [0.000] Wait started
        [0.500] Wait updated 0.500
        [1.000] ghost completed
        ");
    }
}
