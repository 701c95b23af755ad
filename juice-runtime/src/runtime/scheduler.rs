//! # Scheduler 模块
//!
//! 单线程协作式调度器。
//!
//! ## 执行模型
//!
//! ```text
//! launch(node)  同步执行节点的开始步骤；动作完成时立即按顺序展开子节点（深度优先）
//! tick(frame)   每个在本次 tick 开始时存活的任务恰好推进一次
//! ```
//!
//! - 子节点只在父节点自身动作完成后启动，同一父节点的子节点在同一 tick 内全部启动
//! - 本次 tick 中新启动的任务不会在同一 tick 内再次推进
//! - 取消只是丢弃任务，被取消的任务不会再触发任何事件

use tracing::{debug, error, warn};

use super::action::{NodeAction, Prepared, Step, prepare};
use crate::clock::FrameTime;
use crate::error::ConfigurationError;
use crate::event::{NodeEvent, NodeEventKind};
use crate::tree::{AbortPolicy, EffectTree, NodeId};

/// 播放会话 ID
///
/// 每次 `play()` 开启一个新会话，同一会话内启动的任务共享同一个 ID。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 一次启动或推进的结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// 按触发顺序排列的事件
    pub events: Vec<NodeEvent>,
    /// 配置错误（节点已中止）
    pub failures: Vec<ConfigurationError>,
    /// 因缺少可选目标而跳过自身动作的节点
    pub skipped: Vec<NodeId>,
}

impl TickReport {
    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && self.failures.is_empty() && self.skipped.is_empty()
    }

    /// 合并另一份结果（保持顺序）
    pub fn merge(&mut self, other: TickReport) {
        self.events.extend(other.events);
        self.failures.extend(other.failures);
        self.skipped.extend(other.skipped);
    }

    /// 有配置错误时返回第一个错误
    pub fn into_result(self) -> Result<Self, ConfigurationError> {
        match self.failures.first() {
            Some(err) => Err(err.clone()),
            None => Ok(self),
        }
    }
}

/// 运行中的任务
#[derive(Debug)]
struct Task {
    node: NodeId,
    session: SessionId,
    action: NodeAction,
    /// 完成后是否展开子节点
    fan_out: bool,
}

/// 调度器
#[derive(Debug, Default)]
pub struct Scheduler {
    tasks: Vec<Task>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// 没有运行中的任务
    pub fn is_idle(&self) -> bool {
        self.tasks.is_empty()
    }

    /// 运行中的任务数
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// 运行中的节点（按启动顺序，可能重复）
    pub fn running_nodes(&self) -> Vec<&NodeId> {
        self.tasks.iter().map(|t| &t.node).collect()
    }

    /// 节点是否有运行中的任务
    pub fn is_running(&self, node: &NodeId) -> bool {
        self.tasks.iter().any(|t| &t.node == node)
    }

    /// 启动节点
    ///
    /// 开始步骤同步执行；若动作立即完成，子节点也在这次调用中启动。
    pub fn launch(
        &mut self,
        tree: &mut EffectTree,
        node: &NodeId,
        session: SessionId,
        frame: &FrameTime,
    ) -> TickReport {
        let mut report = TickReport::default();
        self.launch_node(tree, node, session, frame, &mut report);
        report
    }

    /// 推进所有任务一次
    pub fn tick(&mut self, tree: &mut EffectTree, frame: &FrameTime) -> TickReport {
        let mut report = TickReport::default();
        let mut survivors = Vec::with_capacity(self.tasks.len());

        // 只推进本次 tick 开始时存活的任务，新启动的任务进入 self.tasks
        for mut task in std::mem::take(&mut self.tasks) {
            if !tree.contains(&task.node) {
                warn!(node = %task.node, "节点已从树中删除，丢弃任务");
                continue;
            }
            match task.action.step(frame) {
                Step::Running(progress) => {
                    emit(tree, &task.node, NodeEventKind::Updated { progress }, frame, &mut report);
                    survivors.push(task);
                }
                Step::Finished => {
                    emit(tree, &task.node, NodeEventKind::Completed, frame, &mut report);
                    if task.fan_out {
                        self.fan_out(tree, &task.node, task.session, frame, &mut report);
                    }
                }
            }
        }

        survivors.append(&mut self.tasks);
        self.tasks = survivors;
        report
    }

    /// 取消所有任务
    pub fn cancel_all(&mut self) -> usize {
        let count = self.tasks.len();
        self.tasks.clear();
        if count > 0 {
            debug!(count, "取消所有任务");
        }
        count
    }

    /// 取消某个会话的任务
    pub fn cancel_session(&mut self, session: SessionId) -> usize {
        self.cancel_where(|t| t.session == session)
    }

    /// 取消某个节点的任务
    pub fn cancel_node(&mut self, node: &NodeId) -> usize {
        self.cancel_where(|t| &t.node == node)
    }

    /// 取消节点及其子孙的任务
    pub fn cancel_subtree(&mut self, tree: &EffectTree, node: &NodeId) -> usize {
        let mut scope = tree.descendants(node);
        scope.push(node.clone());
        self.cancel_where(|t| scope.contains(&t.node))
    }

    fn cancel_where(&mut self, predicate: impl Fn(&Task) -> bool) -> usize {
        let before = self.tasks.len();
        self.tasks.retain(|t| !predicate(t));
        before - self.tasks.len()
    }

    fn launch_node(
        &mut self,
        tree: &mut EffectTree,
        id: &NodeId,
        session: SessionId,
        frame: &FrameTime,
        report: &mut TickReport,
    ) {
        let Some(node) = tree.node_mut(id) else {
            warn!(node = %id, "启动的节点不存在");
            return;
        };

        let (mut action, fan_out) = match prepare(node, frame) {
            Prepared::FanOut => {
                self.fan_out(tree, id, session, frame, report);
                return;
            }
            Prepared::Run(action) => (action, true),
            Prepared::Hold(action) => (action, false),
            Prepared::Skipped => {
                report.skipped.push(id.clone());
                self.after_abort(tree, id, session, frame, report);
                return;
            }
            Prepared::Failed(err) => {
                error!(node = %id, error = %err, "节点配置错误");
                report.failures.push(err);
                self.after_abort(tree, id, session, frame, report);
                return;
            }
        };

        emit(tree, id, NodeEventKind::Started, frame, report);
        match action.step(frame) {
            Step::Running(progress) => {
                emit(tree, id, NodeEventKind::Updated { progress }, frame, report);
                self.tasks.push(Task {
                    node: id.clone(),
                    session,
                    action,
                    fan_out,
                });
            }
            Step::Finished => {
                emit(tree, id, NodeEventKind::Completed, frame, report);
                if fan_out {
                    self.fan_out(tree, id, session, frame, report);
                }
            }
        }
    }

    fn after_abort(
        &mut self,
        tree: &mut EffectTree,
        id: &NodeId,
        session: SessionId,
        frame: &FrameTime,
        report: &mut TickReport,
    ) {
        let policy = tree.node(id).map(|n| n.on_abort()).unwrap_or_default();
        if policy == AbortPolicy::RunChildren {
            self.fan_out(tree, id, session, frame, report);
        }
    }

    fn fan_out(
        &mut self,
        tree: &mut EffectTree,
        id: &NodeId,
        session: SessionId,
        frame: &FrameTime,
        report: &mut TickReport,
    ) {
        let children = match tree.node(id) {
            Some(node) => node.children().to_vec(),
            None => return,
        };
        for child in &children {
            self.launch_node(tree, child, session, frame, report);
        }
    }
}

/// 触发节点事件并记录
fn emit(
    tree: &EffectTree,
    id: &NodeId,
    kind: NodeEventKind,
    frame: &FrameTime,
    report: &mut TickReport,
) {
    let event = NodeEvent {
        node: id.clone(),
        kind,
        time: frame.time,
        frame: frame.frame,
    };
    if let Some(node) = tree.node(id) {
        node.events().emit(&event);
    }
    report.events.push(event);
}
