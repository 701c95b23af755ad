//! # Player 模块
//!
//! 效果树的运行时驱动。
//!
//! ## 执行模型
//!
//! ```text
//! bind(node, binding)   记录节点的实例数据（目标、辅助对象、事件触发器）
//! init_tree()           把实例数据写入节点（只执行一次）
//! play()                开启新会话，从根节点开始执行
//! tick(dt)              推进虚拟时钟和调度器
//! stop()                取消所有任务并重置节点
//! ```
//!
//! 播放器不读取真实时间：Host 每帧调用 `tick(dt)` 或 `tick_frame(frame)`。

use std::collections::HashMap;

use tracing::{debug, info, warn};

use super::scheduler::{Scheduler, SessionId, TickReport};
use crate::clock::{FrameTime, VirtualClock};
use crate::config::{AutoPlay, PlayerConfig, RetriggerPolicy};
use crate::error::{ConfigurationError, PlayerError, TreeError};
use crate::event::{EventHandler, EventSlot, EventSlots, SubscriptionScope};
use crate::state::PlayerState;
use crate::target::TargetRef;
use crate::trace::EventTrace;
use crate::tree::{EffectTree, NodeId};

/// 节点的事件触发器，每次 `play()` 时作为会话订阅重新绑定
#[derive(Clone, Default)]
pub struct NodeTriggers {
    pub on_started: Option<EventHandler>,
    pub on_updated: Option<EventHandler>,
    pub on_completed: Option<EventHandler>,
}

impl NodeTriggers {
    fn bind(&self, events: &mut EventSlots) {
        let slots = [
            (EventSlot::Started, &self.on_started),
            (EventSlot::Updated, &self.on_updated),
            (EventSlot::Completed, &self.on_completed),
        ];
        for (slot, handler) in slots {
            if let Some(handler) = handler {
                events.register(slot, handler.clone(), SubscriptionScope::Session);
            }
        }
    }
}

/// 节点实例数据
#[derive(Clone, Default)]
pub struct NodeBinding {
    pub target: Option<TargetRef>,
    pub auxiliary: Option<TargetRef>,
    pub triggers: NodeTriggers,
}

impl std::fmt::Debug for NodeBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeBinding")
            .field("target", &self.target.as_ref().map(|t| t.type_name().to_string()))
            .field(
                "auxiliary",
                &self.auxiliary.as_ref().map(|t| t.type_name().to_string()),
            )
            .field("on_started", &self.triggers.on_started.is_some())
            .field("on_updated", &self.triggers.on_updated.is_some())
            .field("on_completed", &self.triggers.on_completed.is_some())
            .finish()
    }
}

impl NodeBinding {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_target(mut self, target: TargetRef) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_auxiliary(mut self, auxiliary: TargetRef) -> Self {
        self.auxiliary = Some(auxiliary);
        self
    }

    pub fn on_started(mut self, handler: EventHandler) -> Self {
        self.triggers.on_started = Some(handler);
        self
    }

    pub fn on_updated(mut self, handler: EventHandler) -> Self {
        self.triggers.on_updated = Some(handler);
        self
    }

    pub fn on_completed(mut self, handler: EventHandler) -> Self {
        self.triggers.on_completed = Some(handler);
        self
    }
}

/// 把实例数据写入节点
fn apply_binding(tree: &mut EffectTree, id: &NodeId, binding: &NodeBinding) {
    let Some(node) = tree.node_mut(id) else {
        warn!(node = %id, "绑定的节点不在效果树中");
        return;
    };

    if let (Some(expected), Some(target)) = (node.target_type(), &binding.target)
        && expected != target.type_name()
    {
        warn!(
            node = %id,
            expected,
            actual = target.type_name(),
            "目标类型与节点声明不一致"
        );
    }
    node.set_target(binding.target.clone());

    if node.needs_auxiliary() {
        node.set_auxiliary(binding.auxiliary.clone());
    } else if binding.auxiliary.is_some() {
        debug!(node = %id, "节点不需要辅助对象，忽略");
    }
}

type StopObserver = Box<dyn FnMut()>;

/// 效果播放器
///
/// # 使用示例
///
/// ```ignore
/// let mut player = EffectPlayer::new(tree, PlayerConfig::default())?;
/// player.bind(node_id, NodeBinding::new().with_target(camera))?;
///
/// player.play()?;
/// while player.is_running() {
///     let report = player.tick(1.0 / 60.0)?;
///     // Host 处理 report.events / report.failures ...
/// }
/// ```
pub struct EffectPlayer {
    tree: EffectTree,
    scheduler: Scheduler,
    clock: VirtualClock,
    config: PlayerConfig,
    bindings: HashMap<NodeId, NodeBinding>,
    state: PlayerState,
    session: Option<SessionId>,
    sessions_started: u64,
    first_tick_done: bool,
    stopped_observers: Vec<StopObserver>,
    trace: EventTrace,
}

impl std::fmt::Debug for EffectPlayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectPlayer")
            .field("tree", &self.tree)
            .field("state", &self.state)
            .field("session", &self.session)
            .field("tasks", &self.scheduler.len())
            .field("bindings", &self.bindings.len())
            .finish()
    }
}

impl EffectPlayer {
    /// 创建播放器
    ///
    /// `AutoPlay::OnAwake` 时会立即播放。
    pub fn new(tree: EffectTree, config: PlayerConfig) -> Result<Self, PlayerError> {
        Self::with_bindings(tree, config, Vec::new())
    }

    /// 创建播放器并预先绑定实例数据
    pub fn with_bindings(
        tree: EffectTree,
        config: PlayerConfig,
        bindings: impl IntoIterator<Item = (NodeId, NodeBinding)>,
    ) -> Result<Self, PlayerError> {
        config.validate()?;

        let mut player = Self {
            tree,
            scheduler: Scheduler::new(),
            clock: VirtualClock::new().with_time_scale(config.time_scale),
            trace: EventTrace::new(config.trace_capacity),
            config,
            bindings: HashMap::new(),
            state: PlayerState::Uninitialized,
            session: None,
            sessions_started: 0,
            first_tick_done: false,
            stopped_observers: Vec::new(),
        };
        for (node, binding) in bindings {
            player.bind(node, binding)?;
        }
        debug!(tree = player.tree.name(), nodes = player.tree.len(), "创建播放器");

        if player.config.auto_play == AutoPlay::OnAwake {
            player.play()?;
        }
        Ok(player)
    }

    // ========== 查询 ==========

    pub fn tree(&self) -> &EffectTree {
        &self.tree
    }

    /// 编辑树（编辑与播放应互斥，Host 负责保证）
    pub fn tree_mut(&mut self) -> &mut EffectTree {
        &mut self.tree
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    pub fn state(&self) -> PlayerState {
        self.state
    }

    /// 当前会话
    pub fn session(&self) -> Option<SessionId> {
        self.session
    }

    /// 是否还有运行中的任务
    pub fn is_running(&self) -> bool {
        !self.scheduler.is_idle()
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn trace(&self) -> &EventTrace {
        &self.trace
    }

    /// 当前帧时间
    pub fn now(&self) -> FrameTime {
        self.clock.current()
    }

    pub fn set_time_scale(&mut self, scale: f32) {
        self.clock.set_time_scale(scale);
    }

    pub fn binding(&self, node: &NodeId) -> Option<&NodeBinding> {
        self.bindings.get(node)
    }

    // ========== 绑定 ==========

    /// 记录节点实例数据
    ///
    /// 已初始化时立即写入节点，否则在 `init_tree()` 时写入。
    pub fn bind(&mut self, node: NodeId, binding: NodeBinding) -> Result<(), PlayerError> {
        if !self.tree.contains(&node) {
            return Err(TreeError::NodeNotFound { id: node }.into());
        }
        if self.state.is_initialized() {
            apply_binding(&mut self.tree, &node, &binding);
        }
        self.bindings.insert(node, binding);
        Ok(())
    }

    /// 注册停止通知，每次 `stop()` 结束播放时调用一次
    pub fn register_on_stopped(&mut self, observer: impl FnMut() + 'static) {
        self.stopped_observers.push(Box::new(observer));
    }

    /// 把实例数据写入节点
    ///
    /// 只执行一次，重复调用是空操作。
    pub fn init_tree(&mut self) {
        if self.state.is_initialized() {
            debug!(tree = self.tree.name(), "效果树已初始化，跳过");
            return;
        }
        for (id, binding) in &self.bindings {
            apply_binding(&mut self.tree, id, binding);
        }
        self.state = PlayerState::Initialized;
        debug!(tree = self.tree.name(), bindings = self.bindings.len(), "效果树初始化完成");
    }

    // ========== 生命周期 ==========

    /// 启用播放器（`AutoPlay::OnEnable` 时播放）
    pub fn enable(&mut self) -> Result<Option<TickReport>, PlayerError> {
        if self.config.auto_play == AutoPlay::OnEnable {
            return self.play().map(Some);
        }
        Ok(None)
    }

    /// 开始播放
    ///
    /// 树结构或节点参数有问题时返回错误且不启动任何任务；
    /// 运行期的配置错误（缺少必需目标等）记录在返回的 [`TickReport`] 中。
    pub fn play(&mut self) -> Result<TickReport, PlayerError> {
        let root = self.tree.root().cloned().ok_or(TreeError::MissingRoot)?;
        self.validate_nodes(&root)?;
        self.init_tree();

        if self.is_running() {
            match self.config.retrigger {
                RetriggerPolicy::Overlap => {
                    warn!(
                        tree = self.tree.name(),
                        running = self.scheduler.len(),
                        "上一次播放仍在运行，新旧会话将并行执行"
                    );
                }
                RetriggerPolicy::Restart => {
                    debug!(tree = self.tree.name(), "重新开始播放");
                    self.scheduler.cancel_all();
                    self.tree.reset_all_nodes();
                }
                RetriggerPolicy::Ignore => {
                    debug!(tree = self.tree.name(), "上一次播放仍在运行，忽略 play()");
                    return Ok(TickReport::default());
                }
            }
        }

        self.tree.clear_session_subscriptions();
        for (id, binding) in &self.bindings {
            if let Some(node) = self.tree.node_mut(id) {
                binding.triggers.bind(node.events_mut());
            }
        }
        for node in self.tree.nodes_mut() {
            node.initialize_before_running();
        }

        self.sessions_started += 1;
        let session = SessionId::new(self.sessions_started);
        self.session = Some(session);
        self.state = PlayerState::Playing;
        info!(tree = self.tree.name(), session = %session, "开始播放");

        let frame = self.clock.current();
        let report = self
            .scheduler
            .launch(&mut self.tree, &root, session, &frame);
        self.trace.extend(&report.events);
        Ok(report)
    }

    /// 推进 `dt` 秒（未缩放）
    pub fn tick(&mut self, dt: f32) -> Result<TickReport, PlayerError> {
        let frame = self.clock.advance(dt);
        self.step(frame)
    }

    /// 按 Host 提供的帧推进
    pub fn tick_frame(&mut self, frame: FrameTime) -> Result<TickReport, PlayerError> {
        self.clock.sync(frame);
        self.step(frame)
    }

    fn step(&mut self, frame: FrameTime) -> Result<TickReport, PlayerError> {
        let mut report = self.scheduler.tick(&mut self.tree, &frame);
        self.trace.extend(&report.events);

        if !self.first_tick_done {
            self.first_tick_done = true;
            if self.config.auto_play == AutoPlay::OnStart {
                report.merge(self.play()?);
            }
        }
        Ok(report)
    }

    /// 停止播放
    ///
    /// 取消所有任务、重置所有节点并清除会话订阅。返回后不会再有节点事件，
    /// 直到下一次 `play()`。
    pub fn stop(&mut self) {
        let cancelled = self.scheduler.cancel_all();
        self.tree.reset_all_nodes();
        self.tree.clear_session_subscriptions();
        self.session = None;

        if self.state != PlayerState::Playing {
            debug!(state = %self.state, "播放器不在播放状态，stop() 只做清理");
            return;
        }
        self.state = PlayerState::Stopped;
        info!(tree = self.tree.name(), cancelled, "停止播放");
        for observer in &mut self.stopped_observers {
            observer();
        }
    }

    /// 只停止某个节点及其子孙的任务（不重置节点、不触发停止通知）
    pub fn stop_subtree(&mut self, node: &NodeId) -> usize {
        self.scheduler.cancel_subtree(&self.tree, node)
    }

    /// 检查从根节点可达的节点参数
    fn validate_nodes(&self, root: &NodeId) -> Result<(), ConfigurationError> {
        let mut reachable = self.tree.descendants(root);
        reachable.insert(0, root.clone());
        for id in &reachable {
            let Some(node) = self.tree.node(id) else {
                continue;
            };
            if let Err(message) = node.kind().validate() {
                return Err(ConfigurationError::InvalidNode {
                    node: id.clone(),
                    message,
                });
            }
        }
        Ok(())
    }
}
