//! # Juice Runtime
//!
//! 效果树执行与编排核心库。
//!
//! ## 架构概述
//!
//! `juice-runtime` 是纯逻辑核心，不读取文件、不访问终端、不读取真实时间。
//! 效果由一棵节点树描述：父节点完成自身动作后，所有子节点在同一 tick 内一起启动。
//! Host 绑定目标对象，并以显式的时间驱动播放器：
//!
//! ```text
//! Host                                  Runtime
//!   │                                      │
//!   │──── bind(node, NodeBinding) ───────►│
//!   │──── play() ────────────────────────►│ 从根节点启动
//!   │──── tick(dt) ──────────────────────►│ 推进所有任务
//!   │◄─── TickReport { events, failures } ─│
//!   │──── stop() ────────────────────────►│ 取消并重置
//! ```
//!
//! ## 核心类型
//!
//! - [`EffectTree`]：节点仓库与父子关系
//! - [`EffectKind`]：封闭的节点类型集合
//! - [`EffectPlayer`]：绑定目标并驱动执行
//! - [`Scheduler`]：单线程协作式调度器
//! - [`FrameTime`] / [`VirtualClock`]：显式时间上下文
//!
//! ## 使用示例
//!
//! ```ignore
//! use juice_runtime::{EffectKind, EffectPlayer, EffectTree, NodeBinding, PlayerConfig, TweenAxis};
//!
//! let mut tree = EffectTree::with_root("hit");
//! let root = tree.root().cloned().unwrap();
//! let wait = tree.create_node(EffectKind::delay(0.2));
//! let fade = tree.create_node(EffectKind::tween(0.5, vec![TweenAxis::to("alpha", 0.0)]));
//! tree.add_child(&root, &wait)?;
//! tree.add_child(&wait, &fade)?;
//!
//! let mut player = EffectPlayer::new(tree, PlayerConfig::default())?;
//! player.bind(fade, NodeBinding::new().with_target(sprite))?;
//! player.play()?;
//! while player.is_running() {
//!     player.tick(1.0 / 60.0)?;
//! }
//! ```
//!
//! ## 模块结构
//!
//! - [`clock`]：时间上下文
//! - [`easing`]：缓动曲线
//! - [`target`]：目标对象接口
//! - [`event`]：节点事件与订阅
//! - [`tree`]：节点、效果树与分组
//! - [`runtime`]：动作、调度器与播放器
//! - [`config`] / [`state`]：播放器配置与状态
//! - [`diagnostic`]：静态检查
//! - [`document`]：持久化格式
//! - [`trace`]：事件记录
//! - [`error`]：错误类型

pub mod clock;
pub mod config;
pub mod diagnostic;
pub mod document;
pub mod easing;
pub mod error;
pub mod event;
pub mod runtime;
pub mod state;
pub mod target;
pub mod trace;
pub mod tree;

// 重导出核心类型
pub use clock::{FrameTime, TimeSource, VirtualClock, progress};
pub use config::{AutoPlay, PlayerConfig, RetriggerPolicy};
pub use diagnostic::{Diagnostic, DiagnosticLevel, DiagnosticResult, analyze_tree};
pub use document::{FormatVersion, TreeDocument};
pub use easing::EasingFunction;
pub use error::{
    ConfigurationError, DocumentError, GroupError, JuiceError, JuiceResult, PlayerError,
    TreeError,
};
pub use event::{
    EventHandler, EventSlot, EventSlots, NodeEvent, NodeEventKind, SubscriptionId,
    SubscriptionScope, handler,
};
pub use runtime::{
    EffectPlayer, NodeAction, NodeBinding, NodeTriggers, Scheduler, SessionId, Step, TickReport,
};
pub use state::PlayerState;
pub use target::{EffectTarget, PropertyTarget, TargetRef};
pub use trace::EventTrace;
pub use tree::{
    AbortPolicy, EffectKind, EffectNode, EffectTree, GroupManager, NodeGroup, NodeId, Position,
    Rect, TargetRequirement, TreeChange, TweenAxis, TweenStart,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_api_accessible() {
        let tree = EffectTree::with_root("api");
        let player = EffectPlayer::new(tree, PlayerConfig::default()).unwrap();
        assert_eq!(player.state(), PlayerState::Uninitialized);

        let _kind = EffectKind::delay(1.0);
        let _target = PropertyTarget::new("Camera").with_property("fov", 60.0);
        let _frame = FrameTime::zero();
    }
}
