//! # Runtime 模块
//!
//! 效果树的执行引擎。
//!
//! ## 模块结构
//!
//! - [`action`]：节点自身动作的可恢复状态机
//! - [`scheduler`]：单线程协作式调度器
//! - [`player`]：绑定目标并驱动执行的播放器

pub mod action;
pub mod player;
pub mod scheduler;

pub use action::{NodeAction, Step};
pub use player::{EffectPlayer, NodeBinding, NodeTriggers};
pub use scheduler::{Scheduler, SessionId, TickReport};
