//! # juice-cli
//!
//! 效果树的无界面宿主。
//!
//! 用虚拟时钟驱动 [`juice_runtime::EffectPlayer`]，把场景文件中声明的属性目标
//! 绑定到节点上，输出事件时间线与最终属性值；也可以对树文档做静态检查。

pub mod check;
pub mod config;
pub mod play;
pub mod sample;
pub mod scene;

pub use check::{CheckReport, check_file};
pub use config::{CliConfig, Overrides};
pub use play::{PlayOutcome, simulate};
pub use sample::{sample_document, sample_scene};
pub use scene::{BoundScene, Scene, SceneTarget};
