//! # Clock 模块
//!
//! 显式的时间上下文。
//!
//! 节点不读取任何全局时间：每次推进调度器时，Host 传入一份 [`FrameTime`]
//! 快照，所有节点都从这份快照取时间。测试可以用 [`VirtualClock`] 精确控制时间。

use serde::{Deserialize, Serialize};

/// 节点使用的时间源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeSource {
    /// 受 time scale 影响的游戏时间
    #[default]
    Scaled,
    /// 不受 time scale 影响的真实时间
    Unscaled,
}

/// 单帧时间快照
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameTime {
    /// 帧序号（从 0 开始）
    pub frame: u64,
    /// 缩放后的累计时间（秒）
    pub time: f32,
    /// 未缩放的累计时间（秒）
    pub unscaled_time: f32,
    /// 本帧缩放后的增量
    pub delta: f32,
    /// 本帧未缩放的增量
    pub unscaled_delta: f32,
    /// 本帧使用的 time scale
    pub time_scale: f32,
}

impl FrameTime {
    /// 起始帧
    pub fn zero() -> Self {
        Self {
            frame: 0,
            time: 0.0,
            unscaled_time: 0.0,
            delta: 0.0,
            unscaled_delta: 0.0,
            time_scale: 1.0,
        }
    }

    /// 按时间源取当前时间
    pub fn now(&self, source: TimeSource) -> f32 {
        match source {
            TimeSource::Scaled => self.time,
            TimeSource::Unscaled => self.unscaled_time,
        }
    }

    /// 按时间源取本帧增量
    pub fn delta(&self, source: TimeSource) -> f32 {
        match source {
            TimeSource::Scaled => self.delta,
            TimeSource::Unscaled => self.unscaled_delta,
        }
    }
}

impl Default for FrameTime {
    fn default() -> Self {
        Self::zero()
    }
}

/// 虚拟时钟
///
/// 由 Host 以固定或可变步长推进，本身不感知真实时间流逝。
#[derive(Debug, Clone)]
pub struct VirtualClock {
    current: FrameTime,
    time_scale: f32,
}

impl VirtualClock {
    /// 创建 time scale 为 1 的时钟
    pub fn new() -> Self {
        Self {
            current: FrameTime::zero(),
            time_scale: 1.0,
        }
    }

    /// 指定初始 time scale
    pub fn with_time_scale(mut self, scale: f32) -> Self {
        self.set_time_scale(scale);
        self
    }

    /// 设置 time scale（负数和 NaN 视为 0）
    pub fn set_time_scale(&mut self, scale: f32) {
        self.time_scale = if scale.is_nan() { 0.0 } else { scale.max(0.0) };
    }

    /// 当前 time scale
    pub fn time_scale(&self) -> f32 {
        self.time_scale
    }

    /// 当前帧
    pub fn current(&self) -> FrameTime {
        self.current
    }

    /// 与 Host 提供的帧对齐（Host 自己维护时间时使用）
    pub fn sync(&mut self, frame: FrameTime) {
        self.current = frame;
        self.time_scale = frame.time_scale;
    }

    /// 推进一帧
    ///
    /// `dt` 为未缩放的真实时间增量，负数和 NaN 视为 0。
    pub fn advance(&mut self, dt: f32) -> FrameTime {
        let unscaled = if dt.is_nan() { 0.0 } else { dt.max(0.0) };
        let scaled = unscaled * self.time_scale;

        self.current = FrameTime {
            frame: self.current.frame + 1,
            time: self.current.time + scaled,
            unscaled_time: self.current.unscaled_time + unscaled,
            delta: scaled,
            unscaled_delta: unscaled,
            time_scale: self.time_scale,
        };
        self.current
    }
}

impl Default for VirtualClock {
    fn default() -> Self {
        Self::new()
    }
}

/// 计算进度
///
/// `clamp01(elapsed / duration)`；`duration <= 0` 时直接完成。
pub fn progress(elapsed: f32, duration: f32) -> f32 {
    if duration <= 0.0 {
        return 1.0;
    }
    if elapsed.is_nan() {
        return 0.0;
    }
    (elapsed / duration).clamp(0.0, 1.0)
}
