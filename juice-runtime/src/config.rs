//! # Config 模块
//!
//! 播放器配置。
//!
//! 每个字段都有默认值，配置文件里缺失的字段按默认值处理。

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;
use crate::trace::DEFAULT_TRACE_CAPACITY;

/// 自动播放时机（互斥）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoPlay {
    /// 只在 Host 显式调用 `play()` 时播放
    #[default]
    Never,
    /// 创建播放器时
    OnAwake,
    /// 调用 `enable()` 时
    OnEnable,
    /// 第一次 `tick()` 时
    OnStart,
}

/// 上一次播放仍在运行时再次 `play()` 的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetriggerPolicy {
    /// 新旧会话并行执行（记录警告）
    #[default]
    Overlap,
    /// 先停止旧会话再开始
    Restart,
    /// 忽略新的调用
    Ignore,
}

/// 播放器配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// 自动播放时机
    #[serde(default)]
    pub auto_play: AutoPlay,

    /// 重复播放策略
    #[serde(default)]
    pub retrigger: RetriggerPolicy,

    /// 虚拟时钟的初始 time scale
    #[serde(default = "default_time_scale")]
    pub time_scale: f32,

    /// 事件记录容量（0 表示不记录）
    #[serde(default = "default_trace_capacity")]
    pub trace_capacity: usize,
}

fn default_time_scale() -> f32 {
    1.0
}

fn default_trace_capacity() -> usize {
    DEFAULT_TRACE_CAPACITY
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            auto_play: AutoPlay::default(),
            retrigger: RetriggerPolicy::default(),
            time_scale: default_time_scale(),
            trace_capacity: default_trace_capacity(),
        }
    }
}

impl PlayerConfig {
    pub fn with_auto_play(mut self, auto_play: AutoPlay) -> Self {
        self.auto_play = auto_play;
        self
    }

    pub fn with_retrigger(mut self, retrigger: RetriggerPolicy) -> Self {
        self.retrigger = retrigger;
        self
    }

    /// 验证配置
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if !self.time_scale.is_finite() || self.time_scale < 0.0 {
            return Err(ConfigurationError::InvalidPlayer {
                message: format!("time_scale 必须是非负有限数，实际为 {}", self.time_scale),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PlayerConfig::default();
        assert_eq!(config.auto_play, AutoPlay::Never);
        assert_eq!(config.retrigger, RetriggerPolicy::Overlap);
        assert_eq!(config.time_scale, 1.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: PlayerConfig =
            serde_json::from_str(r#"{"auto_play": "on_start", "time_scale": 0.5}"#).unwrap();
        assert_eq!(config.auto_play, AutoPlay::OnStart);
        assert_eq!(config.time_scale, 0.5);
        assert_eq!(config.trace_capacity, DEFAULT_TRACE_CAPACITY);
    }

    #[test]
    fn test_validate_time_scale() {
        let mut config = PlayerConfig::default();
        config.time_scale = -1.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::InvalidPlayer { .. })
        ));
        config.time_scale = f32::NAN;
        assert!(config.validate().is_err());
    }
}
