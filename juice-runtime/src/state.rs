//! # State 模块
//!
//! 播放器的生命周期状态。
//!
//! ## 状态转换
//!
//! ```text
//! Uninitialized --init_tree--> Initialized --play--> Playing
//!                                                      │  ▲
//!                                                 stop │  │ play
//!                                                      ▼  │
//!                                                    Stopped
//! ```
//!
//! `play()` 在未初始化时会先执行 `init_tree()`。
//! 所有任务自然结束后状态仍为 `Playing`，用 `is_running()` 判断是否还有任务。

use serde::{Deserialize, Serialize};

/// 播放器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerState {
    /// 尚未绑定目标
    #[default]
    Uninitialized,
    /// 已绑定目标，尚未播放
    Initialized,
    /// 已调用 `play()`
    Playing,
    /// 已调用 `stop()`
    Stopped,
}

impl PlayerState {
    /// 是否已执行过 `init_tree()`
    pub fn is_initialized(&self) -> bool {
        !matches!(self, Self::Uninitialized)
    }
}

impl std::fmt::Display for PlayerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Initialized => "initialized",
            Self::Playing => "playing",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_initialized() {
        assert!(!PlayerState::Uninitialized.is_initialized());
        assert!(PlayerState::Stopped.is_initialized());
        assert_eq!(PlayerState::default(), PlayerState::Uninitialized);
        assert_eq!(PlayerState::Playing.to_string(), "playing");
    }
}
