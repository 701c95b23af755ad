//! # Config 模块
//!
//! CLI 运行配置。
//!
//! ## 配置优先级
//!
//! 1. 命令行参数（最高）
//! 2. 配置文件（`--config` 指定的 JSON）
//! 3. 默认值（最低）

use std::fs;
use std::path::Path;

use anyhow::bail;
use juice_runtime::PlayerConfig;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// CLI 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    /// 模拟帧率（Hz）
    #[serde(default = "default_tick_rate")]
    pub tick_rate: f32,

    /// 最长模拟时长（秒），到达后强制停止
    #[serde(default = "default_max_duration")]
    pub max_duration: f32,

    /// 日志级别（`RUST_LOG` 语法）
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// 覆盖播放器的 time scale
    #[serde(default)]
    pub time_scale: Option<f32>,

    /// 播放器配置，覆盖文档自带的配置
    #[serde(default)]
    pub player: Option<PlayerConfig>,
}

fn default_tick_rate() -> f32 {
    60.0
}

fn default_max_duration() -> f32 {
    30.0
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            tick_rate: default_tick_rate(),
            max_duration: default_max_duration(),
            log_level: default_log_level(),
            time_scale: None,
            player: None,
        }
    }
}

/// 命令行覆盖项
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub tick_rate: Option<f32>,
    pub max_duration: Option<f32>,
    pub time_scale: Option<f32>,
    pub log_level: Option<String>,
}

impl CliConfig {
    /// 加载配置文件
    ///
    /// 文件不存在或解析失败时返回默认配置并记录警告。
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            warn!(path = %path.display(), "配置文件不存在，使用默认配置");
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(config) => {
                    info!(path = %path.display(), "配置文件加载成功");
                    config
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "配置文件解析失败，使用默认配置");
                    Self::default()
                }
            },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "配置文件读取失败，使用默认配置");
                Self::default()
            }
        }
    }

    /// 应用命令行覆盖
    pub fn apply(mut self, overrides: &Overrides) -> Self {
        if let Some(rate) = overrides.tick_rate {
            self.tick_rate = rate;
        }
        if let Some(duration) = overrides.max_duration {
            self.max_duration = duration;
        }
        if let Some(level) = &overrides.log_level {
            self.log_level = level.clone();
        }
        if let Some(scale) = overrides.time_scale {
            self.time_scale = Some(scale);
        }
        self
    }

    /// 最终生效的播放器配置
    ///
    /// 配置文件中的 `player` 覆盖文档自带的配置，`time_scale` 再覆盖两者。
    pub fn player_config(&self, document: PlayerConfig) -> PlayerConfig {
        let mut player = self.player.clone().unwrap_or(document);
        if let Some(scale) = self.time_scale {
            player.time_scale = scale;
        }
        player
    }

    /// 从配置文件中只读取日志级别，不记录日志
    ///
    /// 日志系统要在加载配置之前初始化。
    pub fn peek_log_level(path: impl AsRef<Path>) -> Option<String> {
        let content = fs::read_to_string(path).ok()?;
        serde_json::from_str::<CliConfig>(&content)
            .ok()
            .map(|c| c.log_level)
    }

    /// 每帧时长
    pub fn frame_delta(&self) -> f32 {
        1.0 / self.tick_rate
    }

    /// 验证配置有效性
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.tick_rate.is_finite() || self.tick_rate <= 0.0 {
            bail!("tick_rate 必须为正数: {}", self.tick_rate);
        }
        if !self.max_duration.is_finite() || self.max_duration < 0.0 {
            bail!("max_duration 不能为负数: {}", self.max_duration);
        }
        self.player_config(PlayerConfig::default()).validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use juice_runtime::AutoPlay;

    #[test]
    fn test_default_config() {
        let config = CliConfig::default();
        assert_eq!(config.tick_rate, 60.0);
        assert_eq!(config.max_duration, 30.0);
        assert_eq!(config.log_level, "info");
        assert!(config.player.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: CliConfig =
            serde_json::from_str(r#"{ "tick_rate": 4, "player": { "auto_play": "on_awake" } }"#)
                .unwrap();
        assert_eq!(config.tick_rate, 4.0);
        assert_eq!(config.max_duration, 30.0);
        assert_eq!(config.player.unwrap().auto_play, AutoPlay::OnAwake);
    }

    #[test]
    fn test_missing_file_falls_back() {
        let config = CliConfig::load("definitely/not/here/juice.json");
        assert_eq!(config.tick_rate, 60.0);
    }

    #[test]
    fn test_invalid_file_falls_back() {
        let path = std::env::temp_dir().join(format!("juice-cli-bad-{}.json", std::process::id()));
        fs::write(&path, "{ not json").unwrap();
        let config = CliConfig::load(&path);
        fs::remove_file(&path).unwrap();
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_overrides_take_precedence() {
        let file = CliConfig {
            tick_rate: 30.0,
            max_duration: 5.0,
            log_level: "debug".to_string(),
            time_scale: None,
            player: None,
        };
        let config = file.apply(&Overrides {
            tick_rate: Some(120.0),
            max_duration: None,
            time_scale: Some(0.5),
            log_level: None,
        });

        assert_eq!(config.tick_rate, 120.0);
        assert_eq!(config.max_duration, 5.0);
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.player_config(PlayerConfig::default()).time_scale, 0.5);
    }

    #[test]
    fn test_player_config_precedence() {
        let document = PlayerConfig::default().with_auto_play(AutoPlay::OnStart);

        let plain = CliConfig::default();
        assert_eq!(plain.player_config(document.clone()), document);

        let file = CliConfig {
            player: Some(PlayerConfig::default().with_auto_play(AutoPlay::OnAwake)),
            time_scale: Some(2.0),
            ..CliConfig::default()
        };
        let player = file.player_config(document);
        assert_eq!(player.auto_play, AutoPlay::OnAwake);
        assert_eq!(player.time_scale, 2.0);
    }

    #[test]
    fn test_peek_log_level() {
        let path = std::env::temp_dir().join(format!("juice-cli-level-{}.json", std::process::id()));
        fs::write(&path, r#"{ "log_level": "juice_runtime=trace" }"#).unwrap();
        let level = CliConfig::peek_log_level(&path);
        fs::remove_file(&path).unwrap();
        assert_eq!(level.as_deref(), Some("juice_runtime=trace"));
        assert_eq!(CliConfig::peek_log_level("missing/juice.json"), None);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let zero_rate = CliConfig {
            tick_rate: 0.0,
            ..CliConfig::default()
        };
        assert!(zero_rate.validate().is_err());

        let negative = CliConfig::default().apply(&Overrides {
            time_scale: Some(-1.0),
            ..Overrides::default()
        });
        assert!(negative.validate().is_err());
    }

    #[test]
    fn test_frame_delta() {
        let config = CliConfig {
            tick_rate: 4.0,
            ..CliConfig::default()
        };
        assert_eq!(config.frame_delta(), 0.25);
    }
}
