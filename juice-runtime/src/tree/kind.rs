//! # Kind 模块
//!
//! 效果节点的封闭类型集合。
//!
//! 所有节点类型在这里登记，按名称创建（[`EffectKind::from_type_name`]），
//! 不依赖运行时反射。每种类型声明自己对目标/辅助对象的需求。

use serde::{Deserialize, Serialize};

use crate::clock::TimeSource;
use crate::easing::EasingFunction;

/// 节点对目标对象的需求
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetRequirement {
    /// 不需要目标
    None,
    /// 可选：缺失时记录警告并跳过自身动作
    Optional,
    /// 必需：缺失时报告配置错误
    Required,
}

/// 补间起点
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "value", rename_all = "snake_case")]
pub enum TweenStart {
    /// 编辑时给定的固定值
    Fixed(f32),
    /// 节点开始执行时读取目标当前值（每次执行采样一次）
    Current,
    /// 播放前钩子读取的值（每次 `play()` 采样一次）
    Snapshot,
}

/// 补间的一个轴（一个属性）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TweenAxis {
    /// 目标属性名
    pub property: String,
    /// 起点
    pub start: TweenStart,
    /// 终点
    pub end: f32,
    /// 轴独立曲线；为空时使用节点的统一曲线
    #[serde(default)]
    pub easing: Option<EasingFunction>,
}

impl TweenAxis {
    /// 从当前值补间到 `end`
    pub fn to(property: impl Into<String>, end: f32) -> Self {
        Self {
            property: property.into(),
            start: TweenStart::Current,
            end,
            easing: None,
        }
    }

    /// 从 `start` 补间到 `end`
    pub fn between(property: impl Into<String>, start: f32, end: f32) -> Self {
        Self {
            property: property.into(),
            start: TweenStart::Fixed(start),
            end,
            easing: None,
        }
    }

    /// 起点改为播放前快照
    pub fn from_snapshot(mut self) -> Self {
        self.start = TweenStart::Snapshot;
        self
    }

    /// 设置轴独立曲线
    pub fn with_easing(mut self, easing: EasingFunction) -> Self {
        self.easing = Some(easing);
        self
    }
}

/// 节点类型
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EffectKind {
    /// 根节点：没有自身动作，立即展开子节点
    Root,

    /// 等待指定时长
    Delay {
        duration: f32,
        #[serde(default)]
        time_source: TimeSource,
    },

    /// 补间一个或多个属性
    Tween {
        duration: f32,
        #[serde(default)]
        time_source: TimeSource,
        /// 统一曲线
        #[serde(default)]
        easing: EasingFunction,
        axes: Vec<TweenAxis>,
    },

    /// 立即设置属性
    Set { property: String, value: f32 },

    /// 在开始时的值附近随机抖动，结束时恢复
    Shake {
        property: String,
        amplitude: f32,
        duration: f32,
        /// 随机偏移保持的时长，到期后才重新采样
        #[serde(default)]
        resample_interval: f32,
        #[serde(default)]
        time_source: TimeSource,
        /// 固定随机种子（测试/回放用）
        #[serde(default)]
        seed: Option<u64>,
    },

    /// 把目标属性补间到辅助对象的属性值（开始时采样一次）
    MatchValue {
        property: String,
        source_property: String,
        duration: f32,
        #[serde(default)]
        time_source: TimeSource,
        #[serde(default)]
        easing: EasingFunction,
    },

    /// 激活计数：累计到阈值才展开子节点，随后重新计数
    ActivationCounter { threshold: u32 },
}

impl EffectKind {
    /// 所有已登记的类型名
    pub const TYPE_NAMES: &'static [&'static str] = &[
        "root",
        "delay",
        "tween",
        "set",
        "shake",
        "match_value",
        "activation_counter",
    ];

    /// 按类型名创建默认配置
    pub fn from_type_name(name: &str) -> Option<Self> {
        let kind = match name {
            "root" => Self::Root,
            "delay" => Self::delay(1.0),
            "tween" => Self::Tween {
                duration: 1.0,
                time_source: TimeSource::default(),
                easing: EasingFunction::default(),
                axes: Vec::new(),
            },
            "set" => Self::Set {
                property: String::new(),
                value: 0.0,
            },
            "shake" => Self::Shake {
                property: String::new(),
                amplitude: 1.0,
                duration: 0.5,
                resample_interval: 0.0,
                time_source: TimeSource::default(),
                seed: None,
            },
            "match_value" => Self::MatchValue {
                property: String::new(),
                source_property: String::new(),
                duration: 1.0,
                time_source: TimeSource::default(),
                easing: EasingFunction::default(),
            },
            "activation_counter" => Self::ActivationCounter { threshold: 1 },
            _ => return None,
        };
        Some(kind)
    }

    /// 类型名
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Root => "root",
            Self::Delay { .. } => "delay",
            Self::Tween { .. } => "tween",
            Self::Set { .. } => "set",
            Self::Shake { .. } => "shake",
            Self::MatchValue { .. } => "match_value",
            Self::ActivationCounter { .. } => "activation_counter",
        }
    }

    /// 等待节点
    pub fn delay(duration: f32) -> Self {
        Self::Delay {
            duration,
            time_source: TimeSource::default(),
        }
    }

    /// 统一曲线的补间节点
    pub fn tween(duration: f32, axes: Vec<TweenAxis>) -> Self {
        Self::Tween {
            duration,
            time_source: TimeSource::default(),
            easing: EasingFunction::default(),
            axes,
        }
    }

    /// 激活计数节点
    pub fn counter(threshold: u32) -> Self {
        Self::ActivationCounter { threshold }
    }

    /// 对主目标的需求
    pub fn target_requirement(&self) -> TargetRequirement {
        match self {
            Self::Root | Self::Delay { .. } | Self::ActivationCounter { .. } => {
                TargetRequirement::None
            }
            Self::Tween { .. } | Self::Set { .. } | Self::Shake { .. } => {
                TargetRequirement::Optional
            }
            Self::MatchValue { .. } => TargetRequirement::Required,
        }
    }

    /// 是否需要辅助对象
    pub fn needs_auxiliary(&self) -> bool {
        matches!(self, Self::MatchValue { .. })
    }

    /// 自身动作时长（瞬时动作为 0）
    pub fn duration(&self) -> f32 {
        match self {
            Self::Delay { duration, .. }
            | Self::Tween { duration, .. }
            | Self::Shake { duration, .. }
            | Self::MatchValue { duration, .. } => *duration,
            Self::Root | Self::Set { .. } | Self::ActivationCounter { .. } => 0.0,
        }
    }

    /// 检查参数，返回问题描述
    pub fn validate(&self) -> Result<(), String> {
        let duration = self.duration();
        if duration.is_nan() || duration < 0.0 {
            return Err(format!("时长必须是非负数，实际为 {duration}"));
        }

        match self {
            Self::Tween { axes, .. } if axes.is_empty() => {
                Err("补间节点至少需要一个轴".to_string())
            }
            Self::Tween { axes, .. } if axes.iter().any(|a| a.property.is_empty()) => {
                Err("补间轴的属性名不能为空".to_string())
            }
            Self::Set { property, .. }
            | Self::Shake { property, .. }
            | Self::MatchValue { property, .. }
                if property.is_empty() =>
            {
                Err("属性名不能为空".to_string())
            }
            Self::MatchValue {
                source_property, ..
            } if source_property.is_empty() => Err("辅助对象属性名不能为空".to_string()),
            Self::Shake {
                amplitude,
                resample_interval,
                ..
            } if !(*amplitude * 2.0).is_finite()
                || *amplitude < 0.0
                || resample_interval.is_nan()
                || *resample_interval < 0.0 =>
            {
                Err("抖动幅度和重采样间隔必须是非负数".to_string())
            }
            Self::ActivationCounter { threshold: 0 } => Err("激活阈值必须大于 0".to_string()),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_round_trip() {
        for name in EffectKind::TYPE_NAMES {
            let kind = EffectKind::from_type_name(name).unwrap();
            assert_eq!(kind.type_name(), *name);
        }
        assert_eq!(EffectKind::from_type_name("camera_fov"), None);
    }

    #[test]
    fn test_requirements() {
        assert_eq!(
            EffectKind::delay(1.0).target_requirement(),
            TargetRequirement::None
        );
        assert_eq!(
            EffectKind::tween(1.0, vec![TweenAxis::to("x", 1.0)]).target_requirement(),
            TargetRequirement::Optional
        );

        let matcher = EffectKind::from_type_name("match_value").unwrap();
        assert_eq!(matcher.target_requirement(), TargetRequirement::Required);
        assert!(matcher.needs_auxiliary());
    }

    #[test]
    fn test_validate() {
        assert!(EffectKind::delay(0.0).validate().is_ok());
        assert!(EffectKind::delay(-1.0).validate().is_err());
        assert!(EffectKind::tween(1.0, Vec::new()).validate().is_err());
        assert!(EffectKind::counter(0).validate().is_err());
        assert!(EffectKind::counter(3).validate().is_ok());
        // 默认 set 节点没有属性名
        assert!(EffectKind::from_type_name("set").unwrap().validate().is_err());
    }

    #[test]
    fn test_validate_shake_amplitude_range() {
        let shake = |amplitude: f32| EffectKind::Shake {
            property: "y".to_string(),
            amplitude,
            duration: 1.0,
            resample_interval: 0.0,
            time_source: TimeSource::Scaled,
            seed: Some(1),
        };
        assert!(shake(0.5).validate().is_ok());
        assert!(shake(f32::MAX / 4.0).validate().is_ok());
        // 区间宽度 2 * amplitude 溢出
        assert!(shake(3.0e38).validate().is_err());
        assert!(shake(f32::INFINITY).validate().is_err());
        assert!(shake(f32::NAN).validate().is_err());
        assert!(shake(-0.1).validate().is_err());
    }

    #[test]
    fn test_kind_json() {
        let kind = EffectKind::tween(
            0.5,
            vec![TweenAxis::between("x", 0.0, 1.0).with_easing(EasingFunction::EaseOut)],
        );
        let json = serde_json::to_string(&kind).unwrap();
        assert!(json.contains("\"type\":\"tween\""));

        let back: EffectKind = serde_json::from_str(&json).unwrap();
        assert_eq!(back, kind);

        let parsed: EffectKind =
            serde_json::from_str(r#"{"type":"delay","duration":2.0}"#).unwrap();
        assert_eq!(parsed, EffectKind::delay(2.0));
    }
}
