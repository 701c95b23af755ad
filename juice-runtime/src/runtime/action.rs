//! # Action 模块
//!
//! 节点自身动作的可恢复状态机。
//!
//! ## 执行模型
//!
//! ```text
//! prepare(node)  -> Prepared        开始时采样起点、检查目标
//! step(frame)    -> Step            每个挂起点推进一次
//! ```
//!
//! `step` 在 `elapsed < duration` 时按进度写入目标并返回 `Running`，
//! 否则写入终值并返回 `Finished`。时长为 0 的动作在第一次 `step` 就完成。

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::warn;

use crate::clock::{FrameTime, TimeSource, progress};
use crate::easing::EasingFunction;
use crate::error::ConfigurationError;
use crate::target::TargetRef;
use crate::tree::{EffectKind, EffectNode, NodeId, TargetRequirement, TweenStart};

/// 单次推进的结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Step {
    /// 仍在执行，附带当前进度
    Running(f32),
    /// 已写入终值
    Finished,
}

/// 节点开始执行前的准备结果
pub(crate) enum Prepared {
    /// 没有自身动作，直接展开子节点
    FanOut,
    /// 执行动作，完成后展开子节点
    Run(NodeAction),
    /// 执行动作，但完成后不展开子节点（计数未达到阈值）
    Hold(NodeAction),
    /// 缺少可选目标，跳过自身动作
    Skipped,
    /// 配置错误
    Failed(ConfigurationError),
}

/// 动作计时
#[derive(Debug, Clone, Copy)]
struct Timing {
    start: f32,
    duration: f32,
    source: TimeSource,
}

impl Timing {
    fn begin(frame: &FrameTime, duration: f32, source: TimeSource) -> Self {
        Self {
            start: frame.now(source),
            duration,
            source,
        }
    }

    fn elapsed(&self, frame: &FrameTime) -> f32 {
        (frame.now(self.source) - self.start).max(0.0)
    }
}

/// 已解析起点和终点的补间轴
#[derive(Debug, Clone)]
struct ResolvedAxis {
    property: String,
    from: f32,
    to: f32,
    easing: EasingFunction,
}

enum Effect {
    /// 只等待
    Wait,
    Set {
        target: TargetRef,
        property: String,
        value: f32,
    },
    Tween {
        target: TargetRef,
        axes: Vec<ResolvedAxis>,
    },
    Shake {
        target: TargetRef,
        property: String,
        base: f32,
        amplitude: f32,
        resample_interval: f32,
        /// 上次采样的时刻（相对动作开始）和偏移
        sample: Option<(f32, f32)>,
        rng: StdRng,
    },
}

/// 节点动作
pub struct NodeAction {
    timing: Timing,
    effect: Effect,
}

impl std::fmt::Debug for NodeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let effect = match &self.effect {
            Effect::Wait => "wait",
            Effect::Set { .. } => "set",
            Effect::Tween { .. } => "tween",
            Effect::Shake { .. } => "shake",
        };
        f.debug_struct("NodeAction")
            .field("effect", &effect)
            .field("start", &self.timing.start)
            .field("duration", &self.timing.duration)
            .finish()
    }
}

impl NodeAction {
    fn new(frame: &FrameTime, duration: f32, source: TimeSource, effect: Effect) -> Self {
        Self {
            timing: Timing::begin(frame, duration, source),
            effect,
        }
    }

    /// 瞬时动作（只产生开始/完成事件）
    fn instant(frame: &FrameTime) -> Self {
        Self::new(frame, 0.0, TimeSource::Scaled, Effect::Wait)
    }

    fn with_effect(mut self, effect: Effect) -> Self {
        self.effect = effect;
        self
    }

    pub fn duration(&self) -> f32 {
        self.timing.duration
    }

    /// 推进到 `frame`
    pub fn step(&mut self, frame: &FrameTime) -> Step {
        let elapsed = self.timing.elapsed(frame);
        if elapsed < self.timing.duration {
            let t = progress(elapsed, self.timing.duration);
            self.apply(elapsed, t);
            Step::Running(t)
        } else {
            self.finish();
            Step::Finished
        }
    }

    fn apply(&mut self, elapsed: f32, t: f32) {
        match &mut self.effect {
            Effect::Wait | Effect::Set { .. } => {}
            Effect::Tween { target, axes } => {
                for axis in axes.iter() {
                    target.set_property(&axis.property, axis.easing.lerp(axis.from, axis.to, t));
                }
            }
            Effect::Shake {
                target,
                property,
                base,
                amplitude,
                resample_interval,
                sample,
                rng,
            } => {
                let held = sample.filter(|(at, _)| elapsed - at < *resample_interval);
                let offset = match held {
                    Some((_, offset)) => offset,
                    None => {
                        let offset = rng.gen_range(-1.0f32..=1.0) * *amplitude;
                        *sample = Some((elapsed, offset));
                        offset
                    }
                };
                target.set_property(property, *base + offset);
            }
        }
    }

    fn finish(&mut self) {
        match &self.effect {
            Effect::Wait => {}
            Effect::Set {
                target,
                property,
                value,
            } => {
                target.set_property(property, *value);
            }
            Effect::Tween { target, axes } => {
                for axis in axes {
                    target.set_property(&axis.property, axis.to);
                }
            }
            Effect::Shake {
                target,
                property,
                base,
                ..
            } => {
                target.set_property(property, *base);
            }
        }
    }
}

/// 读取目标属性，属性不存在时返回配置错误
fn read_property(
    node: &NodeId,
    target: &TargetRef,
    property: &str,
) -> Result<f32, ConfigurationError> {
    target
        .get_property(property)
        .ok_or_else(|| ConfigurationError::UnknownProperty {
            node: node.clone(),
            target_type: target.type_name().to_string(),
            property: property.to_string(),
        })
}

/// 为节点准备一次执行
///
/// 计数节点会在这里累加激活次数。
pub(crate) fn prepare(node: &mut EffectNode, frame: &FrameTime) -> Prepared {
    if let Err(message) = node.kind().validate() {
        return Prepared::Failed(ConfigurationError::InvalidNode {
            node: node.id().clone(),
            message,
        });
    }

    let target = match (node.target_requirement(), node.target()) {
        (TargetRequirement::None, _) => None,
        (_, Some(target)) => Some(target.clone()),
        (TargetRequirement::Optional, None) => {
            warn!(
                node = %node.id(),
                name = node.name(),
                kind = node.kind().type_name(),
                "节点没有目标对象，跳过自身动作"
            );
            return Prepared::Skipped;
        }
        (TargetRequirement::Required, None) => {
            return Prepared::Failed(ConfigurationError::MissingTarget {
                node: node.id().clone(),
            });
        }
    };

    match build(node, target, frame) {
        Ok(prepared) => prepared,
        Err(e) => Prepared::Failed(e),
    }
}

fn build(
    node: &mut EffectNode,
    target: Option<TargetRef>,
    frame: &FrameTime,
) -> Result<Prepared, ConfigurationError> {
    let id = node.id().clone();
    let missing_target = || ConfigurationError::MissingTarget { node: id.clone() };

    let prepared = match node.kind() {
        EffectKind::Root => Prepared::FanOut,

        EffectKind::Delay {
            duration,
            time_source,
        } => Prepared::Run(NodeAction::new(frame, *duration, *time_source, Effect::Wait)),

        EffectKind::Set { property, value } => {
            let target = target.ok_or_else(missing_target)?;
            read_property(&id, &target, property)?;
            Prepared::Run(NodeAction::instant(frame).with_effect(Effect::Set {
                target,
                property: property.clone(),
                value: *value,
            }))
        }

        EffectKind::Tween {
            duration,
            time_source,
            easing,
            axes,
        } => {
            let target = target.ok_or_else(missing_target)?;
            let snapshots = &node.runtime().snapshots;
            let mut resolved = Vec::with_capacity(axes.len());
            for axis in axes {
                let current = read_property(&id, &target, &axis.property)?;
                let from = match axis.start {
                    TweenStart::Fixed(value) => value,
                    TweenStart::Current => current,
                    TweenStart::Snapshot => snapshots
                        .get(&axis.property)
                        .copied()
                        .unwrap_or(current),
                };
                resolved.push(ResolvedAxis {
                    property: axis.property.clone(),
                    from,
                    to: axis.end,
                    easing: axis.easing.unwrap_or(*easing),
                });
            }
            Prepared::Run(NodeAction::new(
                frame,
                *duration,
                *time_source,
                Effect::Tween {
                    target,
                    axes: resolved,
                },
            ))
        }

        EffectKind::Shake {
            property,
            amplitude,
            duration,
            resample_interval,
            time_source,
            seed,
        } => {
            let target = target.ok_or_else(missing_target)?;
            let base = read_property(&id, &target, property)?;
            let rng = match seed {
                Some(seed) => StdRng::seed_from_u64(*seed),
                None => StdRng::from_entropy(),
            };
            Prepared::Run(NodeAction::new(
                frame,
                *duration,
                *time_source,
                Effect::Shake {
                    target,
                    property: property.clone(),
                    base,
                    amplitude: *amplitude,
                    resample_interval: *resample_interval,
                    sample: None,
                    rng,
                },
            ))
        }

        EffectKind::MatchValue {
            property,
            source_property,
            duration,
            time_source,
            easing,
        } => {
            let target = target.ok_or_else(missing_target)?;
            let auxiliary = node
                .auxiliary()
                .cloned()
                .ok_or_else(|| ConfigurationError::MissingAuxiliary { node: id.clone() })?;
            let from = read_property(&id, &target, property)?;
            let to = read_property(&id, &auxiliary, source_property)?;
            Prepared::Run(NodeAction::new(
                frame,
                *duration,
                *time_source,
                Effect::Tween {
                    target,
                    axes: vec![ResolvedAxis {
                        property: property.clone(),
                        from,
                        to,
                        easing: *easing,
                    }],
                },
            ))
        }

        EffectKind::ActivationCounter { threshold } => {
            let threshold = *threshold;
            let runtime = node.runtime_mut();
            runtime.activations += 1;
            if runtime.activations >= threshold {
                runtime.activations = 0;
                Prepared::Run(NodeAction::instant(frame))
            } else {
                Prepared::Hold(NodeAction::instant(frame))
            }
        }
    };
    Ok(prepared)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::VirtualClock;
    use crate::target::{EffectTarget, PropertyTarget};
    use crate::tree::{EffectTree, TweenAxis};
    use std::rc::Rc;

    fn single(kind: EffectKind, target: Option<TargetRef>) -> (EffectTree, NodeId) {
        let mut tree = EffectTree::with_root("t");
        let id = tree.create_node(kind);
        tree.node_mut(&id).unwrap().set_target(target);
        (tree, id)
    }

    fn run_to_end(action: &mut NodeAction, clock: &mut VirtualClock, dt: f32) -> Vec<Step> {
        let mut steps = Vec::new();
        loop {
            let step = action.step(&clock.advance(dt));
            steps.push(step);
            if step == Step::Finished {
                return steps;
            }
        }
    }

    #[test]
    fn test_tween_progress_and_final_value() {
        let target = Rc::new(PropertyTarget::new("T").with_property("x", 0.0));
        let (mut tree, id) = single(
            EffectKind::tween(1.0, vec![TweenAxis::to("x", 4.0)]),
            Some(target.clone()),
        );
        let mut clock = VirtualClock::new();

        let Prepared::Run(mut action) = prepare(tree.node_mut(&id).unwrap(), &clock.current())
        else {
            panic!("tween should run");
        };
        assert_eq!(action.step(&clock.current()), Step::Running(0.0));
        assert_eq!(target.get_property("x"), Some(0.0));

        assert_eq!(action.step(&clock.advance(0.5)), Step::Running(0.5));
        assert_eq!(target.get_property("x"), Some(2.0));

        assert_eq!(action.step(&clock.advance(0.5)), Step::Finished);
        assert_eq!(target.get_property("x"), Some(4.0));
    }

    #[test]
    fn test_zero_duration_finishes_immediately() {
        let target = Rc::new(PropertyTarget::new("T").with_property("x", 0.0));
        let (mut tree, id) = single(
            EffectKind::tween(0.0, vec![TweenAxis::to("x", 1.0)]),
            Some(target.clone()),
        );
        let frame = FrameTime::zero();
        let Prepared::Run(mut action) = prepare(tree.node_mut(&id).unwrap(), &frame) else {
            panic!("tween should run");
        };
        assert_eq!(action.step(&frame), Step::Finished);
        assert_eq!(target.get_property("x"), Some(1.0));
    }

    #[test]
    fn test_missing_optional_target_skips() {
        let (mut tree, id) = single(EffectKind::tween(1.0, vec![TweenAxis::to("x", 1.0)]), None);
        assert!(matches!(
            prepare(tree.node_mut(&id).unwrap(), &FrameTime::zero()),
            Prepared::Skipped
        ));
    }

    #[test]
    fn test_unknown_property_fails() {
        let target: TargetRef = Rc::new(PropertyTarget::new("Camera").with_property("fov", 60.0));
        let (mut tree, id) = single(
            EffectKind::Set {
                property: "zoom".to_string(),
                value: 1.0,
            },
            Some(target),
        );
        let Prepared::Failed(err) = prepare(tree.node_mut(&id).unwrap(), &FrameTime::zero())
        else {
            panic!("expected configuration error");
        };
        assert_eq!(
            err,
            ConfigurationError::UnknownProperty {
                node: id,
                target_type: "Camera".to_string(),
                property: "zoom".to_string(),
            }
        );
    }

    #[test]
    fn test_match_value_requires_auxiliary() {
        let target: TargetRef = Rc::new(PropertyTarget::new("T").with_property("x", 0.0));
        let kind = EffectKind::MatchValue {
            property: "x".to_string(),
            source_property: "x".to_string(),
            duration: 1.0,
            time_source: TimeSource::Scaled,
            easing: EasingFunction::Linear,
        };

        let (mut tree, id) = single(kind.clone(), None);
        assert!(matches!(
            prepare(tree.node_mut(&id).unwrap(), &FrameTime::zero()),
            Prepared::Failed(ConfigurationError::MissingTarget { .. })
        ));

        let (mut tree, id) = single(kind, Some(target));
        assert!(matches!(
            prepare(tree.node_mut(&id).unwrap(), &FrameTime::zero()),
            Prepared::Failed(ConfigurationError::MissingAuxiliary { .. })
        ));
    }

    #[test]
    fn test_match_value_samples_auxiliary_once() {
        let target = Rc::new(PropertyTarget::new("T").with_property("x", 0.0));
        let leader = Rc::new(PropertyTarget::new("T").with_property("pos", 10.0));
        let (mut tree, id) = single(
            EffectKind::MatchValue {
                property: "x".to_string(),
                source_property: "pos".to_string(),
                duration: 1.0,
                time_source: TimeSource::Scaled,
                easing: EasingFunction::Linear,
            },
            Some(target.clone()),
        );
        tree.node_mut(&id).unwrap().set_auxiliary(Some(leader.clone()));

        let mut clock = VirtualClock::new();
        let Prepared::Run(mut action) = prepare(tree.node_mut(&id).unwrap(), &clock.current())
        else {
            panic!("match value should run");
        };
        // 开始后再修改辅助对象不影响终点
        leader.set_property("pos", 100.0);
        run_to_end(&mut action, &mut clock, 0.25);
        assert_eq!(target.get_property("x"), Some(10.0));
    }

    #[test]
    fn test_shake_holds_offset_and_restores() {
        let target = Rc::new(PropertyTarget::new("T").with_property("y", 5.0));
        let (mut tree, id) = single(
            EffectKind::Shake {
                property: "y".to_string(),
                amplitude: 1.0,
                duration: 1.0,
                resample_interval: 0.5,
                time_source: TimeSource::Scaled,
                seed: Some(7),
            },
            Some(target.clone()),
        );
        let mut clock = VirtualClock::new();
        let Prepared::Run(mut action) = prepare(tree.node_mut(&id).unwrap(), &clock.current())
        else {
            panic!("shake should run");
        };

        action.step(&clock.current());
        let first = target.get_property("y").unwrap();
        assert!((4.0..=6.0).contains(&first));

        // 未到重采样间隔，偏移保持不变
        action.step(&clock.advance(0.25));
        assert_eq!(target.get_property("y"), Some(first));

        action.step(&clock.advance(0.25));
        let second = target.get_property("y").unwrap();
        assert!((4.0..=6.0).contains(&second));

        run_to_end(&mut action, &mut clock, 0.25);
        assert_eq!(target.get_property("y"), Some(5.0));
    }

    #[test]
    fn test_shake_huge_amplitude_stays_finite() {
        let target = Rc::new(PropertyTarget::new("T").with_property("y", 0.0));
        let (mut tree, id) = single(
            EffectKind::Shake {
                property: "y".to_string(),
                amplitude: 3.0e38,
                duration: 0.5,
                resample_interval: 0.0,
                time_source: TimeSource::Scaled,
                seed: Some(1),
            },
            Some(target.clone()),
        );
        let mut clock = VirtualClock::new();
        // 校验拒绝溢出的幅度
        assert!(matches!(
            prepare(tree.node_mut(&id).unwrap(), &clock.current()),
            Prepared::Failed(ConfigurationError::InvalidNode { .. })
        ));

        // 绕过校验直接构建，采样也不会因区间溢出而崩溃
        let Ok(Prepared::Run(mut action)) = build(
            tree.node_mut(&id).unwrap(),
            Some(target.clone()),
            &clock.current(),
        ) else {
            panic!("shake should run");
        };

        action.step(&clock.current());
        let offset = target.get_property("y").unwrap();
        assert!(offset.is_finite());
        assert!(offset.abs() <= 3.0e38);

        run_to_end(&mut action, &mut clock, 0.25);
        assert_eq!(target.get_property("y"), Some(0.0));
    }

    #[test]
    fn test_counter_threshold() {
        let (mut tree, id) = single(EffectKind::counter(2), None);
        let frame = FrameTime::zero();

        assert!(matches!(
            prepare(tree.node_mut(&id).unwrap(), &frame),
            Prepared::Hold(_)
        ));
        assert!(matches!(
            prepare(tree.node_mut(&id).unwrap(), &frame),
            Prepared::Run(_)
        ));
        assert_eq!(tree.node(&id).unwrap().runtime().activations, 0);
    }

    #[test]
    fn test_invalid_kind_fails() {
        let (mut tree, id) = single(EffectKind::delay(-1.0), None);
        assert!(matches!(
            prepare(tree.node_mut(&id).unwrap(), &FrameTime::zero()),
            Prepared::Failed(ConfigurationError::InvalidNode { .. })
        ));
    }

    #[test]
    fn test_snapshot_start() {
        let target = Rc::new(PropertyTarget::new("T").with_property("x", 3.0));
        let (mut tree, id) = single(
            EffectKind::tween(1.0, vec![TweenAxis::to("x", 0.0).from_snapshot()]),
            Some(target.clone()),
        );
        tree.node_mut(&id).unwrap().initialize_before_running();
        target.set_property("x", 100.0);

        let frame = FrameTime::zero();
        let Prepared::Run(mut action) = prepare(tree.node_mut(&id).unwrap(), &frame) else {
            panic!("tween should run");
        };
        action.step(&frame);
        assert_eq!(target.get_property("x"), Some(3.0));
    }
}
