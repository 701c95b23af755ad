//! # Play 命令
//!
//! 用虚拟时钟驱动播放器，直到所有任务结束或超过最长模拟时长。

use std::fmt::Write as _;

use juice_runtime::{AutoPlay, EffectPlayer, PlayerState, TickReport, TreeDocument};
use tracing::{debug, info, warn};

use crate::config::CliConfig;
use crate::scene::Scene;

/// 一次模拟的结果
#[derive(Debug, Clone, Default)]
pub struct PlayOutcome {
    /// 事件时间线
    pub timeline: String,
    /// 配置错误（已中止的节点）
    pub failures: Vec<String>,
    /// 因缺少可选目标而跳过的节点数
    pub skipped: usize,
    /// 推进的帧数
    pub ticks: u32,
    /// 结束时的缩放时间
    pub elapsed: f32,
    /// 是否因超时被强制停止
    pub timed_out: bool,
    /// 结束时各目标的属性值
    pub values: String,
}

impl PlayOutcome {
    fn absorb(&mut self, report: &TickReport) {
        self.failures
            .extend(report.failures.iter().map(|e| e.to_string()));
        self.skipped += report.skipped.len();
    }

    /// 输出给终端的文本
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&self.timeline);
        if !self.failures.is_empty() {
            out.push_str("\n配置错误:\n");
            for failure in &self.failures {
                let _ = writeln!(out, "  - {failure}");
            }
        }
        if !self.values.is_empty() {
            out.push_str("\n目标属性:\n");
            for line in self.values.lines() {
                let _ = writeln!(out, "  {line}");
            }
        }
        let _ = writeln!(
            out,
            "\n{} 帧, {:.3}s{}",
            self.ticks,
            self.elapsed,
            if self.timed_out { "（超时停止）" } else { "" }
        );
        out
    }
}

/// 模拟播放一个文档
///
/// `OnAwake` 在构造播放器时就已开始，其启动结果只进入事件记录和日志。
pub fn simulate(
    document: TreeDocument,
    scene: Option<&Scene>,
    config: &CliConfig,
) -> anyhow::Result<PlayOutcome> {
    config.validate()?;

    let (tree, document_player) = document.into_parts();
    let player_config = config.player_config(document_player);
    let bound = scene.map(|s| s.bind(&tree)).transpose()?;
    let bindings = bound
        .as_ref()
        .map(|b| b.bindings.clone())
        .unwrap_or_default();

    let auto_play = player_config.auto_play;
    let mut player = EffectPlayer::with_bindings(tree, player_config, bindings)?;
    let mut outcome = PlayOutcome::default();

    match auto_play {
        AutoPlay::Never => outcome.absorb(&player.play()?),
        AutoPlay::OnEnable => {
            if let Some(report) = player.enable()? {
                outcome.absorb(&report);
            }
        }
        AutoPlay::OnAwake | AutoPlay::OnStart => {}
    }

    let dt = config.frame_delta();
    let max_ticks = (config.max_duration * config.tick_rate).ceil() as u32;
    while outcome.ticks < max_ticks {
        if player.state() == PlayerState::Playing && !player.is_running() {
            break;
        }
        let report = player.tick(dt)?;
        outcome.absorb(&report);
        outcome.ticks += 1;
    }

    if player.is_running() {
        warn!(
            max_duration = config.max_duration,
            running = player.scheduler().len(),
            "超过最长模拟时长，强制停止"
        );
        outcome.timed_out = true;
        player.stop();
    }

    outcome.elapsed = player.now().time;
    outcome.timeline = player.trace().render(player.tree());
    if let Some(bound) = &bound {
        outcome.values = bound.render_values();
    }

    info!(
        ticks = outcome.ticks,
        events = player.trace().len(),
        failures = outcome.failures.len(),
        "模拟结束"
    );
    debug!(state = %player.state(), "播放器最终状态");
    Ok(outcome)
}
