//! `juice` 命令行入口

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use juice_cli::{
    CheckReport, CliConfig, Overrides, Scene, check_file, sample_document, sample_scene, simulate,
};
use juice_runtime::TreeDocument;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "juice", version, about = "效果树无界面宿主")]
struct Cli {
    /// 日志级别，覆盖 RUST_LOG 与配置文件
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// 用虚拟时钟播放一个树文档
    Play(PlayArgs),
    /// 检查树文档
    Check {
        #[arg(required = true)]
        trees: Vec<PathBuf>,
    },
    /// 写出示例树文档
    New {
        output: PathBuf,
        /// 同时写出配套的场景文件
        #[arg(long)]
        scene: Option<PathBuf>,
    },
}

#[derive(Args)]
struct PlayArgs {
    tree: PathBuf,
    /// 场景文件
    #[arg(long)]
    scene: Option<PathBuf>,
    /// CLI 配置文件
    #[arg(long)]
    config: Option<PathBuf>,
    /// 模拟帧率（Hz）
    #[arg(long)]
    tick_rate: Option<f32>,
    /// 最长模拟时长（秒）
    #[arg(long)]
    duration: Option<f32>,
    /// 虚拟时钟的 time scale
    #[arg(long)]
    time_scale: Option<f32>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let file_level = match &cli.command {
        Command::Play(args) => args.config.as_ref().and_then(CliConfig::peek_log_level),
        _ => None,
    };
    init_tracing(cli.log_level.as_deref(), file_level.as_deref());

    if let Err(e) = run(cli) {
        error!("{e:#}");
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

/// 级别来源：命令行 > RUST_LOG > 配置文件 > `info`
fn init_tracing(flag: Option<&str>, file_level: Option<&str>) {
    let fallback = file_level.unwrap_or("info");
    let filter = match flag {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Play(args) => play(args, cli.log_level),
        Command::Check { trees } => check(&trees),
        Command::New { output, scene } => write_sample(output, scene),
    }
}

fn play(args: PlayArgs, log_level: Option<String>) -> anyhow::Result<()> {
    let config = args
        .config
        .as_ref()
        .map(CliConfig::load)
        .unwrap_or_default()
        .apply(&Overrides {
            tick_rate: args.tick_rate,
            max_duration: args.duration,
            time_scale: args.time_scale,
            log_level,
        });

    let content = fs::read_to_string(&args.tree)
        .with_context(|| format!("无法读取树文档: {}", args.tree.display()))?;
    let document = TreeDocument::from_json(&content)
        .with_context(|| format!("树文档解析失败: {}", args.tree.display()))?;
    let scene = args.scene.as_ref().map(Scene::load).transpose()?;

    info!(tree = %document.name, tick_rate = config.tick_rate, "开始模拟");
    let outcome = simulate(document, scene.as_ref(), &config)?;
    print!("{}", outcome.render());

    if !outcome.failures.is_empty() {
        bail!("{} 个节点配置错误", outcome.failures.len());
    }
    Ok(())
}

fn check(trees: &[PathBuf]) -> anyhow::Result<()> {
    let mut report = CheckReport::default();
    for tree in trees {
        check_file(tree, &mut report);
    }
    eprint!("{}", report.render());

    if report.error_count() > 0 {
        bail!("检查发现错误");
    }
    Ok(())
}

fn write_sample(output: PathBuf, scene: Option<PathBuf>) -> anyhow::Result<()> {
    let json = sample_document().to_json()?;
    fs::write(&output, json).with_context(|| format!("无法写入: {}", output.display()))?;
    info!(path = %output.display(), "已写出示例树文档");

    if let Some(path) = scene {
        let json = serde_json::to_string_pretty(&sample_scene())?;
        fs::write(&path, json).with_context(|| format!("无法写入: {}", path.display()))?;
        info!(path = %path.display(), "已写出示例场景");
    }
    Ok(())
}
