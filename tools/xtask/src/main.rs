//! # xtask - 开发辅助工具
//!
//! ## 命令
//!
//! - `check-all`: fmt、clippy、测试，最后检查 `trees/` 下随仓库发布的示例树
//! - `cov-runtime`: 只统计 juice-runtime（调度器、播放器、树编辑）的覆盖率
//! - `cov-workspace`: 统计 juice-runtime 与 juice-cli 的覆盖率
//! - `tree-check`: 加载效果树文档并输出诊断

use std::path::{Path, PathBuf};
use std::process::{Command, ExitCode};

use juice_runtime::{DiagnosticResult, TreeDocument, analyze_tree};
use walkdir::WalkDir;

/// 参与覆盖率统计的 crate
const RUNTIME_PACKAGES: &[&str] = &["juice-runtime"];
const COVERED_PACKAGES: &[&str] = &["juice-runtime", "juice-cli"];

fn run(step: &str, cmd: &mut Command) -> anyhow::Result<()> {
    eprintln!("\n==> {step}");
    let status = cmd.status()?;
    if !status.success() {
        anyhow::bail!("{step} failed with {status}");
    }
    Ok(())
}

fn cargo(args: &[&str]) -> anyhow::Result<()> {
    let step = format!("cargo {}", args.join(" "));
    run(&step, Command::new("cargo").args(args))
}

/// 对指定 crate 生成 HTML 覆盖率报告
fn coverage(packages: &[&str]) -> anyhow::Result<()> {
    let available = Command::new("cargo")
        .args(["llvm-cov", "--version"])
        .status()
        .is_ok_and(|s| s.success());
    if !available {
        anyhow::bail!(
            "需要 cargo-llvm-cov：cargo install cargo-llvm-cov && rustup component add llvm-tools-preview"
        );
    }

    let mut args = vec!["llvm-cov"];
    for package in packages {
        args.extend(["-p", *package]);
    }
    args.push("--html");
    cargo(&args)?;

    eprintln!("\nCoverage HTML: target/llvm-cov/html/index.html");
    Ok(())
}

fn main() -> ExitCode {
    if let Err(e) = real_main() {
        eprintln!("xtask error: {e:#}");
        return ExitCode::from(1);
    }
    ExitCode::from(0)
}

fn real_main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let sub = args.next().unwrap_or_else(|| "help".to_string());

    match sub.as_str() {
        "check-all" => {
            cargo(&["fmt", "--all", "--", "--check"])?;
            cargo(&["clippy", "--workspace", "--all-targets"])?;
            cargo(&["test", "--workspace"])?;
            tree_check(None)?;
        }
        "cov-runtime" => coverage(RUNTIME_PACKAGES)?,
        "cov-workspace" => coverage(COVERED_PACKAGES)?,
        "tree-check" => {
            let path = args.next();
            tree_check(path.as_deref())?;
        }
        "help" | "-h" | "--help" => print_help(),
        other => anyhow::bail!("unknown xtask subcommand: {other}"),
    }

    Ok(())
}

fn print_help() {
    eprintln!(
        r#"xtask - juice 开发辅助工具

USAGE:
  cargo xtask <command>

COMMANDS:
  check-all       fmt + clippy + test，然后检查 trees/ 下的示例树
  cov-runtime     juice-runtime 覆盖率
  cov-workspace   juice-runtime + juice-cli 覆盖率（不含 xtask）
  tree-check      检查效果树文档

TREE-CHECK:
  cargo xtask tree-check [path]

  默认检查 trees/ 下所有 .json；可指定单个文档或目录。
  报告：JSON/版本错误、根节点缺失或类型不对、孤立节点、
  无效的节点参数、引用了不存在节点的分组。

  `juice check` 做同样的检查，xtask 版本额外用于 check-all 门禁。
"#
    );
}

//=============================================================================
// tree-check 命令实现
//=============================================================================

/// 默认的文档目录（相对于 workspace root）
const DEFAULT_TREES_DIR: &str = "trees";

/// 检查结果
struct TreeCheckResult {
    /// 检查的文档数量
    documents_checked: usize,
    /// 读取/解析错误数量
    load_errors: usize,
    /// 诊断结果
    diagnostics: DiagnosticResult,
}

/// 执行文档检查
fn tree_check(path: Option<&str>) -> anyhow::Result<()> {
    let files = match path {
        Some(p) => {
            let path = PathBuf::from(p);
            if path.is_file() {
                vec![path]
            } else if path.is_dir() {
                collect_tree_files(&path)?
            } else {
                anyhow::bail!("路径不存在: {}", p);
            }
        }
        None => {
            let dir = Path::new(DEFAULT_TREES_DIR);
            if !dir.exists() {
                anyhow::bail!(
                    "默认文档目录不存在: {}\n请在 workspace 根目录运行，或指定文档路径",
                    dir.display()
                );
            }
            collect_tree_files(dir)?
        }
    };

    if files.is_empty() {
        eprintln!("未找到树文档（.json）");
        return Ok(());
    }

    eprintln!("==> 检查 {} 个树文档...\n", files.len());

    let mut result = TreeCheckResult {
        documents_checked: 0,
        load_errors: 0,
        diagnostics: DiagnosticResult::new(),
    };

    for file in &files {
        check_tree_file(file, &mut result);
    }

    print_check_result(&result);

    if result.load_errors > 0 || result.diagnostics.has_errors() {
        anyhow::bail!("树文档检查发现错误");
    }

    Ok(())
}

/// 收集目录下的所有 .json 文件
fn collect_tree_files(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir) {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type().is_file() && path.extension().is_some_and(|ext| ext == "json") {
            files.push(path.to_path_buf());
        }
    }
    files.sort();
    Ok(files)
}

/// 检查单个文档
fn check_tree_file(file: &Path, result: &mut TreeCheckResult) {
    let id = file.display().to_string();
    result.documents_checked += 1;

    let content = match std::fs::read_to_string(file) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("[ERROR] {}: 无法读取文件 - {}", id, e);
            result.load_errors += 1;
            return;
        }
    };

    let document = match TreeDocument::from_json(&content) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("[ERROR] {}: {}", id, e);
            result.load_errors += 1;
            return;
        }
    };

    result.diagnostics.merge(analyze_tree(&document.tree));
}

/// 输出检查结果
fn print_check_result(result: &TreeCheckResult) {
    eprintln!("─────────────────────────────────────────────────────");
    eprintln!("检查完成: {} 个文档", result.documents_checked);
    eprintln!();

    for diag in &result.diagnostics.diagnostics {
        eprintln!("{}", diag);
    }

    let error_count = result.load_errors + result.diagnostics.error_count();
    let warn_count = result.diagnostics.warn_count();

    eprintln!();
    if error_count > 0 {
        eprintln!("❌ {} 个错误, {} 个警告", error_count, warn_count);
    } else if warn_count > 0 {
        eprintln!("⚠️  0 个错误, {} 个警告", warn_count);
    } else {
        eprintln!("✅ 检查通过，无错误");
    }
}
