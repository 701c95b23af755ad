//! # Check 命令
//!
//! 读取树文档并运行静态诊断。

use std::fs;
use std::path::Path;

use juice_runtime::{DiagnosticResult, TreeDocument, analyze_tree};
use tracing::debug;

/// 检查结果
#[derive(Debug, Default)]
pub struct CheckReport {
    /// 检查的文档数量
    pub checked: usize,
    /// 无法读取或解析的文档，`(path, message)`
    pub load_errors: Vec<(String, String)>,
    /// 诊断结果
    pub diagnostics: DiagnosticResult,
}

impl CheckReport {
    pub fn error_count(&self) -> usize {
        self.load_errors.len() + self.diagnostics.error_count()
    }

    pub fn warn_count(&self) -> usize {
        self.diagnostics.warn_count()
    }

    /// 输出给终端的文本
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (path, message) in &self.load_errors {
            out.push_str(&format!("[ERROR] {path}: {message}\n"));
        }
        for diagnostic in &self.diagnostics.diagnostics {
            out.push_str(&format!("{diagnostic}\n"));
        }
        out.push_str(&format!(
            "检查完成: {} 个文档, {} 个错误, {} 个警告\n",
            self.checked,
            self.error_count(),
            self.warn_count()
        ));
        out
    }
}

/// 检查一个文档文件，结果合并进 `report`
pub fn check_file(path: &Path, report: &mut CheckReport) {
    report.checked += 1;
    let shown = path.display().to_string();

    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            report.load_errors.push((shown, format!("无法读取文件 - {e}")));
            return;
        }
    };

    match TreeDocument::from_json(&content) {
        Ok(document) => {
            let diagnostics = analyze_tree(&document.tree);
            debug!(path = %shown, count = diagnostics.diagnostics.len(), "诊断完成");
            report.diagnostics.merge(diagnostics);
        }
        Err(e) => report.load_errors.push((shown, e.to_string())),
    }
}
