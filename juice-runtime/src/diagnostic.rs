//! # 诊断模块
//!
//! 效果树的静态检查，不依赖 IO 或播放器。
//!
//! ## 设计原则
//!
//! - 纯函数 API，编辑器、CLI 和 xtask 都可以直接调用
//! - 诊断分级：Error（播放会失败）、Warn（建议修复）、Info（信息提示）

use std::collections::HashSet;

use crate::tree::{EffectKind, EffectTree, NodeId};

/// 诊断级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DiagnosticLevel {
    /// 信息提示
    Info,
    /// 警告（建议修复）
    Warn,
    /// 错误（必须修复）
    Error,
}

impl std::fmt::Display for DiagnosticLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warn => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// 诊断条目
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// 诊断级别
    pub level: DiagnosticLevel,
    /// 树名称
    pub tree: String,
    /// 相关节点（如果可定位）
    pub node: Option<NodeId>,
    /// 诊断消息
    pub message: String,
}

impl Diagnostic {
    pub fn error(tree: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(DiagnosticLevel::Error, tree, message)
    }

    pub fn warn(tree: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(DiagnosticLevel::Warn, tree, message)
    }

    pub fn info(tree: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(DiagnosticLevel::Info, tree, message)
    }

    fn new(level: DiagnosticLevel, tree: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            tree: tree.into(),
            node: None,
            message: message.into(),
        }
    }

    /// 设置相关节点
    pub fn with_node(mut self, node: &NodeId) -> Self {
        self.node = Some(node.clone());
        self
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.level, self.tree)?;
        if let Some(node) = &self.node {
            write!(f, "/{}", node)?;
        }
        write!(f, ": {}", self.message)
    }
}

/// 诊断结果
#[derive(Debug, Clone, Default)]
pub struct DiagnosticResult {
    pub diagnostics: Vec<Diagnostic>,
}

impl DiagnosticResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// 合并另一个结果
    pub fn merge(&mut self, other: DiagnosticResult) {
        self.diagnostics.extend(other.diagnostics);
    }

    pub fn error_count(&self) -> usize {
        self.count(DiagnosticLevel::Error)
    }

    pub fn warn_count(&self) -> usize {
        self.count(DiagnosticLevel::Warn)
    }

    fn count(&self, level: DiagnosticLevel) -> usize {
        self.diagnostics.iter().filter(|d| d.level == level).count()
    }

    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// 按级别过滤
    pub fn filter_by_level(&self, min_level: DiagnosticLevel) -> Vec<&Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.level >= min_level)
            .collect()
    }
}

/// 检查效果树
///
/// - Error：缺少根节点、多余的根类型节点、节点参数无效
/// - Warn：从根节点不可达的节点、分组引用了不存在的节点
/// - Info：需要目标的节点没有声明目标类型
pub fn analyze_tree(tree: &EffectTree) -> DiagnosticResult {
    let mut result = DiagnosticResult::new();
    let name = tree.name();

    if tree.root().is_none() {
        result.push(Diagnostic::error(name, "效果树没有根节点"));
    }

    let orphans: HashSet<NodeId> = if tree.root().is_some() {
        tree.orphans().into_iter().collect()
    } else {
        HashSet::new()
    };

    for node in tree.nodes() {
        let id = node.id();

        if node.is_root() && tree.root() != Some(id) {
            result.push(Diagnostic::error(name, "多余的根类型节点").with_node(id));
        }

        if let Err(message) = node.kind().validate() {
            result.push(
                Diagnostic::error(name, format!("节点 '{}' 参数无效: {message}", node.name()))
                    .with_node(id),
            );
        }

        if orphans.contains(id) {
            result.push(
                Diagnostic::warn(
                    name,
                    format!("节点 '{}' 从根节点不可达，播放时不会执行", node.name()),
                )
                .with_node(id),
            );
        }

        if matches!(node.kind(), EffectKind::MatchValue { .. }) && node.target_type().is_none() {
            result.push(
                Diagnostic::info(
                    name,
                    format!("节点 '{}' 需要目标对象，但没有声明目标类型", node.name()),
                )
                .with_node(id),
            );
        }
    }

    for group in tree.groups().groups() {
        for id in &group.node_ids {
            if !tree.contains(id) {
                result.push(
                    Diagnostic::warn(name, format!("分组 '{}' 引用了不存在的节点", group.name))
                        .with_node(id),
                );
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_root() {
        let tree = EffectTree::new("empty");
        let result = analyze_tree(&tree);
        assert!(result.has_errors());
        assert_eq!(result.error_count(), 1);
    }

    #[test]
    fn test_clean_tree() {
        let mut tree = EffectTree::with_root("ok");
        let root = tree.root().cloned().unwrap();
        let a = tree.create_node(EffectKind::delay(1.0));
        tree.add_child(&root, &a).unwrap();

        assert!(analyze_tree(&tree).is_empty());
    }

    #[test]
    fn test_orphans_and_invalid_nodes() {
        let mut tree = EffectTree::with_root("t");
        let root = tree.root().cloned().unwrap();
        let orphan = tree.create_named_node("Lost", EffectKind::delay(1.0));
        let bad = tree.create_named_node("Bad", EffectKind::counter(0));
        tree.add_child(&root, &bad).unwrap();

        let result = analyze_tree(&tree);
        assert_eq!(result.error_count(), 1);
        assert_eq!(result.warn_count(), 1);
        let warn = result.filter_by_level(DiagnosticLevel::Warn);
        assert_eq!(warn.len(), 2);
        assert!(warn.iter().any(|d| d.node.as_ref() == Some(&orphan)));
    }

    #[test]
    fn test_match_value_info() {
        let mut tree = EffectTree::with_root("t");
        let root = tree.root().cloned().unwrap();
        let id = tree.create_node(EffectKind::MatchValue {
            property: "x".to_string(),
            source_property: "x".to_string(),
            duration: 1.0,
            time_source: Default::default(),
            easing: Default::default(),
        });
        tree.add_child(&root, &id).unwrap();

        let result = analyze_tree(&tree);
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].level, DiagnosticLevel::Info);

        tree.node_mut(&id).unwrap().with_target_type("Transform");
        assert!(analyze_tree(&tree).is_empty());
    }

    #[test]
    fn test_diagnostic_display() {
        let d = Diagnostic::warn("fx", "问题").with_node(&NodeId::from("n1"));
        assert_eq!(d.to_string(), "[WARN] fx/n1: 问题");
    }
}
