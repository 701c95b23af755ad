//! # Scene 模块
//!
//! 场景文件：声明一组具名属性目标，并把它们绑定到树上的节点。
//!
//! ```json
//! {
//!   "targets": [
//!     { "name": "camera", "type": "Camera", "properties": { "y": 0 }, "bind": ["Shake"] },
//!     { "name": "anchor", "type": "Anchor", "properties": { "x": 5 }, "auxiliary_for": ["Follow"] }
//!   ]
//! }
//! ```
//!
//! `bind` 与 `auxiliary_for` 中的引用先按节点 id 查找，找不到再按节点名查找。

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;
use std::rc::Rc;

use anyhow::{Context, bail};
use juice_runtime::{EffectTree, NodeBinding, NodeId, PropertyTarget};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// 场景文件
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scene {
    #[serde(default)]
    pub targets: Vec<SceneTarget>,
}

/// 场景中的一个目标
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneTarget {
    /// 目标名（输出时使用）
    pub name: String,
    /// 目标类型名，与节点的 `target_type` 比对
    #[serde(rename = "type")]
    pub type_name: String,
    /// 初始属性值
    #[serde(default)]
    pub properties: BTreeMap<String, f32>,
    /// 以此为目标的节点
    #[serde(default)]
    pub bind: Vec<String>,
    /// 以此为辅助对象的节点
    #[serde(default)]
    pub auxiliary_for: Vec<String>,
}

/// 绑定完成的场景
pub struct BoundScene {
    /// 按声明顺序排列的目标
    pub targets: Vec<(String, Rc<PropertyTarget>)>,
    /// 每个节点的实例数据
    pub bindings: BTreeMap<NodeId, NodeBinding>,
}

impl Scene {
    /// 从文件加载
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("无法读取场景文件: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("场景文件解析失败: {}", path.display()))
    }

    /// 创建目标并解析节点引用
    pub fn bind(&self, tree: &EffectTree) -> anyhow::Result<BoundScene> {
        let mut names = HashSet::new();
        let mut targets = Vec::with_capacity(self.targets.len());
        let mut bindings: BTreeMap<NodeId, NodeBinding> = BTreeMap::new();

        for entry in &self.targets {
            if !names.insert(entry.name.as_str()) {
                bail!("场景中目标重名: {}", entry.name);
            }

            let target = entry
                .properties
                .iter()
                .fold(PropertyTarget::new(&entry.type_name), |t, (k, v)| {
                    t.with_property(k, *v)
                })
                .shared();

            for reference in &entry.bind {
                let id = resolve_node(tree, reference)
                    .with_context(|| format!("目标 {} 绑定的节点不存在: {}", entry.name, reference))?;
                let binding = bindings.entry(id.clone()).or_default();
                if binding.target.is_some() {
                    bail!("节点 {} 绑定了多个目标", reference);
                }
                debug!(node = %id, target = %entry.name, "绑定目标");
                binding.target = Some(target.clone());
            }

            for reference in &entry.auxiliary_for {
                let id = resolve_node(tree, reference).with_context(|| {
                    format!("目标 {} 作为辅助对象的节点不存在: {}", entry.name, reference)
                })?;
                let binding = bindings.entry(id.clone()).or_default();
                if binding.auxiliary.is_some() {
                    bail!("节点 {} 绑定了多个辅助对象", reference);
                }
                debug!(node = %id, target = %entry.name, "绑定辅助对象");
                binding.auxiliary = Some(target.clone());
            }

            targets.push((entry.name.clone(), target));
        }

        Ok(BoundScene { targets, bindings })
    }
}

/// 先按 id、再按名称查找节点
fn resolve_node(tree: &EffectTree, reference: &str) -> Option<NodeId> {
    let id = NodeId::from(reference);
    if tree.contains(&id) {
        return Some(id);
    }
    tree.find_by_name(reference).cloned()
}

impl BoundScene {
    /// 所有目标的当前属性值，每行 `name.property = value`
    pub fn render_values(&self) -> String {
        let mut out = String::new();
        for (name, target) in &self.targets {
            for (property, value) in target.snapshot() {
                out.push_str(&format!("{name}.{property} = {value:.3}\n"));
            }
        }
        out
    }

    /// 按名称查找目标
    pub fn target(&self, name: &str) -> Option<&Rc<PropertyTarget>> {
        self.targets
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, t)| t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use juice_runtime::{EffectKind, EffectTarget};

    fn tree() -> (EffectTree, NodeId, NodeId) {
        let mut tree = EffectTree::with_root("scene_test");
        let shake = tree.create_named_node("Shake", EffectKind::delay(1.0));
        tree.node_mut(&shake).unwrap().with_target_type("Camera");
        let follow = tree.create_named_node("Follow", EffectKind::delay(1.0));
        (tree, shake, follow)
    }

    fn scene(json: &str) -> Scene {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_bind_by_name_and_id() {
        let (tree, shake, follow) = tree();
        let json = format!(
            r#"{{ "targets": [
                {{ "name": "camera", "type": "Camera", "properties": {{ "y": 2 }}, "bind": ["Shake"] }},
                {{ "name": "anchor", "type": "Anchor", "properties": {{ "x": 5 }}, "auxiliary_for": ["{}"] }}
            ] }}"#,
            follow.as_str()
        );

        let bound = scene(&json).bind(&tree).unwrap();
        assert_eq!(bound.targets.len(), 2);
        assert!(bound.bindings[&shake].target.is_some());
        assert!(bound.bindings[&follow].auxiliary.is_some());
        assert!(bound.bindings[&follow].target.is_none());
        assert_eq!(bound.target("camera").unwrap().get_property("y"), Some(2.0));
    }

    #[test]
    fn test_unknown_node_reference() {
        let (tree, _, _) = tree();
        let err = scene(r#"{ "targets": [ { "name": "c", "type": "Camera", "bind": ["Nope"] } ] }"#)
            .bind(&tree)
            .err()
            .unwrap();
        assert!(format!("{err:#}").contains("Nope"));
    }

    #[test]
    fn test_duplicate_target_name() {
        let (tree, _, _) = tree();
        let result = scene(
            r#"{ "targets": [
                { "name": "c", "type": "Camera" },
                { "name": "c", "type": "Camera" }
            ] }"#,
        )
        .bind(&tree);
        assert!(result.is_err());
    }

    #[test]
    fn test_node_bound_twice() {
        let (tree, _, _) = tree();
        let result = scene(
            r#"{ "targets": [
                { "name": "a", "type": "Camera", "bind": ["Shake"] },
                { "name": "b", "type": "Camera", "bind": ["Shake"] }
            ] }"#,
        )
        .bind(&tree);
        assert!(result.is_err());
    }

    #[test]
    fn test_render_values() {
        let (tree, shake, _) = tree();
        let bound = scene(
            r#"{ "targets": [
                { "name": "light", "type": "Light", "properties": { "intensity": 1, "hue": 0.5 }, "bind": ["Shake"] }
            ] }"#,
        )
        .bind(&tree)
        .unwrap();

        // 类型不一致只在播放器绑定时告警
        assert!(bound.bindings[&shake].target.is_some());
        assert_eq!(
            bound.render_values(),
            "light.hue = 0.500\nlight.intensity = 1.000\n"
        );
    }
}
