//! 示例文档，供 `juice new` 使用

use juice_runtime::{EasingFunction, EffectKind, EffectTree, TreeDocument, TweenAxis};
use std::collections::BTreeMap;

use crate::scene::{Scene, SceneTarget};

/// 示例树：等待后淡出精灵，同时抖动相机
///
/// ```text
/// Root
/// ├── Wait (0.25s)
/// │   └── Fade (sprite.alpha 1 → 0, 0.5s)
/// └── Shake (camera.y ±0.2, 0.5s)
/// ```
pub fn sample_document() -> TreeDocument {
    let mut tree = EffectTree::with_root("sample");
    let root = tree.set_root_node();

    let wait = tree.create_named_node("Wait", EffectKind::delay(0.25));
    let fade = tree.create_named_node(
        "Fade",
        EffectKind::Tween {
            duration: 0.5,
            time_source: Default::default(),
            easing: EasingFunction::EaseOutQuad,
            axes: vec![TweenAxis::between("alpha", 1.0, 0.0)],
        },
    );
    let shake = tree.create_named_node(
        "Shake",
        EffectKind::Shake {
            property: "y".to_string(),
            amplitude: 0.2,
            duration: 0.5,
            resample_interval: 0.0,
            time_source: Default::default(),
            seed: Some(7),
        },
    );

    if let Some(node) = tree.node_mut(&fade) {
        node.with_target_type("Sprite");
    }
    if let Some(node) = tree.node_mut(&shake) {
        node.with_target_type("Camera");
    }

    // 新建的节点互不相连，连接不会失败
    for (parent, child) in [(&root, &wait), (&wait, &fade), (&root, &shake)] {
        let _ = tree.add_child(parent, child);
    }

    TreeDocument::new(tree)
}

/// 与示例树配套的场景
pub fn sample_scene() -> Scene {
    Scene {
        targets: vec![
            SceneTarget {
                name: "camera".to_string(),
                type_name: "Camera".to_string(),
                properties: BTreeMap::from([("y".to_string(), 0.0)]),
                bind: vec!["Shake".to_string()],
                auxiliary_for: Vec::new(),
            },
            SceneTarget {
                name: "sprite".to_string(),
                type_name: "Sprite".to_string(),
                properties: BTreeMap::from([("alpha".to_string(), 1.0)]),
                bind: vec!["Fade".to_string()],
                auxiliary_for: Vec::new(),
            },
        ],
    }
}
