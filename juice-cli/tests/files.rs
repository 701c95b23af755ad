//! 从文件加载文档、场景与配置后模拟播放

use std::fs;
use std::path::PathBuf;

use juice_cli::{CliConfig, Scene, sample_document, sample_scene, simulate};
use juice_runtime::TreeDocument;

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("juice-files-{}-{name}", std::process::id()))
}

#[test]
fn test_play_from_files() {
    let tree_path = temp_path("tree.json");
    let scene_path = temp_path("scene.json");
    let config_path = temp_path("config.json");

    fs::write(&tree_path, sample_document().to_json().unwrap()).unwrap();
    fs::write(&scene_path, serde_json::to_string_pretty(&sample_scene()).unwrap()).unwrap();
    fs::write(&config_path, r#"{ "tick_rate": 4, "max_duration": 5 }"#).unwrap();

    let document = TreeDocument::from_json(&fs::read_to_string(&tree_path).unwrap()).unwrap();
    let scene = Scene::load(&scene_path).unwrap();
    let config = CliConfig::load(&config_path);

    for path in [&tree_path, &scene_path, &config_path] {
        fs::remove_file(path).unwrap();
    }

    let outcome = simulate(document, Some(&scene), &config).unwrap();
    assert_eq!(outcome.ticks, 3);
    assert!(outcome.failures.is_empty());
    assert!(outcome.render().contains("sprite.alpha = 0.000"));
}

#[test]
fn test_missing_scene_file() {
    let err = Scene::load(temp_path("nope.json")).err().unwrap();
    assert!(format!("{err:#}").contains("无法读取场景文件"));
}

/// 仓库自带的示例文档
#[test]
fn test_bundled_hit_feedback() {
    let root = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("..");
    let tree_path = root.join("trees/hit_feedback.json");

    let mut report = juice_cli::CheckReport::default();
    juice_cli::check_file(&tree_path, &mut report);
    assert_eq!(report.error_count(), 0, "{}", report.render());

    let document = TreeDocument::from_json(&fs::read_to_string(&tree_path).unwrap()).unwrap();
    let scene = Scene::load(root.join("scenes/hit_feedback.json")).unwrap();
    let config = CliConfig {
        tick_rate: 20.0,
        ..CliConfig::default()
    };

    let outcome = simulate(document, Some(&scene), &config).unwrap();
    assert!(!outcome.timed_out);
    assert!(outcome.failures.is_empty());
    assert_eq!(outcome.skipped, 0);
    assert_eq!(
        outcome.values,
        "camera.fov = 55.000\ncamera.x = 0.000\nsprite.brightness = 1.000\n"
    );
}
