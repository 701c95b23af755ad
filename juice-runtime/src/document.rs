//! # Document 模块
//!
//! 效果树文档：带版本号的持久化格式。
//!
//! ## 设计原则
//!
//! - 只包含可序列化的编辑期数据（节点、参数、位置、分组），不包含目标和订阅
//! - 必须有版本号，读取时先检查兼容性再解析树
//! - 存储介质由 Host 决定，这里只负责 JSON 转换

use serde::{Deserialize, Serialize};

use crate::config::PlayerConfig;
use crate::error::DocumentError;
use crate::tree::EffectTree;

/// 文档格式版本
///
/// - MAJOR: 不兼容的格式变更
/// - MINOR: 向后兼容的新字段
pub const FORMAT_VERSION_MAJOR: u32 = 1;
pub const FORMAT_VERSION_MINOR: u32 = 0;

/// 文档版本信息
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatVersion {
    pub major: u32,
    pub minor: u32,
}

impl FormatVersion {
    pub fn current() -> Self {
        Self {
            major: FORMAT_VERSION_MAJOR,
            minor: FORMAT_VERSION_MINOR,
        }
    }

    /// major 相同即兼容
    pub fn is_compatible(&self) -> bool {
        self.major == FORMAT_VERSION_MAJOR
    }
}

impl Default for FormatVersion {
    fn default() -> Self {
        Self::current()
    }
}

impl std::fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// 效果树文档
#[derive(Debug, Serialize, Deserialize)]
pub struct TreeDocument {
    /// 格式版本
    pub version: FormatVersion,
    /// 文档标题（默认与树名相同）
    pub name: String,
    /// 播放器配置
    #[serde(default)]
    pub player: PlayerConfig,
    /// 效果树
    pub tree: EffectTree,
}

#[derive(Deserialize)]
struct VersionProbe {
    version: FormatVersion,
}

impl TreeDocument {
    pub fn new(tree: EffectTree) -> Self {
        Self {
            version: FormatVersion::current(),
            name: tree.name().to_string(),
            player: PlayerConfig::default(),
            tree,
        }
    }

    pub fn with_player(mut self, player: PlayerConfig) -> Self {
        self.player = player;
        self
    }

    /// 序列化为 JSON 字符串
    pub fn to_json(&self) -> Result<String, DocumentError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// 从 JSON 字符串读取
    ///
    /// 版本不兼容时不会尝试解析树。
    pub fn from_json(json: &str) -> Result<Self, DocumentError> {
        let probe: VersionProbe = serde_json::from_str(json)?;
        if !probe.version.is_compatible() {
            return Err(DocumentError::IncompatibleVersion {
                found: probe.version.to_string(),
                expected: FormatVersion::current().to_string(),
            });
        }
        Ok(serde_json::from_str(json)?)
    }

    /// 取出效果树和播放器配置
    pub fn into_parts(self) -> (EffectTree, PlayerConfig) {
        (self.tree, self.player)
    }
}
