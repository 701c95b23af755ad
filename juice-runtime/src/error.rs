//! # Error 模块
//!
//! 定义 juice-runtime 中使用的错误类型。

use thiserror::Error;

use crate::tree::NodeId;

/// 树结构编辑错误
///
/// 失败的编辑不会修改树：所有检查都在写入之前完成。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TreeError {
    /// 节点不存在
    #[error("节点 '{id}' 不存在")]
    NodeNotFound { id: NodeId },

    /// 尝试删除根节点
    #[error("根节点不能被删除")]
    CannotRemoveRoot,

    /// 根节点不能成为子节点
    #[error("根节点不能作为 '{parent}' 的子节点")]
    RootAsChild { parent: NodeId },

    /// 节点不能成为自己的子节点
    #[error("节点 '{id}' 不能作为自己的子节点")]
    SelfParent { id: NodeId },

    /// 添加子节点会形成环
    #[error("将 '{child}' 添加为 '{parent}' 的子节点会形成环")]
    CycleDetected { parent: NodeId, child: NodeId },

    /// 未注册的节点类型
    #[error("未知的节点类型 '{type_name}'")]
    UnknownNodeType { type_name: String },

    /// 树尚未创建根节点
    #[error("效果树没有根节点")]
    MissingRoot,

    /// 节点 ID 重复（加载数据时）
    #[error("节点 '{id}' 重复出现")]
    DuplicateNode { id: NodeId },

    /// 节点有多个父节点（加载数据时）
    #[error("节点 '{id}' 同时属于多个父节点")]
    MultipleParents { id: NodeId },

    /// 指定的根节点不是根类型（加载数据时）
    #[error("节点 '{id}' 不是根类型，不能作为根节点")]
    RootNotRootKind { id: NodeId },
}

/// 分组管理错误
///
/// 分组只是编辑器层面的组织信息，这些错误都按警告处理。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GroupError {
    /// 分组名重复
    #[error("分组 '{name}' 已存在")]
    DuplicateName { name: String },

    /// 分组区域与已有分组重叠
    #[error("分组 '{name}' 的区域与分组 '{other}' 重叠")]
    Overlap { name: String, other: String },

    /// 分组不存在
    #[error("分组 '{name}' 不存在")]
    UnknownGroup { name: String },

    /// 节点不在分组中
    #[error("节点 '{node}' 不在分组 '{name}' 中")]
    NodeNotInGroup { name: String, node: NodeId },

    /// 节点已属于其他分组
    #[error("节点 '{node}' 已属于分组 '{name}'")]
    NodeAlreadyGrouped { name: String, node: NodeId },

    /// 节点不在树中
    #[error("节点 '{node}' 不在效果树中")]
    UnknownNode { node: NodeId },
}

/// 配置错误
///
/// 节点缺少必需的引用或参数无效，需要交给调用方处理。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    /// 缺少必需的目标对象
    #[error("节点 '{node}' 缺少必需的目标对象")]
    MissingTarget { node: NodeId },

    /// 缺少必需的辅助对象
    #[error("节点 '{node}' 缺少必需的辅助对象")]
    MissingAuxiliary { node: NodeId },

    /// 目标上没有该属性
    #[error("节点 '{node}' 的目标 '{target_type}' 没有属性 '{property}'")]
    UnknownProperty {
        node: NodeId,
        target_type: String,
        property: String,
    },

    /// 节点参数无效
    #[error("节点 '{node}' 参数无效: {message}")]
    InvalidNode { node: NodeId, message: String },

    /// 播放器配置无效
    #[error("播放器配置无效: {message}")]
    InvalidPlayer { message: String },
}

impl ConfigurationError {
    /// 出错的节点（播放器配置错误时为 None）
    pub fn node(&self) -> Option<&NodeId> {
        match self {
            Self::MissingTarget { node }
            | Self::MissingAuxiliary { node }
            | Self::UnknownProperty { node, .. }
            | Self::InvalidNode { node, .. } => Some(node),
            Self::InvalidPlayer { .. } => None,
        }
    }
}

/// 播放器错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlayerError {
    /// 树结构问题
    #[error(transparent)]
    Tree(#[from] TreeError),

    /// 配置问题
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

/// 树文档读写错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DocumentError {
    /// JSON 序列化/反序列化失败
    #[error("树文档 JSON 处理失败: {message}")]
    Json { message: String },

    /// 版本不兼容
    #[error("树文档版本 {found} 与当前版本 {expected} 不兼容")]
    IncompatibleVersion { found: String, expected: String },
}

impl From<serde_json::Error> for DocumentError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json {
            message: e.to_string(),
        }
    }
}

/// juice-runtime 统一错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum JuiceError {
    /// 树结构错误
    #[error("树结构错误: {0}")]
    Tree(#[from] TreeError),

    /// 分组错误
    #[error("分组错误: {0}")]
    Group(#[from] GroupError),

    /// 配置错误
    #[error("配置错误: {0}")]
    Configuration(#[from] ConfigurationError),

    /// 播放器错误
    #[error("播放器错误: {0}")]
    Player(#[from] PlayerError),

    /// 文档错误
    #[error("文档错误: {0}")]
    Document(#[from] DocumentError),
}

/// Result 类型别名
pub type JuiceResult<T> = Result<T, JuiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TreeError::NodeNotFound {
            id: NodeId::from("abc"),
        };
        assert_eq!(err.to_string(), "节点 'abc' 不存在");

        let wrapped: JuiceError = err.into();
        assert_eq!(wrapped.to_string(), "树结构错误: 节点 'abc' 不存在");
    }

    #[test]
    fn test_configuration_error_node() {
        let err = ConfigurationError::MissingAuxiliary {
            node: NodeId::from("n1"),
        };
        assert_eq!(err.node(), Some(&NodeId::from("n1")));

        let err = ConfigurationError::InvalidPlayer {
            message: "x".to_string(),
        };
        assert_eq!(err.node(), None);
    }
}
