//! # Target 模块
//!
//! 效果节点修改的外部对象接口。
//!
//! ## 核心概念
//!
//! - 核心不知道"修改"具体意味着什么，只通过具名 f32 属性读写目标
//! - 目标由 Host 持有并共享给节点（`Rc<dyn EffectTarget>`），使用内部可变性
//! - 单线程协作式调度保证修改不会被抢占，因此不加锁

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

/// 共享的目标引用
pub type TargetRef = Rc<dyn EffectTarget>;

/// 可被效果节点修改的对象
///
/// ## 实现示例
///
/// ```rust,ignore
/// struct Camera {
///     fov: Cell<f32>,
/// }
///
/// impl EffectTarget for Camera {
///     fn type_name(&self) -> &str {
///         "Camera"
///     }
///
///     fn get_property(&self, property: &str) -> Option<f32> {
///         match property {
///             "fov" => Some(self.fov.get()),
///             _ => None,
///         }
///     }
///
///     fn set_property(&self, property: &str, value: f32) -> bool {
///         match property {
///             "fov" => {
///                 self.fov.set(value);
///                 true
///             }
///             _ => false,
///         }
///     }
///
///     fn property_list(&self) -> Vec<String> {
///         vec!["fov".to_string()]
///     }
/// }
/// ```
pub trait EffectTarget {
    /// 目标类型名，用于和节点声明的 `target_type` 比对
    fn type_name(&self) -> &str;

    /// 读取属性，不存在时返回 `None`
    fn get_property(&self, property: &str) -> Option<f32>;

    /// 写入属性，属性不存在时返回 `false`
    fn set_property(&self, property: &str, value: f32) -> bool;

    /// 所有可修改的属性
    fn property_list(&self) -> Vec<String>;
}

/// 通用的具名属性集合
///
/// Host、测试与 CLI 都可以直接使用。属性集合在创建时固定，
/// 写入不存在的属性会失败。
#[derive(Debug)]
pub struct PropertyTarget {
    type_name: String,
    properties: RefCell<BTreeMap<String, f32>>,
}

impl PropertyTarget {
    /// 创建空目标
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            properties: RefCell::new(BTreeMap::new()),
        }
    }

    /// 声明一个属性及其初始值
    pub fn with_property(self, name: impl Into<String>, value: f32) -> Self {
        self.properties.borrow_mut().insert(name.into(), value);
        self
    }

    /// 包装成共享引用
    pub fn shared(self) -> Rc<Self> {
        Rc::new(self)
    }

    /// 所有属性的当前值（按名称排序）
    pub fn snapshot(&self) -> Vec<(String, f32)> {
        self.properties
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect()
    }
}

impl EffectTarget for PropertyTarget {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn get_property(&self, property: &str) -> Option<f32> {
        self.properties.borrow().get(property).copied()
    }

    fn set_property(&self, property: &str, value: f32) -> bool {
        match self.properties.borrow_mut().get_mut(property) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    fn property_list(&self) -> Vec<String> {
        self.properties.borrow().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_target() {
        let target = PropertyTarget::new("Camera")
            .with_property("fov", 60.0)
            .with_property("x", 0.0);

        assert_eq!(target.type_name(), "Camera");
        assert_eq!(target.get_property("fov"), Some(60.0));
        assert_eq!(target.get_property("unknown"), None);

        assert!(target.set_property("fov", 75.0));
        assert_eq!(target.get_property("fov"), Some(75.0));

        assert!(!target.set_property("unknown", 1.0));
        assert_eq!(target.property_list(), vec!["fov", "x"]);
    }

    #[test]
    fn test_shared_mutation() {
        let target = PropertyTarget::new("Transform")
            .with_property("scale", 1.0)
            .shared();
        let as_ref: TargetRef = target.clone();

        as_ref.set_property("scale", 2.0);
        assert_eq!(target.get_property("scale"), Some(2.0));
        assert_eq!(target.snapshot(), vec![("scale".to_string(), 2.0)]);
    }
}
