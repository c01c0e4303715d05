//! 组件模块
//!
//! 此模块包含组件结构体、CQS 角色、声明/初始化/步进上下文以及组件注册表。

// 子模块声明
mod behavior;
#[allow(clippy::module_inception)]
mod component;
mod registry;
mod role;

// 重新导出公共接口
pub use behavior::{
    ComponentBehavior, Configurable, Configurer, InitContext, PortHandle, StepContext, Steppable,
};
pub use component::{Component, ComponentKind, PortOwning};
pub use registry::{ComponentCtor, MISSING_COMPONENT, MissingComponent, Registry};
pub use role::{ComponentState, CqsRole};
