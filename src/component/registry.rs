//! 组件与节点类型注册表
//!
//! 注册表是显式对象，通常以 `Arc<Registry>` 在多个模型之间共享。
//! 未注册的组件类型会产出一个 [`MissingComponent`] 占位组件，同时报告错误。

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::core::node_types::builtin_node_types;
use crate::core::{KernelError, KernelResult, MessageSink, NodeType};

use super::behavior::{ComponentBehavior, Configurable, Configurer, InitContext, StepContext, Steppable};
use super::component::Component;
use super::role::CqsRole;

/// 组件构造函数
pub type ComponentCtor = Box<dyn Fn() -> Box<dyn ComponentBehavior> + Send + Sync>;

/// 占位组件的类型名
pub const MISSING_COMPONENT: &str = "MissingComponent";

struct ComponentEntry {
    ctor: ComponentCtor,
}

pub struct Registry {
    components: BTreeMap<String, ComponentEntry>,
    node_types: BTreeMap<String, Arc<NodeType>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// 只包含内置节点类型的注册表
    pub fn new() -> Self {
        let node_types = builtin_node_types()
            .into_iter()
            .map(|nt| (nt.name().to_string(), Arc::new(nt)))
            .collect();
        Self {
            components: BTreeMap::new(),
            node_types,
        }
    }

    pub fn register_component<F>(&mut self, type_name: &str, ctor: F) -> KernelResult<()>
    where
        F: Fn() -> Box<dyn ComponentBehavior> + Send + Sync + 'static,
    {
        if self.components.contains_key(type_name) {
            return Err(KernelError::NameInUse(type_name.to_string()));
        }
        debug!(type_name, "注册组件类型");
        self.components.insert(
            type_name.to_string(),
            ComponentEntry {
                ctor: Box::new(ctor),
            },
        );
        Ok(())
    }

    pub fn register_node_type(&mut self, node_type: NodeType) -> KernelResult<()> {
        if self.node_types.contains_key(node_type.name()) {
            return Err(KernelError::NameInUse(node_type.name().to_string()));
        }
        self.node_types
            .insert(node_type.name().to_string(), Arc::new(node_type));
        Ok(())
    }

    pub fn node_type(&self, name: &str) -> Option<Arc<NodeType>> {
        self.node_types.get(name).cloned()
    }

    pub fn has_component(&self, type_name: &str) -> bool {
        self.components.contains_key(type_name)
    }

    pub fn component_types(&self) -> impl Iterator<Item = &str> {
        self.components.keys().map(String::as_str)
    }

    pub fn node_type_names(&self) -> impl Iterator<Item = &str> {
        self.node_types.keys().map(String::as_str)
    }

    /// 创建并配置一个组件；未知类型得到占位组件
    pub fn create_component(&self, type_name: &str, messages: &MessageSink) -> Component {
        let behavior = match self.components.get(type_name) {
            Some(entry) => (entry.ctor)(),
            None => {
                warn!(type_name, "未注册的组件类型");
                messages.add(
                    crate::core::MessageKind::Error,
                    format!("Failed to create component of type: {type_name} (type is not registered)"),
                    "UnknownComponentType",
                );
                let (comp, _) =
                    Component::from_behavior(MISSING_COMPONENT, Box::new(MissingComponent), self);
                return comp;
            }
        };
        let (comp, errors) = Component::from_behavior(type_name, behavior, self);
        for e in errors {
            messages.error(format!("{type_name}: {e}"));
        }
        comp
    }
}

/// 未知类型的占位组件：没有端口，CQS 未定义，模型检查会拒绝它
#[derive(Debug, Default)]
pub struct MissingComponent;

impl Configurable for MissingComponent {
    fn cqs_role(&self) -> CqsRole {
        CqsRole::Undefined
    }

    fn configure(&mut self, _cfg: &mut Configurer<'_>) {}
}

impl Steppable for MissingComponent {
    fn initialize(&mut self, ctx: &mut InitContext<'_>) -> KernelResult<()> {
        Err(KernelError::Initialization(format!(
            "{} is a placeholder for a missing component type",
            ctx.name()
        )))
    }

    fn simulate_one_timestep(&mut self, _ctx: &StepContext<'_>) {}
}
