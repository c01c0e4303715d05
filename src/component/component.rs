//! 组件
//!
//! 叶子组件与子系统共用同一个结构体：CQS 角色是一个标签，行为是装箱的 trait 对象，
//! 子系统的额外状态放在 [`ComponentKind::System`] 里。

use std::time::Duration;

use crate::core::{ComponentId, Parameter, ParameterSet, Port, PortKind, PortRequirement};
use crate::system::SystemData;

use super::behavior::{ComponentBehavior, Configurer};
use super::registry::Registry;
use super::role::{ComponentState, CqsRole};

/// 可按名字查询端口的对象
pub trait PortOwning {
    fn port(&self, name: &str) -> Option<&Port>;

    fn port_index(&self, name: &str) -> Option<usize>;

    fn port_names(&self) -> Vec<&str>;
}

/// 叶子行为或子系统数据
pub enum ComponentKind {
    /// 仿真运行期间行为被移入执行计划，此时为 `None`
    Leaf(Option<Box<dyn ComponentBehavior>>),
    System(Box<SystemData>),
}

pub struct Component {
    pub(crate) name: String,
    pub(crate) type_name: String,
    pub(crate) cqs: CqsRole,
    pub(crate) state: ComponentState,
    pub(crate) ports: Vec<Option<Port>>,
    pub(crate) parameters: ParameterSet,
    pub(crate) parent: Option<ComponentId>,
    pub(crate) depth: usize,
    pub(crate) time: f64,
    pub(crate) timestep: f64,
    pub(crate) desired_timestep: f64,
    pub(crate) inherit_timestep: bool,
    pub(crate) disabled: bool,
    pub(crate) measured_time: Duration,
    pub(crate) breaks_loops: bool,
    pub(crate) kind: ComponentKind,
}

impl std::fmt::Debug for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Component")
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .field("cqs", &self.cqs)
            .field("state", &self.state)
            .field("is_system", &self.is_system())
            .finish()
    }
}

impl Component {
    fn blank(name: String, type_name: String, cqs: CqsRole, kind: ComponentKind) -> Self {
        Self {
            name,
            type_name,
            cqs,
            state: ComponentState::Unconfigured,
            ports: Vec::new(),
            parameters: ParameterSet::default(),
            parent: None,
            depth: 0,
            time: 0.0,
            timestep: 0.001,
            desired_timestep: 0.001,
            inherit_timestep: true,
            disabled: false,
            measured_time: Duration::ZERO,
            breaks_loops: false,
            kind,
        }
    }

    /// 用工厂产出的行为构造叶子组件并执行 `configure`；返回声明期间出现的问题
    pub(crate) fn from_behavior(
        type_name: &str,
        mut behavior: Box<dyn ComponentBehavior>,
        registry: &Registry,
    ) -> (Self, Vec<String>) {
        let role = behavior.cqs_role();
        let mut comp = Self::blank(type_name.to_string(), type_name.to_string(), role, ComponentKind::Leaf(None));
        let errors = {
            let mut cfg = Configurer {
                ports: &mut comp.ports,
                parameters: &mut comp.parameters,
                registry,
                role,
                breaks_loops: &mut comp.breaks_loops,
                errors: Vec::new(),
            };
            behavior.configure(&mut cfg);
            cfg.errors
        };
        comp.kind = ComponentKind::Leaf(Some(behavior));
        comp.state = ComponentState::Configured;
        (comp, errors)
    }

    /// 空的子系统
    pub(crate) fn new_system(name: &str) -> Self {
        let mut comp = Self::blank(
            name.to_string(),
            "Subsystem".to_string(),
            CqsRole::Undefined,
            ComponentKind::System(Box::default()),
        );
        comp.state = ComponentState::Configured;
        comp
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn cqs(&self) -> CqsRole {
        self.cqs
    }

    pub fn state(&self) -> ComponentState {
        self.state
    }

    pub fn parent(&self) -> Option<ComponentId> {
        self.parent
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn timestep(&self) -> f64 {
        self.timestep
    }

    pub fn desired_timestep(&self) -> f64 {
        self.desired_timestep
    }

    pub fn inherits_timestep(&self) -> bool {
        self.inherit_timestep
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn measured_time(&self) -> Duration {
        self.measured_time
    }

    pub fn breaks_algebraic_loops(&self) -> bool {
        self.breaks_loops
    }

    pub fn is_system(&self) -> bool {
        matches!(self.kind, ComponentKind::System(_))
    }

    pub fn parameters(&self) -> &ParameterSet {
        &self.parameters
    }

    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.get(name)
    }

    pub fn ports(&self) -> impl Iterator<Item = &Port> {
        self.ports.iter().flatten()
    }

    pub(crate) fn port_at(&self, idx: usize) -> Option<&Port> {
        self.ports.get(idx).and_then(Option::as_ref)
    }

    pub(crate) fn port_at_mut(&mut self, idx: usize) -> Option<&mut Port> {
        self.ports.get_mut(idx).and_then(Option::as_mut)
    }

    pub(crate) fn system(&self) -> Option<&SystemData> {
        match &self.kind {
            ComponentKind::System(s) => Some(s),
            ComponentKind::Leaf(_) => None,
        }
    }

    pub(crate) fn system_mut(&mut self) -> Option<&mut SystemData> {
        match &mut self.kind {
            ComponentKind::System(s) => Some(s),
            ComponentKind::Leaf(_) => None,
        }
    }

    /// 追加一个空白系统端口，返回其下标
    pub(crate) fn push_system_port(&mut self, name: &str, requirement: PortRequirement) -> usize {
        self.ports
            .push(Some(Port::new(name, PortKind::System, None, requirement)));
        self.ports.len() - 1
    }
}

impl PortOwning for Component {
    fn port(&self, name: &str) -> Option<&Port> {
        self.ports.iter().flatten().find(|p| p.name() == name)
    }

    fn port_index(&self, name: &str) -> Option<usize> {
        self.ports
            .iter()
            .position(|p| p.as_ref().is_some_and(|p| p.name() == name))
    }

    fn port_names(&self) -> Vec<&str> {
        self.ports.iter().flatten().map(Port::name).collect()
    }
}
