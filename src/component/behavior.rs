//! 组件行为契约
//!
//! 组件库只需实现 [`Configurable`] 与 [`Steppable`]：
//! - `configure` 在工厂创建组件时调用一次，声明端口、参数与常量；
//! - `initialize` 通过 [`InitContext`] 解析节点数据句柄、读取已求值参数；
//! - `simulate_one_timestep` 在热循环中只通过缓存的 [`DataPtr`] 读写节点。
//!
//! 运行期错误通过 [`StepContext`] 报告并请求中止，绝不跨越调度器边界 panic。

use std::sync::Arc;

use crate::core::{
    CancellationToken, DataPtr, KernelError, KernelResult, MessageKind, MessageSink, Node,
    Parameter, ParameterSet, ParameterValue, Port, PortKind, PortRequirement,
};

use super::registry::Registry;
use super::role::CqsRole;

/// 组件端口句柄（组件端口表中的下标），由 [`Configurer`] 发放
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PortHandle(pub usize);

/// 声明期能力：端口、参数与常量
pub trait Configurable {
    /// 组件的 CQS 角色，在 `configure` 之前读取
    fn cqs_role(&self) -> CqsRole;

    fn configure(&mut self, cfg: &mut Configurer<'_>);
}

/// 运行期能力
pub trait Steppable: Send {
    fn initialize(&mut self, ctx: &mut InitContext<'_>) -> KernelResult<()>;

    fn simulate_one_timestep(&mut self, ctx: &StepContext<'_>);

    fn finalize(&mut self) {}
}

/// 工厂产出的完整组件行为
pub trait ComponentBehavior: Configurable + Steppable {}

impl<T: Configurable + Steppable> ComponentBehavior for T {}

/// `configure` 期间使用的声明接口
pub struct Configurer<'a> {
    pub(crate) ports: &'a mut Vec<Option<Port>>,
    pub(crate) parameters: &'a mut ParameterSet,
    pub(crate) registry: &'a Registry,
    pub(crate) role: CqsRole,
    pub(crate) breaks_loops: &'a mut bool,
    pub(crate) errors: Vec<String>,
}

impl Configurer<'_> {
    fn unique_port_name(&self, desired: &str) -> String {
        let taken = |n: &str| self.ports.iter().flatten().any(|p| p.name() == n);
        if !taken(desired) {
            return desired.to_string();
        }
        (1..)
            .map(|i| format!("{desired}_{i}"))
            .find(|n| !taken(n))
            .unwrap_or_else(|| desired.to_string())
    }

    fn add_port(
        &mut self,
        name: &str,
        kind: PortKind,
        node_type: &str,
        requirement: PortRequirement,
    ) -> PortHandle {
        let name = self.unique_port_name(name);
        let mut port = Port::new(name, kind, Some(node_type.to_string()), requirement);
        match self.registry.node_type(node_type) {
            Some(nt) => {
                let wants_start_values = match kind {
                    PortKind::Read | PortKind::Write => true,
                    PortKind::Power | PortKind::PowerMulti => self.role == CqsRole::C,
                    _ => false,
                };
                if wants_start_values {
                    port.enable_start_values(nt.defaults());
                }
            }
            None => self
                .errors
                .push(format!("unknown node type `{node_type}` for port `{}`", port.name())),
        }
        let idx = self.ports.len();
        self.ports.push(Some(port));
        PortHandle(idx)
    }

    pub fn add_power_port(&mut self, name: &str, node_type: &str) -> PortHandle {
        self.add_port(name, PortKind::Power, node_type, PortRequirement::Required)
    }

    pub fn add_power_port_with(
        &mut self,
        name: &str,
        node_type: &str,
        requirement: PortRequirement,
    ) -> PortHandle {
        self.add_port(name, PortKind::Power, node_type, requirement)
    }

    pub fn add_read_port(
        &mut self,
        name: &str,
        node_type: &str,
        requirement: PortRequirement,
    ) -> PortHandle {
        self.add_port(name, PortKind::Read, node_type, requirement)
    }

    pub fn add_write_port(
        &mut self,
        name: &str,
        node_type: &str,
        requirement: PortRequirement,
    ) -> PortHandle {
        self.add_port(name, PortKind::Write, node_type, requirement)
    }

    pub fn add_power_multiport(
        &mut self,
        name: &str,
        node_type: &str,
        requirement: PortRequirement,
    ) -> PortHandle {
        self.add_port(name, PortKind::PowerMulti, node_type, requirement)
    }

    pub fn add_read_multiport(
        &mut self,
        name: &str,
        node_type: &str,
        requirement: PortRequirement,
    ) -> PortHandle {
        self.add_port(name, PortKind::ReadMulti, node_type, requirement)
    }

    /// 信号输入：未连接时由起始值充当常数输入
    pub fn add_input_variable(&mut self, name: &str, description: &str, default: f64) -> PortHandle {
        let h = self.add_read_port(name, crate::core::node_types::NODE_SIGNAL, PortRequirement::NotRequired);
        if let Some(Some(p)) = self.ports.get_mut(h.0) {
            p.set_description(description);
            p.set_start_value(crate::core::node_types::signal::VALUE, default);
        }
        h
    }

    /// 信号输出
    pub fn add_output_variable(&mut self, name: &str, description: &str) -> PortHandle {
        let h = self.add_write_port(name, crate::core::node_types::NODE_SIGNAL, PortRequirement::NotRequired);
        if let Some(Some(p)) = self.ports.get_mut(h.0) {
            p.set_description(description);
        }
        h
    }

    pub fn add_parameter(
        &mut self,
        name: &str,
        description: &str,
        unit: &str,
        default: impl Into<ParameterValue>,
    ) {
        if let Err(e) = self
            .parameters
            .add(Parameter::new(name, description, unit, default.into()))
        {
            self.errors.push(e.to_string());
        }
    }

    pub fn add_constant(
        &mut self,
        name: &str,
        description: &str,
        unit: &str,
        value: impl Into<ParameterValue>,
    ) {
        if let Err(e) = self
            .parameters
            .add(Parameter::new(name, description, unit, value.into()).as_constant())
        {
            self.errors.push(e.to_string());
        }
    }

    pub fn add_conditional_parameter(
        &mut self,
        name: &str,
        description: &str,
        choices: &[&str],
        default: i64,
    ) {
        let choices = choices.iter().map(|c| c.to_string()).collect();
        if let Err(e) = self
            .parameters
            .add(Parameter::conditional(name, description, choices, default))
        {
            self.errors.push(e.to_string());
        }
    }

    /// 设置端口起始值的默认值
    pub fn set_default_start_value(&mut self, port: PortHandle, slot: usize, value: f64) {
        if let Some(Some(p)) = self.ports.get_mut(port.0) {
            p.set_start_value(slot, value);
        }
    }

    /// 该组件的输出不在同一步内依赖输入（单位延迟），可以打断信号代数环
    pub fn set_breaks_algebraic_loops(&mut self) {
        *self.breaks_loops = true;
    }

    pub fn role(&self) -> CqsRole {
        self.role
    }
}

/// `initialize` 期间使用的上下文
pub struct InitContext<'a> {
    pub(crate) name: &'a str,
    pub(crate) ports: &'a [Option<Port>],
    pub(crate) nodes: &'a [Option<Node>],
    pub(crate) parameters: &'a ParameterSet,
    pub(crate) start_time: f64,
    pub(crate) stop_time: f64,
    pub(crate) timestep: f64,
    pub(crate) messages: &'a MessageSink,
}

impl InitContext<'_> {
    fn port(&self, h: PortHandle) -> KernelResult<&Port> {
        self.ports
            .get(h.0)
            .and_then(Option::as_ref)
            .ok_or_else(|| KernelError::UnknownPort {
                component: self.name.to_string(),
                port: format!("#{}", h.0),
            })
    }

    fn ptr_for(&self, port: &Port, node: Option<crate::core::NodeId>, slot: usize) -> KernelResult<DataPtr> {
        node.and_then(|n| self.nodes.get(n.0))
            .and_then(Option::as_ref)
            .and_then(|n| n.data_ptr(slot))
            .ok_or_else(|| {
                KernelError::Initialization(format!(
                    "{}: port `{}` has no node data for slot {slot}",
                    self.name,
                    port.name()
                ))
            })
    }

    /// 解析普通端口的节点数据句柄
    pub fn data_ptr(&self, h: PortHandle, slot: usize) -> KernelResult<DataPtr> {
        let port = self.port(h)?;
        self.ptr_for(port, port.node(), slot)
    }

    /// 解析多端口所有子端口的数据句柄（按子端口顺序）
    pub fn sub_data_ptrs(&self, h: PortHandle, slot: usize) -> KernelResult<Vec<DataPtr>> {
        let port = self.port(h)?;
        port.sub_ports()
            .iter()
            .map(|s| self.ptr_for(port, s.link().node(), slot))
            .collect()
    }

    pub fn num_ports(&self, h: PortHandle) -> usize {
        self.port(h).map(Port::num_ports).unwrap_or(0)
    }

    pub fn is_connected(&self, h: PortHandle) -> bool {
        self.port(h).map(Port::is_connected).unwrap_or(false)
    }

    fn param(&self, name: &str) -> KernelResult<&ParameterValue> {
        self.parameters
            .get(name)
            .and_then(Parameter::evaluated)
            .ok_or_else(|| KernelError::Parameter {
                name: name.to_string(),
                reason: format!("not evaluated in `{}`", self.name),
            })
    }

    pub fn param_f64(&self, name: &str) -> KernelResult<f64> {
        self.param(name)?.as_f64().ok_or_else(|| KernelError::Parameter {
            name: name.to_string(),
            reason: "not numeric".to_string(),
        })
    }

    pub fn param_i64(&self, name: &str) -> KernelResult<i64> {
        self.param(name)?.as_i64().ok_or_else(|| KernelError::Parameter {
            name: name.to_string(),
            reason: "not an integer".to_string(),
        })
    }

    pub fn param_bool(&self, name: &str) -> KernelResult<bool> {
        self.param(name)?.as_bool().ok_or_else(|| KernelError::Parameter {
            name: name.to_string(),
            reason: "not a bool".to_string(),
        })
    }

    pub fn param_str(&self, name: &str) -> KernelResult<String> {
        let v = self.param(name)?;
        Ok(v.as_str().map(str::to_string).unwrap_or_else(|| format!("{v:?}")))
    }

    pub fn name(&self) -> &str {
        self.name
    }

    pub fn timestep(&self) -> f64 {
        self.timestep
    }

    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    pub fn stop_time(&self) -> f64 {
        self.stop_time
    }

    pub fn warning(&self, text: impl AsRef<str>) {
        self.messages
            .add(MessageKind::Warning, format!("{}: {}", self.name, text.as_ref()), self.name);
    }

    pub fn error(&self, text: impl AsRef<str>) {
        self.messages
            .add(MessageKind::Error, format!("{}: {}", self.name, text.as_ref()), self.name);
    }
}

/// 每个时间步传给组件的上下文
pub struct StepContext<'a> {
    pub(crate) name: &'a Arc<str>,
    pub(crate) time: f64,
    pub(crate) timestep: f64,
    pub(crate) messages: &'a MessageSink,
    pub(crate) cancel: &'a CancellationToken,
}

impl StepContext<'_> {
    /// 当前步的仿真时间（已经推进过）
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn timestep(&self) -> f64 {
        self.timestep
    }

    pub fn name(&self) -> &str {
        self.name
    }

    pub fn warning(&self, text: impl AsRef<str>) {
        self.messages.add(
            MessageKind::Warning,
            format!("{}: {}", self.name, text.as_ref()),
            self.name.as_ref(),
        );
    }

    pub fn error(&self, text: impl AsRef<str>) {
        self.messages.add(
            MessageKind::Error,
            format!("{}: {}", self.name, text.as_ref()),
            self.name.as_ref(),
        );
    }

    /// 请求整个模型在下一个屏障处停止
    pub fn stop_simulation(&self, reason: impl AsRef<str>) {
        let reason = format!("{}: {}", self.name, reason.as_ref());
        if self.cancel.cancel(reason.clone()) {
            self.messages.add(
                MessageKind::Info,
                format!("Simulation was stopped at t={}: {reason}", self.time),
                "StopSimulation",
            );
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
