//! 模型：顶层系统及其组件、节点竞技场
//!
//! 组件与节点分别存放在 `Vec<Option<..>>` 竞技场中，用 [`ComponentId`] / [`NodeId`] 寻址。
//! 根系统固定是 `ComponentId(0)`。子系统也是组件，只是携带一份 [`SystemData`]。

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::component::{Component, ComponentState, PortOwning, Registry};
use crate::core::{
    CancellationToken, ComponentId, KernelError, KernelResult, MessageHandler, MessageSink, Node,
    NodeId, NodeType, Port, PortId, PortLink, PortRef,
};
use crate::sched::Partition;

use super::alias::AliasHandler;
use super::logging::LogSettings;

/// 子系统独有的状态
#[derive(Debug, Default)]
pub struct SystemData {
    pub(crate) children: BTreeMap<String, ComponentId>,
    pub(crate) signal: Vec<ComponentId>,
    pub(crate) c: Vec<ComponentId>,
    pub(crate) q: Vec<ComponentId>,
    pub(crate) undefined: Vec<ComponentId>,
    pub(crate) sub_nodes: Vec<NodeId>,
    pub(crate) aliases: AliasHandler,
    pub(crate) log: LogSettings,
    pub(crate) time_log: Vec<f64>,
    pub(crate) keep_start_values: bool,
    pub(crate) total_taken_steps: u64,
}

impl SystemData {
    pub fn children(&self) -> impl Iterator<Item = (&str, ComponentId)> {
        self.children.iter().map(|(n, id)| (n.as_str(), *id))
    }

    pub fn signal_components(&self) -> &[ComponentId] {
        &self.signal
    }

    pub fn c_components(&self) -> &[ComponentId] {
        &self.c
    }

    pub fn q_components(&self) -> &[ComponentId] {
        &self.q
    }

    pub fn undefined_components(&self) -> &[ComponentId] {
        &self.undefined
    }

    pub fn sub_nodes(&self) -> &[NodeId] {
        &self.sub_nodes
    }

    pub fn aliases(&self) -> &AliasHandler {
        &self.aliases
    }

    pub fn total_taken_steps(&self) -> u64 {
        self.total_taken_steps
    }

    pub fn keeps_values_as_start_values(&self) -> bool {
        self.keep_start_values
    }

    pub(crate) fn role_vectors_mut(&mut self) -> [&mut Vec<ComponentId>; 4] {
        [
            &mut self.signal,
            &mut self.c,
            &mut self.q,
            &mut self.undefined,
        ]
    }
}

/// 仿真模型
pub struct Model {
    pub(crate) components: Vec<Option<Component>>,
    pub(crate) nodes: Vec<Option<Node>>,
    /// 空出的节点槽位，分配时优先复用
    free_nodes: Vec<usize>,
    pub(crate) registry: Arc<Registry>,
    pub(crate) handler: MessageHandler,
    pub(crate) messages: MessageSink,
    pub(crate) cancel: CancellationToken,
    pub(crate) start_time: f64,
    pub(crate) stop_time: f64,
    pub(crate) partition: Option<Partition>,
}

impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("name", &self.name())
            .field("components", &self.num_components())
            .field("nodes", &self.num_nodes())
            .finish()
    }
}

impl Model {
    /// 根系统的组件编号
    pub const ROOT: ComponentId = ComponentId(0);

    pub fn new(name: &str, registry: Arc<Registry>) -> Self {
        let handler = MessageHandler::default();
        let messages = handler.sink();
        let mut root = Component::new_system(name);
        root.parent = None;
        root.depth = 0;
        Self {
            components: vec![Some(root)],
            nodes: Vec::new(),
            free_nodes: Vec::new(),
            registry,
            handler,
            messages,
            cancel: CancellationToken::new(),
            start_time: 0.0,
            stop_time: 0.0,
            partition: None,
        }
    }

    pub fn root(&self) -> ComponentId {
        Self::ROOT
    }

    pub fn name(&self) -> &str {
        self.components
            .first()
            .and_then(Option::as_ref)
            .map(Component::name)
            .unwrap_or_default()
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// 宿主消费消息用的句柄
    pub fn messages(&self) -> &MessageHandler {
        &self.handler
    }

    pub fn message_sink(&self) -> MessageSink {
        self.messages.clone()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    pub fn stop_time(&self) -> f64 {
        self.stop_time
    }

    pub fn component(&self, id: ComponentId) -> Option<&Component> {
        self.components.get(id.0).and_then(Option::as_ref)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0).and_then(Option::as_mut)
    }

    /// 存活组件数（含根系统）
    pub fn num_components(&self) -> usize {
        self.components.iter().flatten().count()
    }

    /// 存活节点数
    pub fn num_nodes(&self) -> usize {
        self.nodes.iter().flatten().count()
    }

    pub fn system_data(&self, system: ComponentId) -> Option<&SystemData> {
        self.component(system).and_then(Component::system)
    }

    /// 在系统里按名字找直接子组件
    pub fn sub_component(&self, system: ComponentId, name: &str) -> Option<ComponentId> {
        self.system_data(system)
            .and_then(|s| s.children.get(name).copied())
    }

    /// 按点分路径（`Sub.Inner.Comp`）从根系统开始查找组件
    pub fn find_component(&self, path: &str) -> Option<ComponentId> {
        path.split('.')
            .try_fold(Self::ROOT, |sys, name| self.sub_component(sys, name))
    }

    /// `find_component` 的逆操作；根系统本身得到空串
    pub fn component_path(&self, id: ComponentId) -> String {
        let mut names = Vec::new();
        let mut cur = Some(id);
        while let Some(c) = cur.filter(|c| *c != Self::ROOT).and_then(|c| self.component(c)) {
            names.push(c.name());
            cur = c.parent();
        }
        names.reverse();
        names.join(".")
    }

    pub fn port_id(&self, comp: ComponentId, port: &str) -> KernelResult<PortId> {
        let c = self.comp(comp)?;
        let index = c.port_index(port).ok_or_else(|| KernelError::UnknownPort {
            component: c.name().to_string(),
            port: port.to_string(),
        })?;
        Ok(PortId::new(comp, index))
    }

    pub fn port(&self, comp: ComponentId, port: &str) -> Option<&Port> {
        self.component(comp).and_then(|c| c.port(port))
    }

    /// 非多端口当前绑定的节点
    pub fn node_of_port(&self, comp: ComponentId, port: &str) -> Option<NodeId> {
        self.port(comp, port).and_then(Port::node)
    }

    /// 未绑定节点时返回 `None`
    pub fn read_node_safe(&self, comp: ComponentId, port: &str, slot: usize) -> Option<f64> {
        let node = self.node(self.node_of_port(comp, port)?)?;
        (slot < node.num_slots()).then(|| node.data_value(slot))
    }

    /// 未绑定节点时什么都不做，返回是否写入
    pub fn write_node_safe(&self, comp: ComponentId, port: &str, slot: usize, value: f64) -> bool {
        let Some(node) = self.node_of_port(comp, port).and_then(|n| self.node(n)) else {
            return false;
        };
        if slot >= node.num_slots() {
            return false;
        }
        node.set_data_value(slot, value);
        true
    }

    // ---- 内部辅助 ----

    pub(crate) fn comp(&self, id: ComponentId) -> KernelResult<&Component> {
        self.component(id)
            .ok_or_else(|| KernelError::UnknownComponent(format!("#{}", id.0)))
    }

    pub(crate) fn comp_mut(&mut self, id: ComponentId) -> KernelResult<&mut Component> {
        self.components
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or_else(|| KernelError::UnknownComponent(format!("#{}", id.0)))
    }

    pub(crate) fn sys(&self, id: ComponentId) -> KernelResult<&SystemData> {
        let c = self.comp(id)?;
        c.system()
            .ok_or_else(|| KernelError::UnknownComponent(format!("`{}` is not a system", c.name())))
    }

    pub(crate) fn sys_mut(&mut self, id: ComponentId) -> KernelResult<&mut SystemData> {
        let c = self.comp_mut(id)?;
        let name = c.name.clone();
        c.system_mut()
            .ok_or_else(|| KernelError::UnknownComponent(format!("`{name}` is not a system")))
    }

    pub(crate) fn port_by_id(&self, id: PortId) -> KernelResult<&Port> {
        let c = self.comp(id.component)?;
        c.port_at(id.index).ok_or_else(|| KernelError::UnknownPort {
            component: c.name().to_string(),
            port: format!("#{}", id.index),
        })
    }

    pub(crate) fn port_by_id_mut(&mut self, id: PortId) -> KernelResult<&mut Port> {
        let c = self.comp_mut(id.component)?;
        let name = c.name.clone();
        c.port_at_mut(id.index).ok_or(KernelError::UnknownPort {
            component: name,
            port: format!("#{}", id.index),
        })
    }

    pub(crate) fn link(&self, r: PortRef) -> Option<&PortLink> {
        self.port_by_id(r.port).ok()?.link_of(r.sub)
    }

    pub(crate) fn link_mut(&mut self, r: PortRef) -> Option<&mut PortLink> {
        self.port_by_id_mut(r.port).ok()?.link_of_mut(r.sub)
    }

    pub(crate) fn node_of_ref(&self, r: PortRef) -> Option<NodeId> {
        self.link(r).and_then(PortLink::node)
    }

    /// `Comp.port` 形式的端点名，用于消息
    pub(crate) fn port_label(&self, r: PortRef) -> String {
        let comp = self
            .component(r.component())
            .map(Component::name)
            .unwrap_or("?");
        let port = self
            .port_by_id(r.port)
            .map(Port::name)
            .unwrap_or("?");
        match r.sub {
            Some(s) => format!("{comp}.{port}#{}", s.0),
            None => format!("{comp}.{port}"),
        }
    }

    /// 在 `owner` 系统下新建一个节点
    pub(crate) fn alloc_node(&mut self, node_type: Arc<NodeType>, owner: ComponentId) -> NodeId {
        let node = Some(Node::new(node_type, owner));
        let id = match self.free_nodes.pop() {
            Some(slot) => {
                self.nodes[slot] = node;
                NodeId(slot)
            }
            None => {
                self.nodes.push(node);
                NodeId(self.nodes.len() - 1)
            }
        };
        if let Ok(sys) = self.sys_mut(owner) {
            sys.sub_nodes.push(id);
        }
        id
    }

    /// 移除节点并从所属系统的节点表里摘掉
    pub(crate) fn free_node(&mut self, id: NodeId) -> Option<Node> {
        let node = self.nodes.get_mut(id.0)?.take()?;
        self.free_nodes.push(id.0);
        if let Ok(sys) = self.sys_mut(node.owner()) {
            sys.sub_nodes.retain(|n| *n != id);
        }
        Some(node)
    }

    /// 把端点绑定到节点并在节点上登记
    pub(crate) fn bind(&mut self, r: PortRef, node: NodeId) {
        let kind = match self.port_by_id(r.port) {
            Ok(p) => p.kind().sub_kind(),
            Err(_) => return,
        };
        if let Some(link) = self.link_mut(r) {
            link.node = Some(node);
        }
        if let Some(n) = self.node_mut(node) {
            n.attach(r, kind);
        }
    }

    /// 为端点新建一个私有哑节点
    pub(crate) fn create_dummy_node(&mut self, r: PortRef, owner: ComponentId) -> KernelResult<NodeId> {
        let type_name = self
            .port_by_id(r.port)?
            .node_type()
            .map(str::to_string)
            .ok_or_else(|| KernelError::InvalidConnection(format!(
                "{} has no node type",
                self.port_label(r)
            )))?;
        let nt = self
            .registry
            .node_type(&type_name)
            .ok_or(KernelError::UnknownNodeType(type_name))?;
        let id = self.alloc_node(nt, owner);
        self.bind(r, id);
        Ok(id)
    }

    /// 所有未被占位的组件编号
    pub(crate) fn component_ids(&self) -> Vec<ComponentId> {
        self.components
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.as_ref().map(|_| ComponentId(i)))
            .collect()
    }

    /// 系统的直接子组件（按名字顺序）
    pub(crate) fn children_of(&self, system: ComponentId) -> Vec<ComponentId> {
        self.system_data(system)
            .map(|s| s.children.values().copied().collect())
            .unwrap_or_default()
    }

    /// 从某个组件向上一直到根的系统链（含自身，如果自身是系统）
    pub(crate) fn system_chain(&self, mut id: ComponentId) -> Vec<ComponentId> {
        let mut chain = Vec::new();
        if !self.component(id).is_some_and(Component::is_system) {
            match self.component(id).and_then(Component::parent) {
                Some(p) => id = p,
                None => return chain,
            }
        }
        chain.push(id);
        while let Some(p) = self.component(id).and_then(Component::parent) {
            chain.push(p);
            id = p;
        }
        chain
    }

    pub(crate) fn ensure_editable(&self, op: &'static str) -> KernelResult<()> {
        let state = self.comp(Self::ROOT)?.state;
        if state.is_editable() {
            Ok(())
        } else {
            Err(KernelError::InvalidState {
                op,
                state: state.to_string(),
            })
        }
    }

    /// 失败时把错误排入消息队列
    pub(crate) fn reported<T>(&self, result: KernelResult<T>) -> KernelResult<T> {
        if let Err(e) = &result {
            self.messages
                .add(crate::core::MessageKind::Error, e.to_string(), "");
        }
        result
    }

    pub fn state(&self) -> ComponentState {
        self.components
            .first()
            .and_then(Option::as_ref)
            .map(Component::state)
            .unwrap_or(ComponentState::Unconfigured)
    }
}
