//! 端口
//!
//! 端口是组件读写节点的类型化句柄。非多端口在所属组件进入系统后始终绑定恰好一个节点
//! （未连接时是系统为它创建的哑节点）；多端口拥有一组动态增减的子端口，每个子端口独立连接。

use serde::{Deserialize, Serialize};

use super::id::{NodeId, PortRef, SubPortId};

/// 端口种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortKind {
    Power,
    Read,
    Write,
    System,
    PowerMulti,
    ReadMulti,
}

impl PortKind {
    pub fn is_multi(self) -> bool {
        matches!(self, PortKind::PowerMulti | PortKind::ReadMulti)
    }

    /// 多端口的子端口种类；非多端口返回自身
    pub fn sub_kind(self) -> PortKind {
        match self {
            PortKind::PowerMulti => PortKind::Power,
            PortKind::ReadMulti => PortKind::Read,
            other => other,
        }
    }

    pub fn is_power(self) -> bool {
        matches!(self, PortKind::Power | PortKind::PowerMulti)
    }

    pub fn is_read(self) -> bool {
        matches!(self, PortKind::Read | PortKind::ReadMulti)
    }
}

/// 端口是否必须连接
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortRequirement {
    Required,
    NotRequired,
}

/// 信号排序提示
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortHint {
    #[default]
    None,
    Source,
    Destination,
}

/// 端口（或子端口）的连接状态：绑定的节点与直接相连的端口
#[derive(Debug, Clone, Default)]
pub struct PortLink {
    pub(crate) node: Option<NodeId>,
    pub(crate) connected: Vec<PortRef>,
}

impl PortLink {
    pub fn node(&self) -> Option<NodeId> {
        self.node
    }

    pub fn connected(&self) -> &[PortRef] {
        &self.connected
    }

    pub fn is_connected(&self) -> bool {
        !self.connected.is_empty()
    }

    pub(crate) fn link(&mut self, other: PortRef) {
        if !self.connected.contains(&other) {
            self.connected.push(other);
        }
    }

    pub(crate) fn unlink(&mut self, other: PortRef) -> bool {
        let before = self.connected.len();
        self.connected.retain(|p| *p != other);
        before != self.connected.len()
    }
}

/// 多端口中的子端口
#[derive(Debug, Clone)]
pub struct SubPort {
    pub(crate) id: SubPortId,
    pub(crate) link: PortLink,
}

impl SubPort {
    pub fn id(&self) -> SubPortId {
        self.id
    }

    pub fn link(&self) -> &PortLink {
        &self.link
    }
}

/// 端口
#[derive(Debug, Clone)]
pub struct Port {
    name: String,
    description: String,
    kind: PortKind,
    node_type: Option<String>,
    requirement: PortRequirement,
    sort_hint: SortHint,
    pub(crate) link: PortLink,
    pub(crate) subports: Vec<SubPort>,
    next_sub: u32,
    start_values: Option<Vec<f64>>,
    enable_log: bool,
}

impl Port {
    /// `node_type` 为 `None` 表示尚未确定类型的空白系统端口
    pub fn new(
        name: impl Into<String>,
        kind: PortKind,
        node_type: Option<String>,
        requirement: PortRequirement,
    ) -> Self {
        let sort_hint = match kind {
            PortKind::Read | PortKind::ReadMulti => SortHint::Destination,
            PortKind::Write => SortHint::Source,
            _ => SortHint::None,
        };
        Self {
            name: name.into(),
            description: String::new(),
            kind,
            node_type,
            requirement,
            sort_hint,
            link: PortLink::default(),
            subports: Vec::new(),
            next_sub: 0,
            start_values: None,
            enable_log: !kind.is_multi(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    pub fn kind(&self) -> PortKind {
        self.kind
    }

    pub fn node_type(&self) -> Option<&str> {
        self.node_type.as_deref()
    }

    pub(crate) fn set_node_type(&mut self, node_type: Option<String>) {
        self.node_type = node_type;
    }

    pub fn requirement(&self) -> PortRequirement {
        self.requirement
    }

    pub fn is_required(&self) -> bool {
        self.requirement == PortRequirement::Required
    }

    pub fn sort_hint(&self) -> SortHint {
        self.sort_hint
    }

    pub fn is_logging_enabled(&self) -> bool {
        self.enable_log
    }

    pub fn set_logging_enabled(&mut self, enable: bool) {
        self.enable_log = enable && !self.kind.is_multi();
    }

    /// 非多端口的连接状态
    pub fn link(&self) -> &PortLink {
        &self.link
    }

    /// 非多端口绑定的节点；多端口返回 `None`
    pub fn node(&self) -> Option<NodeId> {
        if self.kind.is_multi() {
            None
        } else {
            self.link.node
        }
    }

    pub fn is_connected(&self) -> bool {
        if self.kind.is_multi() {
            self.subports.iter().any(|s| s.link.is_connected())
        } else {
            self.link.is_connected()
        }
    }

    /// 与之直接相连的全部端点（多端口则汇总所有子端口）
    pub fn connected_ports(&self) -> Vec<PortRef> {
        if self.kind.is_multi() {
            self.subports
                .iter()
                .flat_map(|s| s.link.connected.iter().copied())
                .collect()
        } else {
            self.link.connected.clone()
        }
    }

    /// 多端口的子端口数；普通端口恒为 1
    pub fn num_ports(&self) -> usize {
        if self.kind.is_multi() {
            self.subports.len()
        } else {
            1
        }
    }

    pub fn sub_ports(&self) -> &[SubPort] {
        &self.subports
    }

    pub fn sub_port(&self, id: SubPortId) -> Option<&SubPort> {
        self.subports.iter().find(|s| s.id == id)
    }

    pub fn sub_port_position(&self, id: SubPortId) -> Option<usize> {
        self.subports.iter().position(|s| s.id == id)
    }

    /// 追加一个新的子端口；节点由所属系统随后绑定
    pub fn add_sub_port(&mut self) -> SubPortId {
        let id = SubPortId(self.next_sub);
        self.next_sub += 1;
        self.subports.push(SubPort {
            id,
            link: PortLink::default(),
        });
        id
    }

    pub fn remove_sub_port(&mut self, id: SubPortId) -> Option<SubPort> {
        let pos = self.sub_port_position(id)?;
        Some(self.subports.remove(pos))
    }

    /// 取端点的连接状态：`None` 指端口本身
    pub(crate) fn link_of(&self, sub: Option<SubPortId>) -> Option<&PortLink> {
        match sub {
            None if !self.kind.is_multi() => Some(&self.link),
            None => None,
            Some(id) => self.sub_port(id).map(|s| &s.link),
        }
    }

    pub(crate) fn link_of_mut(&mut self, sub: Option<SubPortId>) -> Option<&mut PortLink> {
        match sub {
            None if !self.kind.is_multi() => Some(&mut self.link),
            None => None,
            Some(id) => self
                .subports
                .iter_mut()
                .find(|s| s.id == id)
                .map(|s| &mut s.link),
        }
    }

    /// 启用起始值容器（长度等于节点槽位数）
    pub(crate) fn enable_start_values(&mut self, defaults: &[f64]) {
        self.start_values = Some(defaults.to_vec());
    }

    pub fn has_start_values(&self) -> bool {
        self.start_values.is_some()
    }

    pub fn start_values(&self) -> Option<&[f64]> {
        self.start_values.as_deref()
    }

    pub fn start_value(&self, slot: usize) -> Option<f64> {
        self.start_values.as_ref().and_then(|v| v.get(slot).copied())
    }

    /// 设置起始值；端口没有起始值容器或槽位越界时返回 `false`
    pub fn set_start_value(&mut self, slot: usize, value: f64) -> bool {
        match self.start_values.as_mut().and_then(|v| v.get_mut(slot)) {
            Some(v) => {
                *v = value;
                true
            }
            None => false,
        }
    }
}
