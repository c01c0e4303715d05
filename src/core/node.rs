//! 节点
//!
//! 节点是一个物理连接点上的共享数据缓冲区（例如液压连接处的压力、流量、波变量与特征阻抗）。
//! 数值数组以原子单元保存，组件在 `initialize` 时解析出 [`DataPtr`]，之后每步按 O(1) 句柄读写，
//! 不需要加锁；阶段之间的屏障负责建立 happens-before 关系。

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use super::id::{ComponentId, PortRef};
use super::port::PortKind;

/// 数据槽的语义角色，供 TLM 耦合律与下游工具使用
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeDataRole {
    Flow,
    Intensity,
    Tlm,
    Hidden,
    Default,
}

/// 单个数据槽的描述
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataDescription {
    pub name: String,
    pub short_name: String,
    pub unit: String,
    pub role: NodeDataRole,
}

/// 节点类型：有序的数据槽描述与默认值
///
/// 注册后不可变，通过 `Arc` 在节点之间共享。
#[derive(Debug, Clone, PartialEq)]
pub struct NodeType {
    name: String,
    slots: Vec<DataDescription>,
    defaults: Vec<f64>,
}

impl NodeType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slots: Vec::new(),
            defaults: Vec::new(),
        }
    }

    /// 设置第 `slot` 个数据槽的特征；只在构造节点类型时调用
    pub fn set_data_characteristics(
        &mut self,
        slot: usize,
        name: &str,
        short_name: &str,
        unit: &str,
        role: NodeDataRole,
    ) {
        if self.slots.len() <= slot {
            self.slots.resize(
                slot + 1,
                DataDescription {
                    name: String::new(),
                    short_name: String::new(),
                    unit: String::new(),
                    role: NodeDataRole::Default,
                },
            );
            self.defaults.resize(slot + 1, 0.0);
        }
        self.slots[slot] = DataDescription {
            name: name.to_string(),
            short_name: short_name.to_string(),
            unit: unit.to_string(),
            role,
        };
    }

    /// 构造器风格：追加一个数据槽
    pub fn with_slot(mut self, name: &str, short_name: &str, unit: &str, role: NodeDataRole) -> Self {
        let slot = self.slots.len();
        self.set_data_characteristics(slot, name, short_name, unit, role);
        self
    }

    /// 构造器风格：设置某个槽的默认值（按名字查找，找不到则忽略）
    pub fn with_default(mut self, slot_name: &str, value: f64) -> Self {
        if let Some(idx) = self.data_id_from_name(slot_name) {
            self.defaults[idx] = value;
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn slots(&self) -> &[DataDescription] {
        &self.slots
    }

    pub fn num_slots(&self) -> usize {
        self.slots.len()
    }

    pub fn defaults(&self) -> &[f64] {
        &self.defaults
    }

    /// 按名字或短名查找槽位下标
    pub fn data_id_from_name(&self, name: &str) -> Option<usize> {
        self.slots
            .iter()
            .position(|d| d.name == name)
            .or_else(|| self.slots.iter().position(|d| d.short_name == name))
    }
}

/// 以位模式保存 f64 的原子单元
#[derive(Debug, Default)]
pub struct ValueCell(AtomicU64);

impl ValueCell {
    pub fn new(v: f64) -> Self {
        Self(AtomicU64::new(v.to_bits()))
    }

    #[inline]
    pub fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn set(&self, v: f64) {
        self.0.store(v.to_bits(), Ordering::Relaxed);
    }
}

/// 节点数值缓冲区，在节点与已解析的数据句柄之间共享
pub type NodeBuffer = Arc<[ValueCell]>;

fn make_buffer(values: &[f64]) -> NodeBuffer {
    values.iter().map(|v| ValueCell::new(*v)).collect::<Vec<_>>().into()
}

/// 已解析的节点数据句柄：缓冲区身份 + 槽位下标
///
/// 由初始化上下文发放，槽位在发放时已经校验过。
#[derive(Debug, Clone)]
pub struct DataPtr {
    buffer: NodeBuffer,
    slot: usize,
}

impl DataPtr {
    pub(crate) fn new(buffer: NodeBuffer, slot: usize) -> Self {
        Self { buffer, slot }
    }

    #[inline]
    pub fn get(&self) -> f64 {
        self.buffer[self.slot].get()
    }

    #[inline]
    pub fn set(&self, v: f64) {
        self.buffer[self.slot].set(v);
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    /// 两个句柄是否指向同一个节点缓冲区
    pub fn same_node(&self, other: &DataPtr) -> bool {
        Arc::ptr_eq(&self.buffer, &other.buffer)
    }
}

/// 节点日志：按行存放，每行一份完整的数值数组
#[derive(Debug, Clone, Default)]
pub struct NodeLog {
    width: usize,
    rows: Vec<f64>,
    num_rows: usize,
}

impl NodeLog {
    pub fn new(width: usize) -> Self {
        Self {
            width,
            rows: Vec::new(),
            num_rows: 0,
        }
    }

    /// 预分配 `n_rows` 行
    pub fn preallocate(&mut self, n_rows: usize) {
        self.rows.clear();
        self.rows.resize(n_rows * self.width, 0.0);
        self.num_rows = 0;
    }

    pub fn clear(&mut self) {
        self.rows.clear();
        self.num_rows = 0;
    }

    /// 把当前数值写入第 `row` 行
    pub(crate) fn log_row(&mut self, row: usize, buffer: &[ValueCell]) {
        let start = row * self.width;
        let Some(dst) = self.rows.get_mut(start..start + self.width) else {
            return;
        };
        for (d, cell) in dst.iter_mut().zip(buffer.iter()) {
            *d = cell.get();
        }
        self.num_rows = self.num_rows.max(row + 1);
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn row(&self, row: usize) -> Option<&[f64]> {
        if row >= self.num_rows {
            return None;
        }
        self.rows.get(row * self.width..(row + 1) * self.width)
    }

    /// 取出某个槽位的整列日志
    pub fn column(&self, slot: usize) -> Vec<f64> {
        if slot >= self.width {
            return Vec::new();
        }
        (0..self.num_rows)
            .map(|r| self.rows[r * self.width + slot])
            .collect()
    }
}

/// 连接在节点上的端口（含端口种类，便于计数）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeAttachment {
    pub port: PortRef,
    pub kind: PortKind,
}

/// 节点：共享数据缓冲区 + 已连接端口表 + 可选日志
#[derive(Debug)]
pub struct Node {
    node_type: Arc<NodeType>,
    buffer: NodeBuffer,
    attached: Vec<NodeAttachment>,
    owner: ComponentId,
    pub(crate) log: NodeLog,
    pub(crate) do_log: bool,
    force_disable_log: bool,
}

impl Node {
    pub fn new(node_type: Arc<NodeType>, owner: ComponentId) -> Self {
        let buffer = make_buffer(node_type.defaults());
        let width = node_type.num_slots();
        Self {
            node_type,
            buffer,
            attached: Vec::new(),
            owner,
            log: NodeLog::new(width),
            do_log: true,
            force_disable_log: false,
        }
    }

    pub fn node_type(&self) -> &Arc<NodeType> {
        &self.node_type
    }

    pub fn type_name(&self) -> &str {
        self.node_type.name()
    }

    pub fn num_slots(&self) -> usize {
        self.node_type.num_slots()
    }

    pub fn data_id_from_name(&self, name: &str) -> Option<usize> {
        self.node_type.data_id_from_name(name)
    }

    pub fn data_value(&self, slot: usize) -> f64 {
        self.buffer[slot].get()
    }

    pub fn set_data_value(&self, slot: usize, v: f64) {
        self.buffer[slot].set(v);
    }

    pub fn values(&self) -> Vec<f64> {
        self.buffer.iter().map(ValueCell::get).collect()
    }

    pub(crate) fn buffer(&self) -> &NodeBuffer {
        &self.buffer
    }

    pub(crate) fn data_ptr(&self, slot: usize) -> Option<DataPtr> {
        (slot < self.buffer.len()).then(|| DataPtr::new(Arc::clone(&self.buffer), slot))
    }

    /// 按位置复制数值；节点类型不同时什么都不做
    pub fn copy_node_data_values_to(&self, other: &Node) {
        if self.node_type.name() != other.node_type.name() {
            return;
        }
        for (src, dst) in self.buffer.iter().zip(other.buffer.iter()) {
            dst.set(src.get());
        }
    }

    pub fn owner(&self) -> ComponentId {
        self.owner
    }

    pub fn attached(&self) -> &[NodeAttachment] {
        &self.attached
    }

    pub(crate) fn attach(&mut self, port: PortRef, kind: PortKind) {
        if !self.attached.iter().any(|a| a.port == port) {
            self.attached.push(NodeAttachment { port, kind });
        }
    }

    pub fn num_connected_ports(&self) -> usize {
        self.attached.len()
    }

    pub fn num_ports_by_kind(&self, kind: PortKind) -> usize {
        self.attached.iter().filter(|a| a.kind == kind).count()
    }

    /// 写端口所属组件（信号排序时用来寻找依赖）
    pub fn write_port_component(&self) -> Option<ComponentId> {
        self.attached
            .iter()
            .find(|a| a.kind == PortKind::Write)
            .map(|a| a.port.component())
    }

    pub fn set_force_disable_log(&mut self, disable: bool) {
        self.force_disable_log = disable;
    }

    pub fn is_logging(&self) -> bool {
        self.do_log && !self.force_disable_log
    }

    pub fn log(&self) -> &NodeLog {
        &self.log
    }

    /// 把当前数值记为日志第 `row` 行
    pub fn log_data(&mut self, row: usize) {
        if self.is_logging() {
            self.log.log_row(row, &self.buffer);
        }
    }
}
