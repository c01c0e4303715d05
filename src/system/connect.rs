//! 连接助手
//!
//! `connect` 按固定顺序做合法性检查，任何一步拒绝都不改变图；
//! 通过后合并两侧节点（可能跨越多层系统端口），再检查合并后的节点是否合法，不合法则拆分回滚。
//! `disconnect` 删除链接，两侧不再连通时把节点一分为二。
//!
//! 不变量：一个节点上登记的端点集合恰好等于通过链接互相可达的端点集合。

use std::collections::{BTreeSet, VecDeque};

use tracing::debug;

use crate::component::CqsRole;
use crate::core::{ComponentId, KernelError, KernelResult, NodeAttachment, NodeId, PortId, PortKind, PortRef};

use super::model::Model;

impl Model {
    /// 连接两个端口
    #[tracing::instrument(skip(self), fields(model = %self.name()))]
    pub fn connect(
        &mut self,
        comp_a: ComponentId,
        port_a: &str,
        comp_b: ComponentId,
        port_b: &str,
    ) -> KernelResult<()> {
        let r = self.connect_inner(comp_a, port_a, comp_b, port_b);
        self.reported(r)
    }

    /// 宿主接口：成功返回 `true`，失败原因在消息队列里
    pub fn connect_ports(
        &mut self,
        comp_a: ComponentId,
        port_a: &str,
        comp_b: ComponentId,
        port_b: &str,
    ) -> bool {
        self.connect(comp_a, port_a, comp_b, port_b).is_ok()
    }

    #[tracing::instrument(skip(self), fields(model = %self.name()))]
    pub fn disconnect(
        &mut self,
        comp_a: ComponentId,
        port_a: &str,
        comp_b: ComponentId,
        port_b: &str,
    ) -> KernelResult<()> {
        let r = self.disconnect_inner(comp_a, port_a, comp_b, port_b);
        self.reported(r)
    }

    pub fn disconnect_ports(
        &mut self,
        comp_a: ComponentId,
        port_a: &str,
        comp_b: ComponentId,
        port_b: &str,
    ) -> bool {
        self.disconnect(comp_a, port_a, comp_b, port_b).is_ok()
    }

    /// 两个端口之间是否存在直接链接
    pub fn are_connected(&self, a: PortId, b: PortId) -> bool {
        self.find_link(a, b).is_some()
    }

    fn connect_inner(
        &mut self,
        comp_a: ComponentId,
        port_a: &str,
        comp_b: ComponentId,
        port_b: &str,
    ) -> KernelResult<()> {
        self.ensure_editable("connect")?;
        let a = self.port_id(comp_a, port_a)?;
        let b = self.port_id(comp_b, port_b)?;
        let (ka, ta) = {
            let p = self.port_by_id(a)?;
            (p.kind(), p.node_type().map(str::to_string))
        };
        let (kb, tb) = {
            let p = self.port_by_id(b)?;
            (p.kind(), p.node_type().map(str::to_string))
        };
        let label = format!(
            "{{{}}} and {{{}}}",
            self.port_label(PortRef::new(a)),
            self.port_label(PortRef::new(b))
        );
        let invalid = |msg: &str| KernelError::InvalidConnection(format!("{msg}: {label}"));

        if a == b {
            return Err(invalid("You can not connect a port to itself"));
        }
        if a.component == b.component && !(ka == PortKind::System && kb == PortKind::System) {
            return Err(invalid("You can not connect two ports on the same component"));
        }
        self.ensure_not_cross_connecting(a.component, b.component)
            .map_err(|_| invalid("You can not connect ports across hierarchy levels"))?;
        if ka.is_multi() && kb.is_multi() {
            return Err(invalid("You can not connect two multiports to each other"));
        }
        if self.are_connected(a, b) {
            return Err(invalid("Ports are already connected"));
        }
        if ka == PortKind::System && kb == PortKind::System && ta.is_none() && tb.is_none() {
            return Err(invalid("You can not connect two blank system ports to each other"));
        }
        if (ka.is_read() && kb.is_multi()) || (kb.is_read() && ka.is_multi()) {
            return Err(invalid("You can not connect a read port directly to a multiport"));
        }

        // 节点类型；空白系统端口采用对侧的类型
        let mut adopted = None;
        match (&ta, &tb) {
            (Some(x), Some(y)) if x != y => {
                return Err(KernelError::NodeTypeMismatch {
                    left: x.clone(),
                    right: y.clone(),
                });
            }
            (None, Some(t)) => {
                self.adopt_node_type(a, t)?;
                adopted = Some(a);
            }
            (Some(t), None) => {
                self.adopt_node_type(b, t)?;
                adopted = Some(b);
            }
            (None, None) => return Err(invalid("Neither port has a node type")),
            _ => {}
        }

        let ra = match self.if_multiport_add_subport(a) {
            Ok(r) => r,
            Err(e) => {
                self.revert_adopted(adopted);
                return Err(e);
            }
        };
        let rb = match self.if_multiport_add_subport(b) {
            Ok(r) => r,
            Err(e) => {
                self.undo_subport(ra);
                self.revert_adopted(adopted);
                return Err(e);
            }
        };

        let result = match self.merge_node_connection(ra, rb) {
            Ok(node) => {
                let checked = self.ensure_connection_ok(node);
                if checked.is_err() {
                    self.disconnect_refs(ra, rb);
                }
                checked
            }
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            self.undo_subport(ra);
            self.undo_subport(rb);
            self.revert_adopted(adopted);
            return Err(e);
        }

        self.refresh_cqs_from(a.component);
        self.refresh_cqs_from(b.component);
        debug!(connection = %label, "🔗 端口已连接");
        self.messages.debug(format!("Connected: {label}"));
        Ok(())
    }

    fn disconnect_inner(
        &mut self,
        comp_a: ComponentId,
        port_a: &str,
        comp_b: ComponentId,
        port_b: &str,
    ) -> KernelResult<()> {
        self.ensure_editable("disconnect")?;
        let a = self.port_id(comp_a, port_a)?;
        let b = self.port_id(comp_b, port_b)?;
        let (ra, rb) = self.find_link(a, b).ok_or_else(|| {
            KernelError::NotConnected(format!(
                "{{{}}} and {{{}}}",
                self.port_label(PortRef::new(a)),
                self.port_label(PortRef::new(b))
            ))
        })?;
        self.disconnect_refs(ra, rb);
        self.cleanup_endpoint(ra);
        self.cleanup_endpoint(rb);
        self.refresh_cqs_from(a.component);
        self.refresh_cqs_from(b.component);
        debug!(a = port_a, b = port_b, "✂️  端口已断开");
        Ok(())
    }

    /// 两个组件必须在同一个系统里，或者一个是另一个的父系统
    pub(crate) fn ensure_not_cross_connecting(&self, a: ComponentId, b: ComponentId) -> KernelResult<()> {
        let pa = self.comp(a)?.parent;
        let pb = self.comp(b)?.parent;
        let ok = a == b || (pa.is_some() && pa == pb) || pa == Some(b) || pb == Some(a);
        if ok {
            Ok(())
        } else {
            Err(KernelError::InvalidConnection(format!(
                "`{}` and `{}` are on different hierarchy levels",
                self.comp(a)?.name,
                self.comp(b)?.name
            )))
        }
    }

    pub(crate) fn find_link(&self, a: PortId, b: PortId) -> Option<(PortRef, PortRef)> {
        self.endpoints(a).into_iter().find_map(|ra| {
            self.link(ra)?
                .connected()
                .iter()
                .find(|rb| rb.port == b)
                .map(|rb| (ra, *rb))
        })
    }

    /// 节点归属：层级最浅的组件所在的系统（根系统的端口归根系统自己）
    fn node_owner_for(&self, comp: ComponentId) -> ComponentId {
        self.component(comp)
            .and_then(|c| c.parent)
            .unwrap_or(comp)
    }

    fn owner_for_refs(&self, refs: impl IntoIterator<Item = PortRef>) -> ComponentId {
        refs.into_iter()
            .map(|r| r.component())
            .min_by_key(|c| self.component(*c).map(|c| c.depth).unwrap_or(usize::MAX))
            .map(|c| self.node_owner_for(c))
            .unwrap_or(Self::ROOT)
    }

    fn adopt_node_type(&mut self, port: PortId, node_type: &str) -> KernelResult<()> {
        if self.registry.node_type(node_type).is_none() {
            return Err(KernelError::UnknownNodeType(node_type.to_string()));
        }
        self.port_by_id_mut(port)?
            .set_node_type(Some(node_type.to_string()));
        let owner = self.node_owner_for(port.component);
        self.create_dummy_node(PortRef::new(port), owner)?;
        Ok(())
    }

    fn revert_adopted(&mut self, adopted: Option<PortId>) {
        let Some(port) = adopted else {
            return;
        };
        if let Some(n) = self.node_of_ref(PortRef::new(port)) {
            self.free_node(n);
        }
        if let Ok(p) = self.port_by_id_mut(port) {
            p.link.node = None;
            p.set_node_type(None);
        }
    }

    /// 多端口透明地新建一个子端口（带私有节点）并返回它
    fn if_multiport_add_subport(&mut self, port: PortId) -> KernelResult<PortRef> {
        if !self.port_by_id(port)?.kind().is_multi() {
            return Ok(PortRef::new(port));
        }
        let sub = self.port_by_id_mut(port)?.add_sub_port();
        let r = PortRef::sub(port, sub);
        let owner = self.node_owner_for(port.component);
        if let Err(e) = self.create_dummy_node(r, owner) {
            if let Ok(p) = self.port_by_id_mut(port) {
                p.remove_sub_port(sub);
            }
            return Err(e);
        }
        Ok(r)
    }

    fn undo_subport(&mut self, r: PortRef) {
        let Some(sub) = r.sub else {
            return;
        };
        if let Some(n) = self.node_of_ref(r) {
            self.free_node(n);
        }
        if let Ok(p) = self.port_by_id_mut(r.port) {
            p.remove_sub_port(sub);
        }
    }

    /// 合并两侧节点：新建一个同类型节点，两侧所有端点改绑到它，旧节点删除
    fn merge_node_connection(&mut self, ra: PortRef, rb: PortRef) -> KernelResult<NodeId> {
        let n1 = self
            .node_of_ref(ra)
            .ok_or_else(|| KernelError::InvalidConnection(format!("{} has no node", self.port_label(ra))))?;
        let n2 = self
            .node_of_ref(rb)
            .ok_or_else(|| KernelError::InvalidConnection(format!("{} has no node", self.port_label(rb))))?;
        if n1 == n2 {
            return Err(KernelError::InvalidConnection(format!(
                "node is joined with itself: {} and {}",
                self.port_label(ra),
                self.port_label(rb)
            )));
        }
        let (node_type, refs): (_, Vec<NodeAttachment>) = {
            let node1 = self.node(n1).ok_or_else(|| KernelError::InvalidConnection("missing node".into()))?;
            let node2 = self.node(n2).ok_or_else(|| KernelError::InvalidConnection("missing node".into()))?;
            let mut atts = node1.attached().to_vec();
            atts.extend_from_slice(node2.attached());
            (node1.node_type().clone(), atts)
        };
        let owner = self.owner_for_refs(refs.iter().map(|a| a.port));
        self.free_node(n1);
        self.free_node(n2);
        let merged = self.alloc_node(node_type, owner);
        if let Some(l) = self.link_mut(ra) {
            l.link(rb);
        }
        if let Some(l) = self.link_mut(rb) {
            l.link(ra);
        }
        for att in refs {
            self.bind(att.port, merged);
        }
        Ok(merged)
    }

    /// 合并后节点的合法性
    fn ensure_connection_ok(&self, node: NodeId) -> KernelResult<()> {
        let n = self
            .node(node)
            .ok_or_else(|| KernelError::InvalidConnection("missing node".into()))?;
        let (mut power, mut write, mut c_power, mut q_power) = (0, 0, 0, 0);
        for att in n.attached() {
            match att.kind {
                PortKind::Power => {
                    power += 1;
                    match self.component(att.port.component()).map(|c| c.cqs) {
                        Some(CqsRole::C) => c_power += 1,
                        Some(CqsRole::Q) => q_power += 1,
                        _ => {}
                    }
                }
                PortKind::Write => write += 1,
                _ => {}
            }
        }
        let fail = |msg: &str| Err(KernelError::InvalidConnection(msg.to_string()));
        if power > 2 {
            return fail("You can not connect more than two power ports to the same node");
        }
        if write > 1 {
            return fail("You can not connect more than one write port to the same node");
        }
        if power > 0 && write > 0 {
            return fail("You can not connect a write port to a power port");
        }
        if c_power > 1 {
            return fail("You can not connect two C-Component power ports to each other");
        }
        if q_power > 1 {
            return fail("You can not connect two Q-Component power ports to each other");
        }
        Ok(())
    }

    /// 通过链接从 `start` 可达的全部端点
    fn reachable(&self, start: PortRef) -> Vec<PortRef> {
        let mut seen = BTreeSet::new();
        let mut order = Vec::new();
        let mut queue = VecDeque::from([start]);
        while let Some(r) = queue.pop_front() {
            if !seen.insert(ref_key(r)) {
                continue;
            }
            order.push(r);
            if let Some(l) = self.link(r) {
                queue.extend(l.connected().iter().copied());
            }
        }
        order
    }

    /// 删除两个端点之间的链接；两侧不再连通时拆分节点（数值各复制一份）
    pub(crate) fn disconnect_refs(&mut self, ra: PortRef, rb: PortRef) {
        if let Some(l) = self.link_mut(ra) {
            l.unlink(rb);
        }
        if let Some(l) = self.link_mut(rb) {
            l.unlink(ra);
        }
        let Some(old) = self.node_of_ref(ra) else {
            return;
        };
        let side_a = self.reachable(ra);
        if side_a.contains(&rb) {
            return;
        }
        let side_b = self.reachable(rb);
        let Some((node_type, values)) = self.node(old).map(|n| (n.node_type().clone(), n.values())) else {
            return;
        };
        self.free_node(old);
        for side in [side_a, side_b] {
            let owner = self.owner_for_refs(side.iter().copied());
            let fresh = self.alloc_node(node_type.clone(), owner);
            if let Some(n) = self.node(fresh) {
                for (slot, v) in values.iter().enumerate() {
                    n.set_data_value(slot, *v);
                }
            }
            for r in side {
                self.bind(r, fresh);
            }
        }
    }

    /// 断开后的收尾：空的子端口删除，不再连接的系统端口清空类型
    pub(crate) fn cleanup_endpoint(&mut self, r: PortRef) {
        let Ok(port) = self.port_by_id(r.port) else {
            return;
        };
        let kind = port.kind();
        let port_connected = port.is_connected();
        let still_connected = self.link(r).is_some_and(|l| l.is_connected());
        if r.sub.is_some() && !still_connected {
            self.undo_subport(r);
        } else if kind == PortKind::System && !port_connected {
            self.revert_adopted(Some(r.port));
        }
    }
}

fn ref_key(r: PortRef) -> (usize, usize, Option<u32>) {
    (r.port.component.0, r.port.index, r.sub.map(|s| s.0))
}
