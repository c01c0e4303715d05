//! 信号组件排序
//!
//! 迭代式拓扑排序：每一轮把所有输入都已就绪的组件依次放入结果，一轮下来没有任何进展即存在代数环。
//! C、Q 两个表保持插入顺序。

use tracing::{debug, warn};

use crate::core::{ComponentId, KernelError, KernelResult, PortKind};

use super::model::Model;

impl Model {
    /// 在 `system` 的直接子组件里找到包含 `leaf` 的那一个
    fn direct_child_containing(&self, system: ComponentId, mut leaf: ComponentId) -> Option<ComponentId> {
        loop {
            let parent = self.component(leaf)?.parent?;
            if parent == system {
                return Some(leaf);
            }
            leaf = parent;
        }
    }

    /// `comp` 依赖的、同在信号表中的其他组件
    fn signal_dependencies(&self, system: ComponentId, comp: ComponentId) -> Vec<ComponentId> {
        let mut leaves = vec![comp];
        let mut deps = Vec::new();
        // 子系统要看它内部所有叶子的读端口
        while let Some(id) = leaves.pop() {
            let Some(c) = self.component(id) else {
                continue;
            };
            if c.is_system() {
                leaves.extend(self.children_of(id));
                continue;
            }
            for port in c.ports().filter(|p| p.kind().is_read()) {
                let nodes: Vec<_> = if port.kind() == PortKind::ReadMulti {
                    port.sub_ports().iter().filter_map(|s| s.link().node()).collect()
                } else {
                    port.node().into_iter().collect()
                };
                for n in nodes {
                    let Some(writer) = self.node(n).and_then(|n| n.write_port_component()) else {
                        continue;
                    };
                    let breaks = self
                        .component(writer)
                        .is_some_and(|w| w.breaks_algebraic_loops());
                    if breaks || self.is_effectively_disabled(writer) {
                        continue;
                    }
                    // 子系统内部的自反馈由子系统自己的排序处理
                    match self.direct_child_containing(system, writer) {
                        Some(dep) if dep != comp || writer == comp => deps.push(dep),
                        _ => {}
                    }
                }
            }
        }
        deps
    }

    /// 排序一个系统的信号表
    pub fn sort_signal_components(&mut self, system: ComponentId) -> KernelResult<()> {
        let unsorted: Vec<ComponentId> = self.sys(system)?.signal.clone();
        let mut pending: Vec<(ComponentId, Vec<ComponentId>)> = unsorted
            .iter()
            .map(|id| (*id, self.signal_dependencies(system, *id)))
            .collect();
        let mut sorted: Vec<ComponentId> = Vec::with_capacity(pending.len());

        while !pending.is_empty() {
            let mut progressed = false;
            let mut i = 0;
            while i < pending.len() {
                let ready = pending[i]
                    .1
                    .iter()
                    .all(|d| sorted.contains(d) || !unsorted.contains(d));
                if ready {
                    let (id, _) = pending.remove(i);
                    sorted.push(id);
                    progressed = true;
                } else {
                    i += 1;
                }
            }
            if !progressed {
                let sys_name = self.comp(system)?.name.clone();
                warn!(system = %sys_name, remaining = pending.len(), "信号组件存在代数环");
                self.messages
                    .error("Algebraic loops was found, signal components could not be sorted.");
                if let Some(last) = sorted.last().and_then(|id| self.component(*id)) {
                    self.messages
                        .info(format!("Last component that was successfully sorted: {}", last.name));
                }
                self.messages
                    .info("Hint: Use unit delay components to resolve loops.");
                return Err(KernelError::AlgebraicLoop(sys_name));
            }
        }

        debug!(count = sorted.len(), "信号组件排序完成");
        self.sys_mut(system)?.signal = sorted;
        Ok(())
    }

    /// 递归排序所有系统的信号表
    pub(crate) fn sort_all_signal_vectors(&mut self, system: ComponentId) -> KernelResult<()> {
        self.sort_signal_components(system)?;
        for child in self.children_of(system) {
            if self.comp(child)?.is_system() {
                self.sort_all_signal_vectors(child)?;
            }
        }
        Ok(())
    }
}
