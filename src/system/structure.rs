//! 系统结构编辑：增删改名、唯一命名、禁用与时间步设置

use tracing::{debug, info};

use crate::component::{Component, CqsRole, PortOwning};
use crate::core::{ComponentId, KernelError, KernelResult, PortId, PortRef, PortRequirement};

use super::model::{Model, SystemData};

/// 去掉名字末尾的 `_<n>` 后缀
fn strip_numeric_suffix(name: &str) -> &str {
    match name.rsplit_once('_') {
        Some((base, n)) if !base.is_empty() && !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()) => base,
        _ => name,
    }
}

pub(crate) fn push_role(sys: &mut SystemData, id: ComponentId, role: CqsRole) {
    match role {
        CqsRole::S => sys.signal.push(id),
        CqsRole::C => sys.c.push(id),
        CqsRole::Q => sys.q.push(id),
        CqsRole::Undefined => sys.undefined.push(id),
    }
}

impl Model {
    /// 名字是否已被子组件、系统端口、系统参数或别名占用
    pub(crate) fn name_taken(&self, system: ComponentId, name: &str) -> bool {
        let Some(comp) = self.component(system) else {
            return false;
        };
        let Some(sys) = comp.system() else {
            return false;
        };
        sys.children.contains_key(name)
            || comp.port(name).is_some()
            || comp.parameters.contains(name)
            || sys.aliases.has_alias(name)
    }

    /// 期望名可用时原样返回；否则去掉数字后缀并追加第一个空闲的 `_<n>`
    pub fn determine_unique_component_name(&self, system: ComponentId, desired: &str) -> String {
        if !self.name_taken(system, desired) {
            return desired.to_string();
        }
        let base = strip_numeric_suffix(desired);
        (1u64..)
            .map(|n| format!("{base}_{n}"))
            .find(|n| !self.name_taken(system, n))
            .unwrap_or_else(|| desired.to_string())
    }

    fn insert_child(&mut self, system: ComponentId, mut comp: Component, desired: &str) -> KernelResult<ComponentId> {
        let parent_depth = self.comp(system)?.depth;
        let name = self.determine_unique_component_name(system, desired);
        comp.name = name.clone();
        comp.parent = Some(system);
        comp.depth = parent_depth + 1;
        let role = comp.cqs;
        let id = ComponentId(self.components.len());
        self.components.push(Some(comp));
        let sys = self.sys_mut(system)?;
        sys.children.insert(name, id);
        push_role(sys, id, role);
        Ok(id)
    }

    /// 用注册表创建组件并放入系统；未知类型得到占位组件
    pub fn add_component(
        &mut self,
        system: ComponentId,
        type_name: &str,
        desired_name: &str,
    ) -> KernelResult<ComponentId> {
        let r = self.add_component_inner(system, type_name, desired_name);
        self.reported(r)
    }

    fn add_component_inner(
        &mut self,
        system: ComponentId,
        type_name: &str,
        desired_name: &str,
    ) -> KernelResult<ComponentId> {
        self.ensure_editable("add_component")?;
        self.sys(system)?;
        let comp = self.registry.create_component(type_name, &self.messages);
        let desired = if desired_name.is_empty() {
            comp.type_name.clone()
        } else {
            desired_name.to_string()
        };
        let n_ports = comp.ports.len();
        let id = self.insert_child(system, comp, &desired)?;
        // 每个非多端口先拿到一个私有哑节点
        for index in 0..n_ports {
            let port = self.port_by_id(PortId::new(id, index))?;
            if port.kind().is_multi() || port.node_type().is_none() {
                continue;
            }
            self.create_dummy_node(PortRef::new(PortId::new(id, index)), system)?;
        }
        debug!(component = %self.comp(id)?.name, type_name, "添加组件");
        Ok(id)
    }

    /// 添加嵌套子系统
    pub fn add_subsystem(&mut self, system: ComponentId, desired_name: &str) -> KernelResult<ComponentId> {
        let r = self.ensure_editable("add_subsystem").and_then(|_| {
            self.sys(system)?;
            if desired_name.is_empty() {
                return Err(KernelError::InvalidName(desired_name.to_string()));
            }
            self.insert_child(system, Component::new_system(desired_name), desired_name)
        });
        self.reported(r)
    }

    /// 添加空白系统端口，返回实际使用的名字
    pub fn add_system_port(&mut self, system: ComponentId, desired_name: &str) -> KernelResult<String> {
        self.add_system_port_with(system, desired_name, PortRequirement::NotRequired)
    }

    pub fn add_system_port_with(
        &mut self,
        system: ComponentId,
        desired_name: &str,
        requirement: PortRequirement,
    ) -> KernelResult<String> {
        let r = self.ensure_editable("add_system_port").and_then(|_| {
            self.sys(system)?;
            if desired_name.is_empty() {
                return Err(KernelError::InvalidName(desired_name.to_string()));
            }
            let name = self.determine_unique_component_name(system, desired_name);
            self.comp_mut(system)?.push_system_port(&name, requirement);
            Ok(name)
        });
        self.reported(r)
    }

    /// 删除子组件：断开全部连接，移出角色表，删除别名与哑节点，释放名字
    pub fn remove_sub_component(&mut self, system: ComponentId, name: &str) -> KernelResult<()> {
        let r = self.ensure_editable("remove_sub_component").and_then(|_| {
            let id = self
                .sub_component(system, name)
                .ok_or_else(|| KernelError::UnknownComponent(name.to_string()))?;
            self.remove_component_tree(id)?;
            self.refresh_cqs_from(system);
            info!(component = name, "🗑️  删除组件");
            Ok(())
        });
        self.reported(r)
    }

    fn remove_component_tree(&mut self, id: ComponentId) -> KernelResult<()> {
        if self.comp(id)?.is_system() {
            for child in self.children_of(id) {
                self.remove_component_tree(child)?;
            }
        }
        let n_ports = self.comp(id)?.ports.len();
        for index in 0..n_ports {
            let pid = PortId::new(id, index);
            for ra in self.endpoints(pid) {
                let peers = self.link(ra).map(|l| l.connected().to_vec()).unwrap_or_default();
                for rb in peers {
                    self.disconnect_refs(ra, rb);
                    self.cleanup_endpoint(rb);
                }
            }
            let nodes: Vec<_> = self
                .endpoints(pid)
                .into_iter()
                .filter_map(|r| self.node_of_ref(r))
                .collect();
            for n in nodes {
                self.free_node(n);
            }
        }
        // 自己名下残留的节点（例如未连接的系统端口节点）
        if let Some(left) = self.system_data(id).map(|s| s.sub_nodes.clone()) {
            for n in left {
                self.free_node(n);
            }
        }
        let (name, parent) = {
            let c = self.comp(id)?;
            (c.name.clone(), c.parent)
        };
        if let Some(parent) = parent {
            let sys = self.sys_mut(parent)?;
            sys.children.remove(&name);
            for v in sys.role_vectors_mut() {
                v.retain(|c| *c != id);
            }
            sys.aliases.component_removed(&name);
        }
        if let Some(slot) = self.components.get_mut(id.0) {
            *slot = None;
        }
        Ok(())
    }

    /// 改名；新名字按唯一命名规则调整，别名随之更新
    pub fn rename_sub_component(&mut self, system: ComponentId, old: &str, new: &str) -> KernelResult<String> {
        let r = self.ensure_editable("rename_sub_component").and_then(|_| {
            let id = self
                .sub_component(system, old)
                .ok_or_else(|| KernelError::UnknownComponent(old.to_string()))?;
            if new.is_empty() {
                return Err(KernelError::InvalidName(new.to_string()));
            }
            if new == old {
                return Ok(old.to_string());
            }
            let name = self.determine_unique_component_name(system, new);
            let sys = self.sys_mut(system)?;
            sys.children.remove(old);
            sys.children.insert(name.clone(), id);
            sys.aliases.component_renamed(old, &name);
            self.comp_mut(id)?.name = name.clone();
            Ok(name)
        });
        self.reported(r)
    }

    /// 禁用的组件（及其子树）不参与检查与仿真；重复调用没有额外效果
    pub fn set_disabled(&mut self, comp: ComponentId, disabled: bool) -> KernelResult<()> {
        let r = self.ensure_editable("set_disabled").and_then(|_| {
            self.comp_mut(comp)?.disabled = disabled;
            Ok(())
        });
        self.reported(r)
    }

    /// 组件自身或任一上层系统被禁用
    pub fn is_effectively_disabled(&self, mut id: ComponentId) -> bool {
        loop {
            let Some(c) = self.component(id) else {
                return true;
            };
            if c.disabled {
                return true;
            }
            match c.parent {
                Some(p) => id = p,
                None => return false,
            }
        }
    }

    /// 设置期望时间步；对根系统来说就是模型时间步
    pub fn set_desired_timestep(&mut self, comp: ComponentId, timestep: f64) -> KernelResult<()> {
        let r = self.ensure_editable("set_desired_timestep").and_then(|_| {
            self.comp_mut(comp)?.desired_timestep = timestep;
            Ok(())
        });
        self.reported(r)
    }

    pub fn set_inherit_timestep(&mut self, comp: ComponentId, inherit: bool) -> KernelResult<()> {
        let r = self.ensure_editable("set_inherit_timestep").and_then(|_| {
            self.comp_mut(comp)?.inherit_timestep = inherit;
            Ok(())
        });
        self.reported(r)
    }

    /// 初始化时按层级确定实际时间步
    pub(crate) fn adjust_timesteps(&mut self, system: ComponentId) -> KernelResult<()> {
        if system == Self::ROOT {
            let root = self.comp_mut(system)?;
            root.timestep = if root.desired_timestep > 0.0 {
                root.desired_timestep
            } else {
                0.001
            };
        }
        let parent_ts = self.comp(system)?.timestep;
        for child in self.children_of(system) {
            let c = self.comp_mut(child)?;
            c.timestep = if c.inherit_timestep || c.desired_timestep <= 0.0 {
                parent_ts
            } else {
                c.desired_timestep
            };
            if c.is_system() {
                self.adjust_timesteps(child)?;
            }
        }
        Ok(())
    }

    /// 端口的全部可连接端点：普通端口是它自己，多端口是各个子端口
    pub(crate) fn endpoints(&self, port: PortId) -> Vec<PortRef> {
        match self.port_by_id(port) {
            Ok(p) if p.kind().is_multi() => p
                .sub_ports()
                .iter()
                .map(|s| PortRef::sub(port, s.id()))
                .collect(),
            Ok(_) => vec![PortRef::new(port)],
            Err(_) => Vec::new(),
        }
    }
}
