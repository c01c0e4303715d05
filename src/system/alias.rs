//! 别名表
//!
//! 别名把一个系统级名字映射到子组件的端口变量或参数，与子组件、系统端口、系统参数共享同一个命名空间。
//! 目标按组件名记录，组件改名或删除时由系统同步。

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::component::PortOwning;
use crate::core::{ComponentId, KernelError, KernelResult};

use super::model::Model;

/// 别名指向的对象
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AliasTarget {
    Variable {
        component: String,
        port: String,
        variable: String,
    },
    Parameter {
        component: String,
        parameter: String,
    },
}

impl AliasTarget {
    fn component(&self) -> &str {
        match self {
            AliasTarget::Variable { component, .. } | AliasTarget::Parameter { component, .. } => {
                component
            }
        }
    }

    fn component_mut(&mut self) -> &mut String {
        match self {
            AliasTarget::Variable { component, .. } | AliasTarget::Parameter { component, .. } => {
                component
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AliasHandler {
    map: BTreeMap<String, AliasTarget>,
}

impl AliasHandler {
    pub fn has_alias(&self, alias: &str) -> bool {
        self.map.contains_key(alias)
    }

    pub fn target(&self, alias: &str) -> Option<&AliasTarget> {
        self.map.get(alias)
    }

    /// 变量别名解析为 `(组件, 端口, 变量)`
    pub fn variable_from_alias(&self, alias: &str) -> Option<(&str, &str, &str)> {
        match self.map.get(alias)? {
            AliasTarget::Variable {
                component,
                port,
                variable,
            } => Some((component.as_str(), port.as_str(), variable.as_str())),
            AliasTarget::Parameter { .. } => None,
        }
    }

    /// 反查：某个变量的别名
    pub fn alias_for_variable(&self, component: &str, port: &str, variable: &str) -> Option<&str> {
        self.map.iter().find_map(|(alias, t)| match t {
            AliasTarget::Variable {
                component: c,
                port: p,
                variable: v,
            } if c == component && p == port && v == variable => Some(alias.as_str()),
            _ => None,
        })
    }

    pub fn aliases(&self) -> Vec<&str> {
        self.map.keys().map(String::as_str).collect()
    }

    pub(crate) fn insert(&mut self, alias: &str, target: AliasTarget) {
        // 同一个目标只保留一个别名
        self.map.retain(|_, t| *t != target);
        self.map.insert(alias.to_string(), target);
    }

    pub(crate) fn remove(&mut self, alias: &str) -> bool {
        self.map.remove(alias).is_some()
    }

    pub(crate) fn component_renamed(&mut self, old: &str, new: &str) {
        for t in self.map.values_mut() {
            if t.component() == old {
                *t.component_mut() = new.to_string();
            }
        }
    }

    pub(crate) fn component_removed(&mut self, name: &str) {
        self.map.retain(|_, t| t.component() != name);
    }
}

impl Model {
    fn check_alias_name(&self, system: ComponentId, alias: &str) -> KernelResult<()> {
        let sys = self.sys(system)?;
        if alias.is_empty() {
            return Err(KernelError::InvalidName(alias.to_string()));
        }
        if !sys.aliases.has_alias(alias) && self.name_taken(system, alias) {
            return Err(KernelError::NameInUse(alias.to_string()));
        }
        Ok(())
    }

    /// 给子组件的端口变量起一个系统级别名
    pub fn set_variable_alias(
        &mut self,
        system: ComponentId,
        alias: &str,
        component: &str,
        port: &str,
        variable: &str,
    ) -> KernelResult<()> {
        let r = self.check_alias_name(system, alias).and_then(|_| {
            let id = self
                .sub_component(system, component)
                .ok_or_else(|| KernelError::UnknownComponent(component.to_string()))?;
            let c = self.comp(id)?;
            let p = c.port(port).ok_or_else(|| KernelError::UnknownPort {
                component: component.to_string(),
                port: port.to_string(),
            })?;
            let known = p
                .node_type()
                .and_then(|t| self.registry.node_type(t))
                .and_then(|nt| nt.data_id_from_name(variable))
                .is_some();
            if !known {
                return Err(KernelError::UnknownPort {
                    component: component.to_string(),
                    port: format!("{port}.{variable}"),
                });
            }
            Ok(())
        });
        self.reported(r)?;
        let target = AliasTarget::Variable {
            component: component.to_string(),
            port: port.to_string(),
            variable: variable.to_string(),
        };
        self.sys_mut(system)?.aliases.insert(alias, target);
        Ok(())
    }

    pub fn set_parameter_alias(
        &mut self,
        system: ComponentId,
        alias: &str,
        component: &str,
        parameter: &str,
    ) -> KernelResult<()> {
        let r = self.check_alias_name(system, alias).and_then(|_| {
            let id = self
                .sub_component(system, component)
                .ok_or_else(|| KernelError::UnknownComponent(component.to_string()))?;
            if self.comp(id)?.parameter(parameter).is_none() {
                return Err(KernelError::Parameter {
                    name: parameter.to_string(),
                    reason: format!("no such parameter in `{component}`"),
                });
            }
            Ok(())
        });
        self.reported(r)?;
        let target = AliasTarget::Parameter {
            component: component.to_string(),
            parameter: parameter.to_string(),
        };
        self.sys_mut(system)?.aliases.insert(alias, target);
        Ok(())
    }

    pub fn remove_alias(&mut self, system: ComponentId, alias: &str) -> bool {
        self.sys_mut(system)
            .map(|s| s.aliases.remove(alias))
            .unwrap_or(false)
    }

    /// 读取变量别名所指节点的当前值
    pub fn alias_value(&self, system: ComponentId, alias: &str) -> Option<f64> {
        let (component, port, variable) = self.sys(system).ok()?.aliases.variable_from_alias(alias)?;
        let id = self.sub_component(system, component)?;
        let node = self.node(self.node_of_port(id, port)?)?;
        Some(node.data_value(node.data_id_from_name(variable)?))
    }
}
