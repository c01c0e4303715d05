//! 参数求值、系统参数与起始值
//!
//! 求值作用域：`self.X` 指同一组件的参数；其余名字沿父系统链查找系统参数。
//! 递归深度有上限，自引用或循环引用在上限处判为求值失败。

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::debug;

use crate::component::PortOwning;
use crate::core::{ComponentId, KernelError, KernelResult, Parameter, ParameterType, ParameterValue, PortKind};

use super::model::Model;

/// 参数引用链的最大深度
const MAX_EVAL_DEPTH: usize = 250;

fn value_text(v: &Value) -> KernelResult<String> {
    match v {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(KernelError::Parameter {
            name: other.to_string(),
            reason: "expected a string, number or bool".to_string(),
        }),
    }
}

fn default_of(ptype: ParameterType) -> ParameterValue {
    match ptype {
        ParameterType::Double => ParameterValue::Double(0.0),
        ParameterType::Integer | ParameterType::Conditional => ParameterValue::Integer(0),
        ParameterType::Bool => ParameterValue::Bool(false),
        ParameterType::String => ParameterValue::Text(String::new()),
    }
}

impl Model {
    /// 在 `owner` 的作用域里解析一个名字
    fn resolve_name(&self, owner: ComponentId, name: &str, depth: usize) -> Option<f64> {
        if depth > MAX_EVAL_DEPTH {
            return None;
        }
        if let Some(own) = name.strip_prefix("self.") {
            return self.eval_param_f64(owner, own, depth + 1);
        }
        let owner_comp = self.component(owner)?;
        let mut cur = if owner_comp.is_system() {
            Some(owner)
        } else {
            owner_comp.parent
        };
        while let Some(sys) = cur {
            let c = self.component(sys)?;
            if c.parameters.contains(name) {
                return self.eval_param_f64(sys, name, depth + 1);
            }
            cur = c.parent;
        }
        None
    }

    fn eval_param_f64(&self, owner: ComponentId, name: &str, depth: usize) -> Option<f64> {
        self.eval_param(owner, name, depth).ok()?.as_f64()
    }

    fn eval_param(&self, owner: ComponentId, name: &str, depth: usize) -> KernelResult<ParameterValue> {
        let p = self
            .comp(owner)?
            .parameters
            .get(name)
            .ok_or_else(|| KernelError::Parameter {
                name: name.to_string(),
                reason: "no such parameter".to_string(),
            })?;
        if depth > MAX_EVAL_DEPTH {
            return Err(KernelError::Parameter {
                name: name.to_string(),
                reason: "reference chain too deep (circular?)".to_string(),
            });
        }
        p.evaluate(&|n| self.resolve_name(owner, n, depth + 1))
    }

    /// 求值一个参数（不保存结果）
    pub fn evaluate_parameter(&self, comp: ComponentId, name: &str) -> KernelResult<ParameterValue> {
        self.eval_param(comp, name, 0)
    }

    /// 求值组件的全部参数并保存；返回失败描述
    pub(crate) fn evaluate_component_parameters(&mut self, comp: ComponentId) -> Vec<String> {
        let Some(c) = self.component(comp) else {
            return Vec::new();
        };
        let comp_name = c.name.clone();
        let names: Vec<String> = c.parameters.names().into_iter().map(str::to_string).collect();
        let mut errors = Vec::new();
        let mut values = Vec::new();
        for name in names {
            match self.eval_param(comp, &name, 0) {
                Ok(v) => values.push((name, v)),
                Err(_) => {
                    let text = self
                        .component(comp)
                        .and_then(|c| c.parameters.get(&name))
                        .map(|p| p.value_text().to_string())
                        .unwrap_or_default();
                    errors.push(format!(
                        "Parameter {name} in component {comp_name} could not be evaluated: '{text}'"
                    ));
                }
            }
        }
        if let Ok(c) = self.comp_mut(comp) {
            for (name, v) in values {
                if let Some(p) = c.parameters.get_mut(&name) {
                    p.set_evaluated(v);
                }
            }
        }
        errors
    }

    /// 设置参数值文本（字面量或表达式）
    pub fn set_parameter_value(&mut self, comp: ComponentId, name: &str, text: &str) -> KernelResult<()> {
        let r = self.set_parameter_value_inner(comp, name, text);
        self.reported(r)
    }

    fn set_parameter_value_inner(&mut self, comp: ComponentId, name: &str, text: &str) -> KernelResult<()> {
        self.ensure_editable("set_parameter_value")?;
        let c = self.comp_mut(comp)?;
        if c.parameters.get(name).is_some_and(Parameter::is_constant) {
            return Err(KernelError::Parameter {
                name: name.to_string(),
                reason: "is a constant".to_string(),
            });
        }
        c.parameters.set_value(name, text)
    }

    /// 最近一次求值的结果
    pub fn parameter_value(&self, comp: ComponentId, name: &str) -> Option<&ParameterValue> {
        self.component(comp)?.parameters.get(name)?.evaluated()
    }

    // ---- 系统参数 ----

    /// 设置或新增系统参数；新增时名字必须在系统命名空间中空闲
    pub fn set_or_add_system_parameter(
        &mut self,
        system: ComponentId,
        name: &str,
        value_text: &str,
        ptype: ParameterType,
    ) -> KernelResult<()> {
        let r = self.ensure_editable("set_or_add_system_parameter").and_then(|_| {
            self.sys(system)?;
            if self.comp(system)?.parameters.contains(name) {
                return self.comp_mut(system)?.parameters.set_value(name, value_text);
            }
            if name.is_empty() || name.contains('.') {
                return Err(KernelError::InvalidName(name.to_string()));
            }
            if self.name_taken(system, name) {
                return Err(KernelError::NameInUse(name.to_string()));
            }
            let mut p = Parameter::new(name, "", "", default_of(ptype));
            p.set_value_text(value_text)?;
            self.comp_mut(system)?.parameters.add(p)
        });
        self.reported(r)
    }

    pub fn set_system_parameter(&mut self, system: ComponentId, name: &str, value_text: &str) -> KernelResult<()> {
        let r = self.set_system_parameter_inner(system, name, value_text);
        self.reported(r)
    }

    fn set_system_parameter_inner(&mut self, system: ComponentId, name: &str, value_text: &str) -> KernelResult<()> {
        self.ensure_editable("set_system_parameter")?;
        self.sys(system)?;
        self.comp_mut(system)?.parameters.set_value(name, value_text)
    }

    pub fn remove_system_parameter(&mut self, system: ComponentId, name: &str) -> KernelResult<()> {
        let r = self.ensure_editable("remove_system_parameter").and_then(|_| {
            self.sys(system)?;
            self.comp_mut(system)?
                .parameters
                .remove(name)
                .map(|_| ())
                .ok_or_else(|| KernelError::Parameter {
                    name: name.to_string(),
                    reason: "no such system parameter".to_string(),
                })
        });
        self.reported(r)
    }

    /// 改名；值文本恰好是旧名字的子孙参数一并改写
    pub fn rename_system_parameter(&mut self, system: ComponentId, old: &str, new: &str) -> KernelResult<()> {
        let r = self.ensure_editable("rename_system_parameter").and_then(|_| {
            self.sys(system)?;
            if self.name_taken(system, new) {
                return Err(KernelError::NameInUse(new.to_string()));
            }
            self.comp_mut(system)?.parameters.rename(old, new)?;
            let mut stack = self.children_of(system);
            while let Some(id) = stack.pop() {
                let c = self.comp_mut(id)?;
                for p in c.parameters.iter_mut() {
                    if p.value_text() == old {
                        p.set_value_text(new)?;
                    }
                }
                if c.is_system() && !c.parameters.contains(old) {
                    stack.extend(self.children_of(id));
                }
            }
            Ok(())
        });
        self.reported(r)
    }

    pub fn system_parameter_names(&self, system: ComponentId) -> Vec<String> {
        self.component(system)
            .filter(|c| c.is_system())
            .map(|c| c.parameters.names().into_iter().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// 从 JSON 对象批量设置参数：键为 `组件路径.参数` 或根系统参数名
    pub fn load_parameter_values(&mut self, json: &str) -> KernelResult<usize> {
        let r = self.load_parameter_values_inner(json);
        self.reported(r)
    }

    fn load_parameter_values_inner(&mut self, json: &str) -> KernelResult<usize> {
        let map: BTreeMap<String, Value> = serde_json::from_str(json)?;
        let mut applied = 0;
        for (key, value) in &map {
            let text = value_text(value)?;
            match key.rsplit_once('.') {
                Some((path, param)) => {
                    let comp = self
                        .find_component(path)
                        .ok_or_else(|| KernelError::UnknownComponent(path.to_string()))?;
                    self.set_parameter_value_inner(comp, param, &text)?;
                }
                None => self.set_system_parameter_inner(Self::ROOT, key, &text)?,
            }
            applied += 1;
        }
        debug!(applied, "参数文件已加载");
        Ok(applied)
    }

    // ---- 起始值 ----

    fn variable_slot(&self, comp: ComponentId, port: &str, variable: &str) -> KernelResult<usize> {
        let c = self.comp(comp)?;
        let p = c.port(port).ok_or_else(|| KernelError::UnknownPort {
            component: c.name.clone(),
            port: port.to_string(),
        })?;
        p.node_type()
            .and_then(|t| self.registry.node_type(t))
            .and_then(|nt| nt.data_id_from_name(variable))
            .ok_or_else(|| KernelError::UnknownPort {
                component: c.name.clone(),
                port: format!("{port}.{variable}"),
            })
    }

    pub fn set_start_value(&mut self, comp: ComponentId, port: &str, variable: &str, value: f64) -> KernelResult<()> {
        let r = self.set_start_value_inner(comp, port, variable, value);
        self.reported(r)
    }

    fn set_start_value_inner(&mut self, comp: ComponentId, port: &str, variable: &str, value: f64) -> KernelResult<()> {
        let slot = self.variable_slot(comp, port, variable)?;
        let id = self.port_id(comp, port)?;
        if self.port_by_id_mut(id)?.set_start_value(slot, value) {
            Ok(())
        } else {
            Err(KernelError::UnknownPort {
                component: self.comp(comp)?.name.clone(),
                port: format!("{port}.{variable} (no start value)"),
            })
        }
    }

    pub fn start_value(&self, comp: ComponentId, port: &str, variable: &str) -> Option<f64> {
        let slot = self.variable_slot(comp, port, variable).ok()?;
        self.port(comp, port)?.start_value(slot)
    }

    /// 从 JSON 对象批量设置起始值：键为 `组件路径.端口.变量`
    pub fn load_start_values(&mut self, json: &str) -> KernelResult<usize> {
        let r = self.load_start_values_inner(json);
        self.reported(r)
    }

    fn load_start_values_inner(&mut self, json: &str) -> KernelResult<usize> {
        let map: BTreeMap<String, f64> = serde_json::from_str(json)?;
        for (key, value) in &map {
            let mut parts = key.rsplitn(3, '.');
            let (Some(variable), Some(port), Some(path)) = (parts.next(), parts.next(), parts.next()) else {
                return Err(KernelError::InvalidName(key.clone()));
            };
            let comp = self
                .find_component(path)
                .ok_or_else(|| KernelError::UnknownComponent(path.to_string()))?;
            self.set_start_value_inner(comp, port, variable, *value)?;
        }
        Ok(map.len())
    }

    /// 把起始值写入节点：C 组件功率端口与写端口总是写入，读端口只在未连接时写入
    pub(crate) fn load_start_values_into_nodes(&mut self) {
        for id in self.component_ids() {
            if self.is_effectively_disabled(id) {
                continue;
            }
            let Some(c) = self.component(id) else {
                continue;
            };
            for port in c.ports() {
                let Some(values) = port.start_values() else {
                    continue;
                };
                if port.kind() == PortKind::Read && port.is_connected() {
                    continue;
                }
                let nodes: Vec<_> = if port.kind().is_multi() {
                    port.sub_ports().iter().filter_map(|s| s.link().node()).collect()
                } else {
                    port.node().into_iter().collect()
                };
                for n in nodes.into_iter().filter_map(|n| self.node(n)) {
                    for (slot, v) in values.iter().enumerate().take(n.num_slots()) {
                        n.set_data_value(slot, *v);
                    }
                }
            }
        }
    }

    /// 仿真结束后把节点终值写回起始值
    pub fn load_start_values_from_simulation(&mut self, system: ComponentId) -> KernelResult<()> {
        let mut stack = self.children_of(system);
        while let Some(id) = stack.pop() {
            let n_ports = self.comp(id)?.ports.len();
            for index in 0..n_ports {
                let node_values = self
                    .comp(id)?
                    .port_at(index)
                    .filter(|p| p.has_start_values())
                    .and_then(|p| p.node())
                    .and_then(|n| self.node(n))
                    .map(|n| n.values());
                if let (Some(values), Some(p)) = (node_values, self.comp_mut(id)?.port_at_mut(index)) {
                    for (slot, v) in values.into_iter().enumerate() {
                        p.set_start_value(slot, v);
                    }
                }
            }
            if self.comp(id)?.is_system() {
                stack.extend(self.children_of(id));
            }
        }
        Ok(())
    }

    pub fn set_keep_values_as_start_values(&mut self, system: ComponentId, keep: bool) -> KernelResult<()> {
        let r = self.sys_mut(system).map(|s| s.keep_start_values = keep);
        self.reported(r)
    }
}
