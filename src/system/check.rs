//! 仿真前的模型检查
//!
//! 收集全部问题而不是在第一个问题处停下，禁用的组件整体跳过。

use crate::component::CqsRole;
use crate::core::{ComponentId, PortKind};

use super::model::Model;

impl Model {
    /// 检查并把每个问题作为错误消息排队；没有问题时返回 `true`
    pub fn check_model_before_simulation(&mut self) -> bool {
        let errors = self.collect_model_errors();
        for e in &errors {
            self.messages.error(e.clone());
        }
        errors.is_empty()
    }

    /// 递归检查，同时保存参数求值结果
    pub(crate) fn collect_model_errors(&mut self) -> Vec<String> {
        let mut errors = Vec::new();
        self.check_system(Self::ROOT, &mut errors);
        errors
    }

    fn check_system(&mut self, system: ComponentId, errors: &mut Vec<String>) {
        errors.extend(self.evaluate_component_parameters(system));

        let Some(comp) = self.component(system) else {
            return;
        };
        for port in comp.ports().filter(|p| p.kind() == PortKind::System) {
            if port.is_required() && !port.is_connected() {
                errors.push(format!(
                    "System port {}.{} is required but not connected",
                    comp.name,
                    port.name()
                ));
            }
        }

        for child in self.children_of(system) {
            let Some(c) = self.component(child) else {
                continue;
            };
            if c.disabled {
                continue;
            }
            if c.cqs == CqsRole::Undefined {
                errors.push(format!("Component {} has an undefined CQS type", c.name));
            }
            if c.is_system() {
                self.check_system(child, errors);
                continue;
            }
            for port in c.ports() {
                if port.is_required() && !port.is_connected() {
                    errors.push(format!(
                        "Port {}.{} is required but not connected",
                        c.name,
                        port.name()
                    ));
                }
                if !port.kind().is_power() || !port.is_connected() {
                    continue;
                }
                let nodes: Vec<_> = if port.kind().is_multi() {
                    port.sub_ports().iter().filter_map(|s| s.link().node()).collect()
                } else {
                    port.node().into_iter().collect()
                };
                for n in nodes.into_iter().filter_map(|n| self.node(n)) {
                    if n.num_ports_by_kind(PortKind::Power) < 2 {
                        errors.push(format!(
                            "Port {}.{} is connected to a node with only one power port",
                            c.name,
                            port.name()
                        ));
                    }
                }
            }
            errors.extend(self.evaluate_component_parameters(child));
        }
    }
}
