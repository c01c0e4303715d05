use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::{ComponentId, KernelResult, NodeDataRole};
use crate::system::Model;

/// 一个节点变量的日志列
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogColumn {
    /// 组件的点分路径
    pub component: String,
    pub port: String,
    pub variable: String,
    pub unit: String,
    pub values: Vec<f64>,
}

/// 一个系统的全部日志
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogExport {
    pub model: String,
    pub time: Vec<f64>,
    pub columns: Vec<LogColumn>,
}

impl LogExport {
    /// 导出根系统的日志
    pub fn from_model(model: &Model) -> Self {
        Self::from_system(model, model.root())
    }

    /// 导出 `system` 直属节点的日志；每个节点只导出一次，以第一个连接的叶子端口命名
    pub fn from_system(model: &Model, system: ComponentId) -> Self {
        let mut columns = Vec::new();
        let nodes = model
            .system_data(system)
            .map(|s| s.sub_nodes().to_vec())
            .unwrap_or_default();
        for id in nodes {
            let Some(node) = model.node(id) else {
                continue;
            };
            if !node.is_logging() || node.log().num_rows() == 0 {
                continue;
            }
            // 优先用叶子组件的端口命名，系统端口只是透传
            let owner = node
                .attached()
                .iter()
                .find(|a| model.component(a.port.component()).is_some_and(|c| !c.is_system()))
                .or_else(|| node.attached().first());
            let Some(owner) = owner else {
                continue;
            };
            let component = model.component_path(owner.port.component());
            let port = model
                .component(owner.port.component())
                .and_then(|c| c.port_at(owner.port.port.index))
                .map(|p| p.name().to_string())
                .unwrap_or_default();
            for (slot, desc) in node.node_type().slots().iter().enumerate() {
                if desc.role == NodeDataRole::Hidden {
                    continue;
                }
                columns.push(LogColumn {
                    component: component.clone(),
                    port: port.clone(),
                    variable: desc.name.clone(),
                    unit: desc.unit.clone(),
                    values: node.log().column(slot),
                });
            }
        }
        debug!(system = system.0, columns = columns.len(), "日志已整理");
        Self {
            model: model.name().to_string(),
            time: model.log_time_vector(system).to_vec(),
            columns,
        }
    }

    pub fn column(&self, component: &str, port: &str, variable: &str) -> Option<&LogColumn> {
        self.columns
            .iter()
            .find(|c| c.component == component && c.port == port && c.variable == variable)
    }

    /// 某个组件上所有端口的列
    pub fn columns_of<'a>(&'a self, component: &'a str) -> impl Iterator<Item = &'a LogColumn> + 'a {
        self.columns.iter().filter(move |c| c.component == component)
    }

    pub fn num_rows(&self) -> usize {
        self.time.len()
    }

    pub fn to_json(&self) -> KernelResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_json(&self, path: &Path) -> KernelResult<()> {
        fs::write(path, self.to_json()?)?;
        debug!(path = %path.display(), "日志已写出");
        Ok(())
    }
}
