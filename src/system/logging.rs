//! 日志槽位
//!
//! 一次运行共 `N = round((stop - start) / dt)` 步。初始状态（第 0 步）不记录；
//! 第一个记录的步是时间不早于日志起始时间的第一步（至少第 1 步），
//! 槽位数取请求数与窗口内步数的较小者，记录步在窗口内按四舍五入均匀分布。

use crate::core::{ComponentId, KernelError, KernelResult};

use super::model::Model;

/// 默认请求的日志样本数
pub const DEFAULT_LOG_SAMPLES: usize = 2048;

/// 系统的日志配置
#[derive(Debug, Clone)]
pub struct LogSettings {
    pub(crate) requested_samples: usize,
    pub(crate) log_start: Option<f64>,
    pub(crate) schedule: LogSchedule,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            requested_samples: DEFAULT_LOG_SAMPLES,
            log_start: None,
            schedule: LogSchedule::default(),
        }
    }
}

/// 需要记录的步号（升序、互不相同）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogSchedule {
    steps: Vec<u64>,
}

impl LogSchedule {
    pub fn compute(start: f64, stop: f64, timestep: f64, requested: usize, log_start: f64) -> Self {
        if timestep <= 0.0 || requested == 0 || stop <= start {
            return Self::default();
        }
        let n = ((stop - start) / timestep).round().max(0.0) as u64;
        // 容忍浮点误差：t_k = start + k·dt ≥ log_start
        let first = ((log_start - start) / timestep - 1e-9).ceil().max(1.0) as u64;
        if n == 0 || first > n {
            return Self::default();
        }
        let window = n - first + 1;
        let slots = (requested as u64).min(window);
        let steps = if slots == 1 {
            vec![first]
        } else {
            let span = (n - first) as f64;
            let denom = (slots - 1) as f64;
            (0..slots)
                .map(|k| first + (k as f64 * span / denom).round() as u64)
                .collect()
        };
        Self { steps }
    }

    pub fn num_slots(&self) -> usize {
        self.steps.len()
    }

    pub fn steps(&self) -> &[u64] {
        &self.steps
    }

    /// 第 `step` 步对应的日志行
    #[inline]
    pub fn row_for(&self, step: u64) -> Option<usize> {
        self.steps.binary_search(&step).ok()
    }
}

impl Model {
    pub fn set_num_log_samples(&mut self, system: ComponentId, samples: usize) -> KernelResult<()> {
        let r = self.sys_mut(system).map(|s| s.log.requested_samples = samples);
        self.reported(r)
    }

    pub fn num_log_samples(&self, system: ComponentId) -> Option<usize> {
        self.system_data(system).map(|s| s.log.requested_samples)
    }

    /// 日志起始时间；早于仿真起点时从第 1 步开始记录
    pub fn set_log_start_time(&mut self, system: ComponentId, time: f64) -> KernelResult<()> {
        let r = self.sys_mut(system).map(|s| s.log.log_start = Some(time));
        self.reported(r)
    }

    /// 本次运行实际分配的日志槽位数
    pub fn num_log_slots(&self, system: ComponentId) -> usize {
        self.system_data(system)
            .map(|s| s.log.schedule.num_slots())
            .unwrap_or(0)
    }

    /// 已记录的时间戳
    pub fn log_time_vector(&self, system: ComponentId) -> &[f64] {
        self.system_data(system)
            .map(|s| s.time_log.as_slice())
            .unwrap_or(&[])
    }

    /// 取某个端口所连节点上某个变量的日志列
    pub fn node_log_column(&self, comp: ComponentId, port: &str, variable: &str) -> Option<Vec<f64>> {
        let node = self.node(self.node_of_port(comp, port)?)?;
        let slot = node.data_id_from_name(variable)?;
        Some(node.log().column(slot))
    }

    /// 端口是否希望记录日志；节点只要有一个端口要求就记录
    pub fn set_port_logging(&mut self, comp: ComponentId, port: &str, enable: bool) -> KernelResult<()> {
        let r = self.port_id(comp, port).and_then(|id| {
            self.port_by_id_mut(id)?.set_logging_enabled(enable);
            Ok(())
        });
        self.reported(r)
    }

    /// 为每个系统计算日志槽位并预分配节点日志
    pub(crate) fn setup_logging(&mut self, system: ComponentId, start: f64, stop: f64) -> KernelResult<()> {
        let timestep = self.comp(system)?.timestep;
        let (schedule, nodes) = {
            let sys = self.sys_mut(system)?;
            let log_start = sys.log.log_start.unwrap_or(start);
            sys.log.schedule =
                LogSchedule::compute(start, stop, timestep, sys.log.requested_samples, log_start);
            sys.time_log = Vec::with_capacity(sys.log.schedule.num_slots());
            sys.total_taken_steps = 0;
            (sys.log.schedule.clone(), sys.sub_nodes.clone())
        };
        for id in nodes {
            let wants_log = self.node(id).is_some_and(|n| {
                n.attached().iter().any(|a| {
                    self.port_by_id(a.port.port)
                        .map(|p| p.is_logging_enabled() || p.kind().is_multi())
                        .unwrap_or(false)
                })
            });
            let node = self
                .node_mut(id)
                .ok_or_else(|| KernelError::Initialization(format!("node #{} vanished", id.0)))?;
            node.do_log = wants_log;
            if node.is_logging() {
                node.log.preallocate(schedule.num_slots());
            } else {
                node.log.clear();
            }
        }
        for child in self.children_of(system) {
            if self.comp(child)?.is_system() {
                self.setup_logging(child, start, stop)?;
            }
        }
        Ok(())
    }
}
