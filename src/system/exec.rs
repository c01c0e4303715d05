//! 执行计划
//!
//! 每次 `simulate` 前把组件行为和节点日志从竞技场里取出来，组装成一棵 [`ExecUnit`] 树，
//! 运行结束后再原样放回。这样调度器可以把互不相交的 `&mut ExecUnit` 分给不同线程，
//! 组件之间只通过节点缓冲区的原子单元交换数据。

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::component::{ComponentBehavior, ComponentKind, StepContext};
use crate::core::{CancellationToken, ComponentId, KernelError, KernelResult, MessageSink, NodeBuffer, NodeId, NodeLog};

use super::logging::LogSchedule;
use super::model::Model;

/// 步进期间所有单元共享的环境
#[derive(Clone, Copy)]
pub(crate) struct StepEnv<'a> {
    pub(crate) messages: &'a MessageSink,
    pub(crate) cancel: &'a CancellationToken,
}

/// 一个节点的日志写入器（日志缓冲区在运行期间归它所有）
pub(crate) struct NodeLogger {
    pub(crate) id: NodeId,
    pub(crate) buffer: NodeBuffer,
    pub(crate) log: NodeLog,
    pub(crate) enabled: bool,
}

impl NodeLogger {
    #[inline]
    pub(crate) fn log_row(&mut self, row: usize) {
        if self.enabled {
            self.log.log_row(row, &self.buffer);
        }
    }
}

pub(crate) struct PlanLogger {
    pub(crate) schedule: LogSchedule,
    pub(crate) time: Vec<f64>,
    pub(crate) nodes: Vec<NodeLogger>,
}

impl PlanLogger {
    /// 第 `step` 步在日志计划里时写一行
    fn log_step(&mut self, step: u64, time: f64) {
        if let Some(row) = self.schedule.row_for(step) {
            self.time.push(time);
            for n in &mut self.nodes {
                n.log_row(row);
            }
        }
    }
}

/// 子系统的执行计划：三个阶段的单元表与日志
pub(crate) struct SystemPlan {
    pub(crate) signal: Vec<ExecUnit>,
    pub(crate) c: Vec<ExecUnit>,
    pub(crate) q: Vec<ExecUnit>,
    pub(crate) logger: PlanLogger,
    pub(crate) taken_steps: u64,
}

impl SystemPlan {
    /// 一步：S → C → Q → 日志；每个阶段之前观察中止标志
    fn step(&mut self, time: f64, env: StepEnv<'_>) -> bool {
        if env.cancel.is_cancelled() {
            return false;
        }
        for u in &mut self.signal {
            u.simulate(time, env);
        }
        if env.cancel.is_cancelled() {
            return false;
        }
        for u in &mut self.c {
            u.simulate(time, env);
        }
        if env.cancel.is_cancelled() {
            return false;
        }
        for u in &mut self.q {
            u.simulate(time, env);
        }
        if env.cancel.is_cancelled() {
            return false;
        }
        self.taken_steps += 1;
        self.logger.log_step(self.taken_steps, time);
        true
    }

    pub(crate) fn log_step(&mut self, step: u64, time: f64) {
        self.logger.log_step(step, time);
    }
}

pub(crate) enum UnitKind {
    Leaf(Box<dyn ComponentBehavior>),
    System(SystemPlan),
}

/// 计划中的一个组件
pub(crate) struct ExecUnit {
    pub(crate) id: ComponentId,
    pub(crate) name: Arc<str>,
    pub(crate) time: f64,
    pub(crate) timestep: f64,
    pub(crate) measured: Duration,
    pub(crate) kind: UnitKind,
}

/// 从 `time` 推进到 `stop` 需要的子步数
#[inline]
pub(crate) fn substeps(time: f64, stop: f64, timestep: f64) -> u64 {
    if timestep <= 0.0 {
        return 0;
    }
    ((stop - time) / timestep + 0.5).floor().max(0.0) as u64
}

impl ExecUnit {
    /// 推进到 `stop`；因中止提前结束时返回 `false`
    pub(crate) fn simulate(&mut self, stop: f64, env: StepEnv<'_>) -> bool {
        let started = Instant::now();
        let n = substeps(self.time, stop, self.timestep);
        let mut finished = true;
        for _ in 0..n {
            if !self.step(env) {
                finished = false;
                break;
            }
        }
        self.measured += started.elapsed();
        finished
    }

    fn step(&mut self, env: StepEnv<'_>) -> bool {
        let ExecUnit {
            name,
            time,
            timestep,
            kind,
            ..
        } = self;
        *time += *timestep;
        match kind {
            UnitKind::Leaf(behavior) => {
                let ctx = StepContext {
                    name,
                    time: *time,
                    timestep: *timestep,
                    messages: env.messages,
                    cancel: env.cancel,
                };
                behavior.simulate_one_timestep(&ctx);
                true
            }
            UnitKind::System(plan) => plan.step(*time, env),
        }
    }

    pub(crate) fn system_plan_mut(&mut self) -> Option<&mut SystemPlan> {
        match &mut self.kind {
            UnitKind::System(p) => Some(p),
            UnitKind::Leaf(_) => None,
        }
    }
}

impl Model {
    /// 取出一个组件（递归地）组成执行单元；禁用的组件返回 `None`
    pub(crate) fn take_unit(&mut self, id: ComponentId) -> KernelResult<Option<ExecUnit>> {
        let (name, time, timestep, disabled, is_system) = {
            let c = self.comp(id)?;
            (Arc::<str>::from(c.name.as_str()), c.time, c.timestep, c.disabled, c.is_system())
        };
        if disabled {
            return Ok(None);
        }
        let kind = if is_system {
            let (signal, c, q, schedule, sub_nodes, taken_steps, time_log) = {
                let sys = self.sys_mut(id)?;
                (
                    sys.signal.clone(),
                    sys.c.clone(),
                    sys.q.clone(),
                    sys.log.schedule.clone(),
                    sys.sub_nodes.clone(),
                    sys.total_taken_steps,
                    std::mem::take(&mut sys.time_log),
                )
            };
            let mut take_all = |ids: Vec<ComponentId>| -> KernelResult<Vec<ExecUnit>> {
                let mut units = Vec::with_capacity(ids.len());
                for cid in ids {
                    if let Some(u) = self.take_unit(cid)? {
                        units.push(u);
                    }
                }
                Ok(units)
            };
            let signal = take_all(signal)?;
            let c = take_all(c)?;
            let q = take_all(q)?;
            let nodes = sub_nodes
                .into_iter()
                .filter_map(|nid| {
                    let node = self.node_mut(nid)?;
                    Some(NodeLogger {
                        id: nid,
                        buffer: Arc::clone(node.buffer()),
                        enabled: node.is_logging(),
                        log: std::mem::take(&mut node.log),
                    })
                })
                .collect();
            UnitKind::System(SystemPlan {
                signal,
                c,
                q,
                logger: PlanLogger {
                    schedule,
                    time: time_log,
                    nodes,
                },
                taken_steps,
            })
        } else {
            let c = self.comp_mut(id)?;
            match &mut c.kind {
                ComponentKind::Leaf(b) => UnitKind::Leaf(b.take().ok_or_else(|| {
                    KernelError::InvalidState {
                        op: "simulate",
                        state: format!("behavior of `{}` is already running", c.name),
                    }
                })?),
                ComponentKind::System(_) => {
                    return Err(KernelError::InvalidState {
                        op: "simulate",
                        state: format!("`{}` changed kind during planning", c.name),
                    });
                }
            }
        };
        Ok(Some(ExecUnit {
            id,
            name,
            time,
            timestep,
            measured: Duration::ZERO,
            kind,
        }))
    }

    /// 把执行单元的状态与所有权放回竞技场
    pub(crate) fn restore_unit(&mut self, unit: ExecUnit) {
        let ExecUnit {
            id,
            time,
            measured,
            kind,
            ..
        } = unit;
        if let Ok(c) = self.comp_mut(id) {
            c.time = time;
            c.measured_time += measured;
        }
        match kind {
            UnitKind::Leaf(b) => {
                if let Ok(c) = self.comp_mut(id) {
                    c.kind = ComponentKind::Leaf(Some(b));
                }
            }
            UnitKind::System(plan) => {
                let SystemPlan {
                    signal,
                    c,
                    q,
                    logger,
                    taken_steps,
                } = plan;
                for u in signal.into_iter().chain(c).chain(q) {
                    self.restore_unit(u);
                }
                for nl in logger.nodes {
                    if let Some(node) = self.node_mut(nl.id) {
                        node.log = nl.log;
                    }
                }
                if let Ok(sys) = self.sys_mut(id) {
                    sys.time_log = logger.time;
                    sys.total_taken_steps = taken_steps;
                }
            }
        }
    }
}
