//! 多线程调度模块
//!
//! TLM 耦合带来一步的延迟，同一阶段内的 C（或 Q）组件之间没有数据依赖，
//! 因此可以分给不同线程、不加锁地并行计算。阶段之间用屏障保证 S → C → Q 的顺序。
//! 所有算法的结果与单线程执行逐位一致。

// 子模块声明
mod barrier;
mod distribute;
mod lockstep;
mod offline;
mod parallel_for;
mod task_pool;
mod work_stealing;

use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::core::{KernelError, KernelResult};
use crate::system::Model;
use crate::system::exec::{ExecUnit, StepEnv, substeps};

// 重新导出公共接口
pub use barrier::{BarrierKind, CondvarBarrier, PhaseSync, SpinBarrier};
pub use distribute::{Partition, greedy_partition};

use lockstep::RunSpec;
use task_pool::ClaimOrder;

/// 并行调度算法
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ParallelAlgorithm {
    /// 按实测耗时的静态分配
    #[default]
    Offline,
    /// 共享队列，原子游标领取
    TaskPool,
    /// 共享队列，按每步的确定性置换领取
    RandomTaskPool,
    /// 每线程双端队列 + 窃取
    WorkStealing,
    /// 每阶段临时线程 + 均匀切块
    ParallelFor,
    /// rayon 线程池 + 均匀切块
    ParallelForRayon,
}

impl ParallelAlgorithm {
    pub const ALL: [ParallelAlgorithm; 6] = [
        ParallelAlgorithm::Offline,
        ParallelAlgorithm::TaskPool,
        ParallelAlgorithm::RandomTaskPool,
        ParallelAlgorithm::WorkStealing,
        ParallelAlgorithm::ParallelFor,
        ParallelAlgorithm::ParallelForRayon,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ParallelAlgorithm::Offline => "offline",
            ParallelAlgorithm::TaskPool => "task_pool",
            ParallelAlgorithm::RandomTaskPool => "random_task_pool",
            ParallelAlgorithm::WorkStealing => "work_stealing",
            ParallelAlgorithm::ParallelFor => "parallel_for",
            ParallelAlgorithm::ParallelForRayon => "parallel_for_rayon",
        }
    }
}

impl fmt::Display for ParallelAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParallelAlgorithm {
    type Err = KernelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|a| a.as_str() == key)
            .ok_or_else(|| KernelError::Unsupported(format!("unknown parallel algorithm `{s}`")))
    }
}

/// 实际使用的线程数：0 表示全部核心；不超过核心数与可并行的组件数
pub fn effective_threads(requested: usize, work: usize) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    let n = if requested == 0 { cores } else { requested.min(cores) };
    n.min(work).max(1)
}

impl Model {
    /// 多线程推进到 `stop`；被中止时返回 `false`
    pub fn simulate_multi_threaded(
        &mut self,
        stop: f64,
        n_threads: usize,
        no_changes: bool,
        algorithm: ParallelAlgorithm,
    ) -> bool {
        self.simulate_multi_threaded_with(stop, n_threads, no_changes, algorithm, BarrierKind::Spin)
    }

    pub fn simulate_multi_threaded_with(
        &mut self,
        stop: f64,
        n_threads: usize,
        no_changes: bool,
        algorithm: ParallelAlgorithm,
        barrier: BarrierKind,
    ) -> bool {
        match self.try_simulate_multi_threaded(stop, n_threads, no_changes, algorithm, barrier) {
            Ok(finished) => finished,
            Err(e) => {
                self.messages.error(e.to_string());
                false
            }
        }
    }

    #[instrument(skip(self), fields(model = %self.name()))]
    pub fn try_simulate_multi_threaded(
        &mut self,
        stop: f64,
        n_threads: usize,
        no_changes: bool,
        algorithm: ParallelAlgorithm,
        barrier: BarrierKind,
    ) -> KernelResult<bool> {
        let (c_ids, q_ids) = {
            let sys = self.sys(Self::ROOT)?;
            (sys.c.clone(), sys.q.clone())
        };
        let n = effective_threads(n_threads, c_ids.len().max(q_ids.len()));
        if n <= 1 {
            debug!(requested = n_threads, "只有一个线程可用，退回单线程");
            return self.try_simulate(stop);
        }

        let reuse = no_changes
            && self
                .partition
                .as_ref()
                .is_some_and(|p| p.covers(n, &c_ids, &q_ids));
        if !reuse {
            self.sort_component_vectors_by_measured_time(Self::ROOT)?;
            self.partition = Some(self.partition_system(Self::ROOT, n)?);
        }
        let partition = self.partition.clone().unwrap_or_default();

        let mut root = self.begin_run()?;
        let started = Instant::now();
        let result = {
            let sync = barrier.build(n, self.cancel.clone());
            let env = StepEnv {
                messages: &self.messages,
                cancel: &self.cancel,
            };
            run_root(&mut root, stop, algorithm, &partition, sync.as_ref(), env)
        };
        let elapsed = started.elapsed();
        root.measured += elapsed;
        self.restore_unit(root);
        let finished = result?;
        info!(
            %algorithm,
            threads = n,
            reused_partition = reuse,
            time = self.time(),
            elapsed_ms = elapsed.as_millis() as u64,
            finished,
            "🏁 并行仿真结束"
        );
        Ok(finished)
    }
}

fn run_root(
    root: &mut ExecUnit,
    stop: f64,
    algorithm: ParallelAlgorithm,
    partition: &Partition,
    sync: &dyn PhaseSync,
    env: StepEnv<'_>,
) -> KernelResult<bool> {
    let steps = substeps(root.time, stop, root.timestep);
    let (start, timestep) = (root.time, root.timestep);
    let plan = root.system_plan_mut().ok_or_else(|| KernelError::InvalidState {
        op: "simulate_multi_threaded",
        state: "the root unit is not a system".to_string(),
    })?;
    let spec = RunSpec {
        start,
        timestep,
        steps,
        first_step: plan.taken_steps,
        env,
    };
    let n = sync.num_threads();
    let (done, time) = match algorithm {
        ParallelAlgorithm::Offline => offline::run(plan, partition, sync, spec),
        ParallelAlgorithm::TaskPool => task_pool::run(plan, ClaimOrder::Sequential, partition, sync, spec),
        ParallelAlgorithm::RandomTaskPool => task_pool::run(plan, ClaimOrder::Random, partition, sync, spec),
        ParallelAlgorithm::WorkStealing => work_stealing::run(plan, partition, sync, spec),
        ParallelAlgorithm::ParallelFor => parallel_for::run_threads(plan, n, spec),
        ParallelAlgorithm::ParallelForRayon => parallel_for::run_rayon(plan, n, spec)?,
    };
    plan.taken_steps += done;
    root.time = time;
    Ok(done == steps)
}
