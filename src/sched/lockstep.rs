//! 锁步执行框架
//!
//! 固定的一组工作线程在一次 `simulate` 调用内存活。每一步：
//!
//! ```text
//! t += dt ─ B0 ─ S（0 号线程）─ B1 ─ C ─ B2 ─ Q ─ B3 ─ 日志
//! ```
//!
//! 各算法只决定 C、Q 阶段里"谁算哪个组件"，通过 [`PhaseWork`] 接入。

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::thread;

use parking_lot::Mutex;
use tracing::{trace, warn};

use crate::system::LogSchedule;
use crate::system::exec::{ExecUnit, NodeLogger, PlanLogger, StepEnv};

use super::barrier::PhaseSync;
use super::distribute::Partition;

/// 一次并行运行的参数
#[derive(Clone, Copy)]
pub(crate) struct RunSpec<'a> {
    pub(crate) start: f64,
    pub(crate) timestep: f64,
    pub(crate) steps: u64,
    /// 运行开始前系统已经走过的步数（日志行号据此计算）
    pub(crate) first_step: u64,
    pub(crate) env: StepEnv<'a>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    C,
    Q,
}

/// 一个线程在 C、Q 阶段的工作
pub(crate) trait PhaseWork: Send {
    /// 新一步开始，B0 之前
    fn begin_step(&mut self, _step: u64) {}

    /// 阶段开始前的屏障之前调用
    fn prepare(&mut self, _phase: Phase) {}

    fn run(&mut self, phase: Phase, time: f64, env: StepEnv<'_>);
}

/// 每个线程独占的信号组件与日志
pub(crate) struct ThreadShare<'a> {
    signal: &'a mut [ExecUnit],
    time_log: Option<&'a mut Vec<f64>>,
    logs: Vec<&'a mut NodeLogger>,
}

/// 按 `owner[i]` 把元素分进 `n` 个桶
pub(crate) fn split_by_owner<'a, T>(items: &'a mut [T], owner: &[usize], n: usize) -> Vec<Vec<&'a mut T>> {
    let mut buckets: Vec<Vec<&'a mut T>> = (0..n).map(|_| Vec::new()).collect();
    let last = n.saturating_sub(1);
    for (item, o) in items.iter_mut().zip(owner.iter().copied()) {
        buckets[o.min(last)].push(item);
    }
    buckets
}

/// 信号组件与时间向量归 0 号线程，节点日志按分配结果交给各线程
pub(crate) fn split_shares<'a>(
    signal: &'a mut [ExecUnit],
    logger: &'a mut PlanLogger,
    partition: &Partition,
    n: usize,
) -> (Vec<ThreadShare<'a>>, &'a LogSchedule) {
    let PlanLogger {
        schedule,
        time,
        nodes,
    } = logger;
    let owner = partition.log_owners(nodes);
    let mut signal = Some(signal);
    let mut time = Some(time);
    let shares = split_by_owner(nodes, &owner, n)
        .into_iter()
        .map(|logs| ThreadShare {
            signal: signal.take().unwrap_or_default(),
            time_log: time.take(),
            logs,
        })
        .collect();
    (shares, &*schedule)
}

/// C、Q 单元的共享表；每个单元同一时刻只被一个线程锁住
pub(crate) struct SharedUnits<'a> {
    c: Vec<Mutex<&'a mut ExecUnit>>,
    q: Vec<Mutex<&'a mut ExecUnit>>,
}

impl<'a> SharedUnits<'a> {
    pub(crate) fn new(c: &'a mut [ExecUnit], q: &'a mut [ExecUnit]) -> Self {
        Self {
            c: c.iter_mut().map(Mutex::new).collect(),
            q: q.iter_mut().map(Mutex::new).collect(),
        }
    }

    pub(crate) fn phase(&self, phase: Phase) -> &[Mutex<&'a mut ExecUnit>] {
        match phase {
            Phase::C => &self.c,
            Phase::Q => &self.q,
        }
    }

    pub(crate) fn simulate(&self, phase: Phase, idx: usize, time: f64, env: StepEnv<'_>) {
        if let Some(unit) = self.phase(phase).get(idx) {
            unit.lock().simulate(time, env);
        }
    }
}

/// 执行一段组件代码；组件 panic 时请求中止，而不是让 panic 越过屏障
pub(crate) fn guarded(env: StepEnv<'_>, f: impl FnOnce()) {
    if catch_unwind(AssertUnwindSafe(f)).is_err()
        && env.cancel.cancel("a component panicked during a parallel step")
    {
        env.messages
            .fatal("Simulation was stopped: a component panicked during a parallel step");
    }
}

fn worker_loop<W: PhaseWork>(
    tid: usize,
    mut share: ThreadShare<'_>,
    mut work: W,
    sync: &dyn PhaseSync,
    schedule: &LogSchedule,
    spec: RunSpec<'_>,
) -> (u64, f64) {
    let env = spec.env;
    let mut time = spec.start;
    let mut done = 0u64;
    for k in 0..spec.steps {
        time += spec.timestep;
        work.begin_step(spec.first_step + k + 1);
        if !sync.wait() {
            break;
        }
        let signal = &mut *share.signal;
        guarded(env, || {
            for u in signal.iter_mut() {
                u.simulate(time, env);
            }
        });
        work.prepare(Phase::C);
        if !sync.wait() {
            break;
        }
        guarded(env, || work.run(Phase::C, time, env));
        work.prepare(Phase::Q);
        if !sync.wait() {
            break;
        }
        guarded(env, || work.run(Phase::Q, time, env));
        if !sync.wait() {
            break;
        }
        done += 1;
        if let Some(row) = schedule.row_for(spec.first_step + done) {
            if let Some(t) = share.time_log.as_mut() {
                t.push(time);
            }
            for l in share.logs.iter_mut() {
                l.log_row(row);
            }
        }
    }
    trace!(tid, done, "工作线程结束");
    (done, time)
}

/// 启动线程跑完整次运行；返回（完成步数，最终时间），以 0 号线程为准
pub(crate) fn run_lockstep<W: PhaseWork>(
    threads: Vec<(ThreadShare<'_>, W)>,
    sync: &dyn PhaseSync,
    schedule: &LogSchedule,
    spec: RunSpec<'_>,
) -> (u64, f64) {
    debug_assert_eq!(threads.len(), sync.num_threads());
    thread::scope(|s| {
        let mut it = threads.into_iter().enumerate();
        let Some((_, (share0, work0))) = it.next() else {
            return (0, spec.start);
        };
        let handles: Vec<_> = it
            .map(|(tid, (share, work))| {
                s.spawn(move || worker_loop(tid, share, work, sync, schedule, spec))
            })
            .collect();
        let first = worker_loop(0, share0, work0, sync, schedule, spec);
        for h in handles {
            if h.join().is_err() {
                warn!("工作线程异常退出");
            }
        }
        first
    })
}
