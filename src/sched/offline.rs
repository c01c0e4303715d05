//! 离线调度：运行前按实测耗时静态分配，运行中不再移动组件

use crate::system::exec::{ExecUnit, StepEnv, SystemPlan};

use super::barrier::PhaseSync;
use super::distribute::Partition;
use super::lockstep::{Phase, PhaseWork, RunSpec, run_lockstep, split_by_owner, split_shares};

struct OfflineWork<'a> {
    c: Vec<&'a mut ExecUnit>,
    q: Vec<&'a mut ExecUnit>,
}

impl PhaseWork for OfflineWork<'_> {
    fn run(&mut self, phase: Phase, time: f64, env: StepEnv<'_>) {
        let units = match phase {
            Phase::C => &mut self.c,
            Phase::Q => &mut self.q,
        };
        for u in units.iter_mut() {
            u.simulate(time, env);
        }
    }
}

pub(crate) fn run(
    plan: &mut SystemPlan,
    partition: &Partition,
    sync: &dyn PhaseSync,
    spec: RunSpec<'_>,
) -> (u64, f64) {
    let n = sync.num_threads();
    let SystemPlan {
        signal, c, q, logger, ..
    } = plan;
    let c_owner = partition.owners(Phase::C, c);
    let q_owner = partition.owners(Phase::Q, q);
    let c_buckets = split_by_owner(c, &c_owner, n);
    let q_buckets = split_by_owner(q, &q_owner, n);
    let (shares, schedule) = split_shares(signal, logger, partition, n);
    let threads = shares
        .into_iter()
        .zip(c_buckets.into_iter().zip(q_buckets))
        .map(|(share, (c, q))| (share, OfflineWork { c, q }))
        .collect();
    run_lockstep(threads, sync, schedule, spec)
}
