//! 工作窃取调度
//!
//! 每个线程一个 crossbeam 双端队列，阶段开始前装入离线分配给自己的组件；
//! 自己的队列空了就去偷别人的，直到所有队列都空。C、Q 用两套独立的队列。

use crossbeam::deque::{Steal, Stealer, Worker};

use crate::system::exec::{StepEnv, SystemPlan};

use super::barrier::PhaseSync;
use super::distribute::Partition;
use super::lockstep::{Phase, PhaseWork, RunSpec, SharedUnits, run_lockstep, split_shares};

struct Queues {
    c: Worker<usize>,
    q: Worker<usize>,
}

struct StealWork<'p, 'a> {
    tid: usize,
    units: &'p SharedUnits<'a>,
    own_c: Vec<usize>,
    own_q: Vec<usize>,
    queues: Queues,
    c_stealers: &'p [Stealer<usize>],
    q_stealers: &'p [Stealer<usize>],
}

impl StealWork<'_, '_> {
    fn steal(&self, stealers: &[Stealer<usize>]) -> Option<usize> {
        loop {
            let mut retry = false;
            for (j, s) in stealers.iter().enumerate() {
                if j == self.tid {
                    continue;
                }
                match s.steal() {
                    Steal::Success(i) => return Some(i),
                    Steal::Retry => retry = true,
                    Steal::Empty => {}
                }
            }
            if !retry {
                return None;
            }
        }
    }
}

impl PhaseWork for StealWork<'_, '_> {
    fn prepare(&mut self, phase: Phase) {
        let (own, worker) = match phase {
            Phase::C => (&self.own_c, &self.queues.c),
            Phase::Q => (&self.own_q, &self.queues.q),
        };
        for i in own {
            worker.push(*i);
        }
    }

    fn run(&mut self, phase: Phase, time: f64, env: StepEnv<'_>) {
        let (worker, stealers) = match phase {
            Phase::C => (&self.queues.c, self.c_stealers),
            Phase::Q => (&self.queues.q, self.q_stealers),
        };
        while let Some(i) = worker.pop().or_else(|| self.steal(stealers)) {
            self.units.simulate(phase, i, time, env);
        }
    }
}

fn own_indices(owner: &[usize], tid: usize) -> Vec<usize> {
    owner
        .iter()
        .enumerate()
        .filter(|(_, o)| **o == tid)
        .map(|(i, _)| i)
        .collect()
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
    let c_owner: Vec<usize> = partition.owners(Phase::C, c).into_iter().map(|o| o.min(n - 1)).collect();
    let q_owner: Vec<usize> = partition.owners(Phase::Q, q).into_iter().map(|o| o.min(n - 1)).collect();
    let units = SharedUnits::new(c, q);

    let queues: Vec<Queues> = (0..n)
        .map(|_| Queues {
            c: Worker::new_fifo(),
            q: Worker::new_fifo(),
        })
        .collect();
    let c_stealers: Vec<Stealer<usize>> = queues.iter().map(|w| w.c.stealer()).collect();
    let q_stealers: Vec<Stealer<usize>> = queues.iter().map(|w| w.q.stealer()).collect();

    let (shares, schedule) = split_shares(signal, logger, partition, n);
    let threads = shares
        .into_iter()
        .zip(queues)
        .enumerate()
        .map(|(tid, (share, queues))| {
            (
                share,
                StealWork {
                    tid,
                    units: &units,
                    own_c: own_indices(&c_owner, tid),
                    own_q: own_indices(&q_owner, tid),
                    queues,
                    c_stealers: &c_stealers,
                    q_stealers: &q_stealers,
                },
            )
        })
        .collect();
    run_lockstep(threads, sync, schedule, spec)
}
