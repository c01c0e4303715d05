//! 任务池调度
//!
//! 每个阶段一个共享的组件下标队列，空闲线程用原子游标领取下一个。
//! 随机变体按每步确定的置换 `(a·k + b) mod len` 领取，`a` 与 `len` 互素。

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use crossbeam::utils::CachePadded;

use crate::system::exec::{StepEnv, SystemPlan};

use super::barrier::PhaseSync;
use super::distribute::Partition;
use super::lockstep::{Phase, PhaseWork, RunSpec, SharedUnits, run_lockstep, split_shares};

/// 领取顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ClaimOrder {
    Sequential,
    Random,
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    x = (x ^ (x >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    x ^ (x >> 31)
}

fn gcd(mut a: usize, mut b: usize) -> usize {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// 某一步、某个阶段的领取置换
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Permutation {
    len: usize,
    a: usize,
    b: usize,
}

impl Permutation {
    pub(crate) fn identity(len: usize) -> Self {
        Self { len, a: 1, b: 0 }
    }

    pub(crate) fn for_step(step: u64, len: usize) -> Self {
        if len <= 1 {
            return Self::identity(len);
        }
        let r = splitmix64(step);
        let mut a = (r % len as u64) as usize;
        while gcd(a, len) != 1 {
            a = (a + 1) % len;
        }
        let b = (splitmix64(r) % len as u64) as usize;
        Self { len, a, b }
    }

    #[inline]
    pub(crate) fn apply(&self, k: usize) -> usize {
        ((self.a as u128 * k as u128 + self.b as u128) % self.len.max(1) as u128) as usize
    }
}

struct Pool<'a> {
    units: SharedUnits<'a>,
    c_next: CachePadded<AtomicUsize>,
    q_next: CachePadded<AtomicUsize>,
    step: AtomicU64,
    order: ClaimOrder,
}

struct PoolWork<'p, 'a> {
    pool: &'p Pool<'a>,
    leader: bool,
}

impl PhaseWork for PoolWork<'_, '_> {
    fn begin_step(&mut self, step: u64) {
        // 上一步的 Q 阶段已在 B3 结束，B0 让其他线程看到复位
        if self.leader {
            self.pool.c_next.store(0, Ordering::Relaxed);
            self.pool.q_next.store(0, Ordering::Relaxed);
            self.pool.step.store(step, Ordering::Relaxed);
        }
    }

    fn run(&mut self, phase: Phase, time: f64, env: StepEnv<'_>) {
        let pool = self.pool;
        let len = pool.units.phase(phase).len();
        let next = match phase {
            Phase::C => &pool.c_next,
            Phase::Q => &pool.q_next,
        };
        let perm = match pool.order {
            ClaimOrder::Sequential => Permutation::identity(len),
            ClaimOrder::Random => {
                let salt = if phase == Phase::C { 0 } else { u64::MAX / 3 };
                Permutation::for_step(pool.step.load(Ordering::Relaxed) ^ salt, len)
            }
        };
        loop {
            let k = next.fetch_add(1, Ordering::Relaxed);
            if k >= len {
                break;
            }
            pool.units.simulate(phase, perm.apply(k), time, env);
        }
    }
}

pub(crate) fn run(
    plan: &mut SystemPlan,
    order: ClaimOrder,
    partition: &Partition,
    sync: &dyn PhaseSync,
    spec: RunSpec<'_>,
) -> (u64, f64) {
    let n = sync.num_threads();
    let SystemPlan {
        signal, c, q, logger, ..
    } = plan;
    let pool = Pool {
        units: SharedUnits::new(c, q),
        c_next: CachePadded::new(AtomicUsize::new(0)),
        q_next: CachePadded::new(AtomicUsize::new(0)),
        step: AtomicU64::new(0),
        order,
    };
    let (shares, schedule) = split_shares(signal, logger, partition, n);
    let threads = shares
        .into_iter()
        .enumerate()
        .map(|(tid, share)| {
            (
                share,
                PoolWork {
                    pool: &pool,
                    leader: tid == 0,
                },
            )
        })
        .collect();
    run_lockstep(threads, sync, schedule, spec)
}
