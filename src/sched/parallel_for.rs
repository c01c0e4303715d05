//! 并行 for：每个阶段把单元表均匀切块，一块一个任务
//!
//! 线程版在每个阶段用 `std::thread::scope` 临时起线程；rayon 版交给本次运行专用的线程池。
//! 信号阶段与日志都在调用线程上顺序执行。

use std::thread;

use rayon::prelude::*;
use rayon::ThreadPoolBuilder;

use crate::core::{KernelError, KernelResult};
use crate::system::exec::{ExecUnit, StepEnv, SystemPlan};

use super::lockstep::{RunSpec, guarded};

fn chunk_size(len: usize, n: usize) -> usize {
    len.div_ceil(n.max(1)).max(1)
}

/// 顺序驱动一次运行，`phase` 负责并行执行一个阶段
fn drive(plan: &mut SystemPlan, spec: RunSpec<'_>, mut phase: impl FnMut(&mut [ExecUnit], f64, StepEnv<'_>)) -> (u64, f64) {
    let env = spec.env;
    let mut time = spec.start;
    let mut done = 0u64;
    for _ in 0..spec.steps {
        time += spec.timestep;
        if env.cancel.is_cancelled() {
            break;
        }
        guarded(env, || {
            for u in plan.signal.iter_mut() {
                u.simulate(time, env);
            }
        });
        if env.cancel.is_cancelled() {
            break;
        }
        phase(&mut plan.c, time, env);
        if env.cancel.is_cancelled() {
            break;
        }
        phase(&mut plan.q, time, env);
        if env.cancel.is_cancelled() {
            break;
        }
        done += 1;
        plan.log_step(spec.first_step + done, time);
    }
    (done, time)
}

pub(crate) fn run_threads(plan: &mut SystemPlan, n: usize, spec: RunSpec<'_>) -> (u64, f64) {
    drive(plan, spec, |units, time, env| {
        if units.is_empty() {
            return;
        }
        let size = chunk_size(units.len(), n);
        thread::scope(|s| {
            for chunk in units.chunks_mut(size) {
                s.spawn(move || {
                    guarded(env, || {
                        for u in chunk.iter_mut() {
                            u.simulate(time, env);
                        }
                    })
                });
            }
        });
    })
}

pub(crate) fn run_rayon(plan: &mut SystemPlan, n: usize, spec: RunSpec<'_>) -> KernelResult<(u64, f64)> {
    let pool = ThreadPoolBuilder::new()
        .num_threads(n)
        .thread_name(|i| format!("tlm-rayon-{i}"))
        .build()
        .map_err(|e| KernelError::Initialization(format!("could not build thread pool: {e}")))?;
    Ok(drive(plan, spec, |units, time, env| {
        let size = chunk_size(units.len(), n);
        pool.install(|| {
            units.par_chunks_mut(size).for_each(|chunk| {
                guarded(env, || {
                    for u in chunk.iter_mut() {
                        u.simulate(time, env);
                    }
                })
            });
        });
    }))
}
