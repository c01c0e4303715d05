//! 阶段屏障
//!
//! 每个时间步有四个屏障（S 前、C 前、Q 前、日志前）。最后一个到达的线程读取中止令牌并
//! 决定本次屏障之后是否继续，所有线程因此得到同一个结论。一旦停下，之后的屏障都返回 `false`。

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crossbeam::utils::{Backoff, CachePadded};
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};

use crate::core::CancellationToken;

/// 阶段同步原语
pub trait PhaseSync: Send + Sync {
    /// 等待所有线程到达；返回 `false` 表示应当停止
    fn wait(&self) -> bool;

    fn num_threads(&self) -> usize;
}

/// 屏障实现的选择
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BarrierKind {
    /// 原子量 + 退避自旋，线程数不超过核数时延迟最低
    #[default]
    Spin,
    /// 互斥锁 + 条件变量
    Blocking,
}

impl BarrierKind {
    pub fn build(self, n_threads: usize, cancel: CancellationToken) -> Box<dyn PhaseSync> {
        match self {
            BarrierKind::Spin => Box::new(SpinBarrier::new(n_threads, cancel)),
            BarrierKind::Blocking => Box::new(CondvarBarrier::new(n_threads, cancel)),
        }
    }
}

/// 自旋屏障
pub struct SpinBarrier {
    n: usize,
    count: CachePadded<AtomicUsize>,
    generation: CachePadded<AtomicUsize>,
    halted: AtomicBool,
    cancel: CancellationToken,
}

impl SpinBarrier {
    pub fn new(n_threads: usize, cancel: CancellationToken) -> Self {
        Self {
            n: n_threads.max(1),
            count: CachePadded::new(AtomicUsize::new(0)),
            generation: CachePadded::new(AtomicUsize::new(0)),
            halted: AtomicBool::new(false),
            cancel,
        }
    }
}

impl PhaseSync for SpinBarrier {
    fn wait(&self) -> bool {
        let generation = self.generation.load(Ordering::Acquire);
        if self.count.fetch_add(1, Ordering::AcqRel) + 1 == self.n {
            if self.cancel.is_cancelled() {
                self.halted.store(true, Ordering::Relaxed);
            }
            self.count.store(0, Ordering::Relaxed);
            self.generation.fetch_add(1, Ordering::Release);
        } else {
            let backoff = Backoff::new();
            while self.generation.load(Ordering::Acquire) == generation {
                backoff.snooze();
            }
        }
        !self.halted.load(Ordering::Relaxed)
    }

    fn num_threads(&self) -> usize {
        self.n
    }
}

#[derive(Debug, Default)]
struct BarrierState {
    count: usize,
    generation: usize,
    halted: bool,
}

/// 阻塞屏障
pub struct CondvarBarrier {
    n: usize,
    state: Mutex<BarrierState>,
    cv: Condvar,
    cancel: CancellationToken,
}

impl CondvarBarrier {
    pub fn new(n_threads: usize, cancel: CancellationToken) -> Self {
        Self {
            n: n_threads.max(1),
            state: Mutex::new(BarrierState::default()),
            cv: Condvar::new(),
            cancel,
        }
    }
}

impl PhaseSync for CondvarBarrier {
    fn wait(&self) -> bool {
        let mut state = self.state.lock();
        let generation = state.generation;
        state.count += 1;
        if state.count == self.n {
            if self.cancel.is_cancelled() {
                state.halted = true;
            }
            state.count = 0;
            state.generation = generation.wrapping_add(1);
            self.cv.notify_all();
        } else {
            while state.generation == generation {
                self.cv.wait(&mut state);
            }
        }
        !state.halted
    }

    fn num_threads(&self) -> usize {
        self.n
    }
}
