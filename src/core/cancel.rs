//! 仿真中止标志
//!
//! 电平触发：任何组件或宿主调用 `cancel` 后标志保持置位，工作线程在下一个阶段屏障处观察到它。
//! 原因文本由互斥锁保护，标志本身是缓存行对齐的原子量。

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam::utils::CachePadded;
use parking_lot::Mutex;

struct CancelState {
    cancelled: CachePadded<AtomicBool>,
    reason: Mutex<Option<String>>,
}

/// 可克隆的中止令牌；所有克隆共享同一个标志
#[derive(Clone)]
pub struct CancellationToken {
    state: Arc<CancelState>,
}

impl fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationToken")
            .field("is_cancelled", &self.is_cancelled())
            .finish()
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            state: Arc::new(CancelState {
                cancelled: CachePadded::new(AtomicBool::new(false)),
                reason: Mutex::new(None),
            }),
        }
    }

    /// 置位；只保留第一次的原因，返回这次调用是否真正置位
    pub fn cancel(&self, reason: impl Into<String>) -> bool {
        let mut guard = self.state.reason.lock();
        if self.state.cancelled.load(Ordering::Acquire) {
            return false;
        }
        *guard = Some(reason.into());
        self.state.cancelled.store(true, Ordering::Release);
        true
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::Acquire)
    }

    pub fn reason(&self) -> Option<String> {
        self.state.reason.lock().clone()
    }

    /// 新一轮仿真开始前复位
    pub fn reset(&self) {
        let mut guard = self.state.reason.lock();
        *guard = None;
        self.state.cancelled.store(false, Ordering::Release);
    }
}
