//! 测试专用组件

use std::sync::{Arc, Mutex};

use crate::component::{
    Configurable, Configurer, CqsRole, InitContext, PortHandle, Registry, StepContext, Steppable,
};
use crate::core::node_types::{NODE_HYDRAULIC, hydraulic};
use crate::core::{DataPtr, KernelError, KernelResult, PortRequirement};

pub(super) type Trace = Arc<Mutex<Vec<(String, f64)>>>;

/// 每步把（名字，时间）记进共享轨迹
pub(super) struct Recorder {
    role: CqsRole,
    trace: Trace,
}

/// 初始化与收尾各记一条（`名字 init` / `名字 finalize`）
#[derive(Default)]
pub(super) struct LifecycleTracker {
    name: String,
    fail: bool,
    trace: Trace,
}

impl Configurable for LifecycleTracker {
    fn cqs_role(&self) -> CqsRole {
        CqsRole::S
    }

    fn configure(&mut self, _cfg: &mut Configurer<'_>) {}
}

impl Steppable for LifecycleTracker {
    fn initialize(&mut self, ctx: &mut InitContext<'_>) -> KernelResult<()> {
        self.name = ctx.name().to_string();
        if self.fail {
            return Err(KernelError::Initialization(format!("{} refuses to start", self.name)));
        }
        self.trace
            .lock()
            .expect("trace lock")
            .push((format!("{} init", self.name), ctx.start_time()));
        Ok(())
    }

    fn simulate_one_timestep(&mut self, _ctx: &StepContext<'_>) {}

    fn finalize(&mut self) {
        self.trace
            .lock()
            .expect("trace lock")
            .push((format!("{} finalize", self.name), 0.0));
    }
}

/// 注册 `Tracked` 与初始化必然失败的 `Refuses`
pub(super) fn register_lifecycle_components(registry: &mut Registry, trace: &Trace) {
    for (name, fail) in [("Tracked", false), ("Refuses", true)] {
        let trace = Arc::clone(trace);
        registry
            .register_component(name, move || {
                Box::new(LifecycleTracker {
                    fail,
                    trace: Arc::clone(&trace),
                    ..LifecycleTracker::default()
                })
            })
            .expect("register lifecycle component");
    }
}

impl Configurable for Recorder {
    fn cqs_role(&self) -> CqsRole {
        self.role
    }

    fn configure(&mut self, _cfg: &mut Configurer<'_>) {}
}

impl Steppable for Recorder {
    fn initialize(&mut self, _ctx: &mut InitContext<'_>) -> KernelResult<()> {
        Ok(())
    }

    fn simulate_one_timestep(&mut self, ctx: &StepContext<'_>) {
        self.trace
            .lock()
            .expect("trace lock")
            .push((ctx.name().to_string(), ctx.time()));
    }
}

/// 时间超过 `at` 后 panic
pub(super) struct Panicker {
    at: f64,
}

impl Configurable for Panicker {
    fn cqs_role(&self) -> CqsRole {
        CqsRole::Q
    }

    fn configure(&mut self, _cfg: &mut Configurer<'_>) {}
}

impl Steppable for Panicker {
    fn initialize(&mut self, _ctx: &mut InitContext<'_>) -> KernelResult<()> {
        Ok(())
    }

    fn simulate_one_timestep(&mut self, ctx: &StepContext<'_>) {
        if ctx.time() > self.at {
            panic!("boom at t={}", ctx.time());
        }
    }
}

/// 液压汇流点（Q）：一个功率多端口，各路共享同一压力
#[derive(Default)]
pub(super) struct Junction {
    port: PortHandle,
    legs: Vec<[DataPtr; 4]>,
}

impl Configurable for Junction {
    fn cqs_role(&self) -> CqsRole {
        CqsRole::Q
    }

    fn configure(&mut self, cfg: &mut Configurer<'_>) {
        self.port = cfg.add_power_multiport("P", NODE_HYDRAULIC, PortRequirement::NotRequired);
    }
}

impl Steppable for Junction {
    fn initialize(&mut self, ctx: &mut InitContext<'_>) -> KernelResult<()> {
        let slot = |s| ctx.sub_data_ptrs(self.port, s);
        let (q, p, c, zc) = (
            slot(hydraulic::FLOW)?,
            slot(hydraulic::PRESSURE)?,
            slot(hydraulic::WAVE_VARIABLE)?,
            slot(hydraulic::CHAR_IMPEDANCE)?,
        );
        self.legs = q
            .into_iter()
            .zip(p)
            .zip(c)
            .zip(zc)
            .map(|(((q, p), c), zc)| [q, p, c, zc])
            .collect();
        Ok(())
    }

    fn simulate_one_timestep(&mut self, _ctx: &StepContext<'_>) {
        let (mut num, mut den) = (0.0, 0.0);
        for [_, _, c, zc] in &self.legs {
            if zc.get() > 0.0 {
                num += c.get() / zc.get();
                den += 1.0 / zc.get();
            }
        }
        if den == 0.0 {
            return;
        }
        let p = num / den;
        for [q, pp, c, zc] in &self.legs {
            pp.set(p);
            if zc.get() > 0.0 {
                q.set((p - c.get()) / zc.get());
            }
        }
    }
}

/// 注册 `Junction`
pub(super) fn register_junction(registry: &mut Registry) {
    registry
        .register_component("Junction", || Box::new(Junction::default()))
        .expect("register junction");
}

/// 注册 `RecS` / `RecC` / `RecQ` 与 `Panicker`
pub(super) fn register_test_components(registry: &mut Registry, trace: &Trace) {
    for (name, role) in [("RecS", CqsRole::S), ("RecC", CqsRole::C), ("RecQ", CqsRole::Q)] {
        let trace = Arc::clone(trace);
        registry
            .register_component(name, move || {
                Box::new(Recorder {
                    role,
                    trace: Arc::clone(&trace),
                })
            })
            .expect("register recorder");
    }
    registry
        .register_component("Panicker", || Box::new(Panicker { at: 0.0025 }))
        .expect("register panicker");
}

pub(super) fn names(trace: &Trace) -> Vec<String> {
    trace
        .lock()
        .expect("trace lock")
        .iter()
        .map(|(n, _)| n.clone())
        .collect()
}
