//! 生命周期：初始化、仿真、结束
//!
//! 面向宿主的 `initialize` / `simulate` / `finalize` 只返回布尔值，细节都在消息队列里；
//! 对应的 `try_*` 版本返回 [`KernelResult`]，供 [`crate::sim::SimulationHandler`] 使用。

use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};

use crate::component::{ComponentKind, ComponentState, InitContext};
use crate::core::{ComponentId, KernelError, KernelResult};

use super::exec::{ExecUnit, StepEnv};
use super::model::Model;

impl Model {
    fn ensure_state(&self, op: &'static str, allowed: &[ComponentState]) -> KernelResult<()> {
        let state = self.state();
        if allowed.contains(&state) {
            Ok(())
        } else {
            Err(KernelError::InvalidState {
                op,
                state: state.to_string(),
            })
        }
    }

    pub(crate) fn set_all_states(&mut self, state: ComponentState) {
        for c in self.components.iter_mut().flatten() {
            c.state = state;
        }
    }

    /// 根系统的当前仿真时间
    pub fn time(&self) -> f64 {
        self.component(Self::ROOT).map(|c| c.time).unwrap_or(0.0)
    }

    /// 检查、排序、调整时间步、装载起始值、分配日志并初始化所有组件
    #[instrument(skip(self), fields(model = %self.name()))]
    pub fn initialize(&mut self, start: f64, stop: f64) -> bool {
        match self.try_initialize(start, stop) {
            Ok(()) => true,
            Err(e) => {
                // 检查失败与代数环已经逐条排队
                if !matches!(e, KernelError::ModelCheck { .. } | KernelError::AlgebraicLoop(_)) {
                    self.messages.error(e.to_string());
                }
                warn!(error = %e, "❌ 初始化失败");
                false
            }
        }
    }

    pub fn try_initialize(&mut self, start: f64, stop: f64) -> KernelResult<()> {
        self.ensure_state(
            "initialize",
            &[
                ComponentState::Unconfigured,
                ComponentState::Configured,
                ComponentState::Initialized,
                ComponentState::Finalized,
            ],
        )?;
        if stop < start {
            return Err(KernelError::Initialization(format!(
                "stop time {stop} is before start time {start}"
            )));
        }
        self.cancel.reset();
        self.set_all_states(ComponentState::Configured);

        let errors = self.collect_model_errors();
        if !errors.is_empty() {
            for e in &errors {
                self.messages.error(e.clone());
            }
            return Err(KernelError::ModelCheck { errors });
        }

        self.sort_all_signal_vectors(Self::ROOT)?;
        self.adjust_timesteps(Self::ROOT)?;
        self.load_start_values_into_nodes();
        self.setup_logging(Self::ROOT, start, stop)?;

        for c in self.components.iter_mut().flatten() {
            c.time = start;
            c.measured_time = Duration::ZERO;
        }
        self.start_time = start;
        self.stop_time = stop;

        let mut initialized = Vec::new();
        for id in self.component_ids() {
            if self.is_effectively_disabled(id) {
                continue;
            }
            if let Err(e) = self.initialize_component(id, start, stop) {
                // 已初始化的组件要收尾，失败的那个不算
                for done in initialized {
                    self.finalize_component(done);
                }
                return Err(e);
            }
            initialized.push(id);
        }

        self.set_all_states(ComponentState::Initialized);
        info!(start, stop, timestep = self.comp(Self::ROOT)?.timestep, "✅ 模型已初始化");
        Ok(())
    }

    fn initialize_component(&mut self, id: ComponentId, start: f64, stop: f64) -> KernelResult<()> {
        let behavior = match &mut self.comp_mut(id)?.kind {
            ComponentKind::Leaf(b) => b.take(),
            ComponentKind::System(_) => None,
        };
        let Some(mut behavior) = behavior else {
            return Ok(());
        };
        let result = {
            let c = self.comp(id)?;
            let mut ctx = InitContext {
                name: &c.name,
                ports: &c.ports,
                nodes: &self.nodes,
                parameters: &c.parameters,
                start_time: start,
                stop_time: stop,
                timestep: c.timestep,
                messages: &self.messages,
            };
            behavior.initialize(&mut ctx)
        };
        let c = self.comp_mut(id)?;
        c.kind = ComponentKind::Leaf(Some(behavior));
        result.map_err(|e| {
            KernelError::Initialization(format!("component {} failed to initialize: {e}", c.name))
        })
    }

    fn finalize_component(&mut self, id: ComponentId) {
        if let Ok(c) = self.comp_mut(id) {
            if let ComponentKind::Leaf(Some(b)) = &mut c.kind {
                b.finalize();
            }
        }
    }

    /// 单线程推进到 `stop`；被中止时返回 `false`
    #[instrument(skip(self), fields(model = %self.name()))]
    pub fn simulate(&mut self, stop: f64) -> bool {
        match self.try_simulate(stop) {
            Ok(finished) => finished,
            Err(e) => {
                self.messages.error(e.to_string());
                false
            }
        }
    }

    pub fn try_simulate(&mut self, stop: f64) -> KernelResult<bool> {
        let mut root = self.begin_run()?;
        let started = Instant::now();
        let env = StepEnv {
            messages: &self.messages,
            cancel: &self.cancel,
        };
        let finished = root.simulate(stop, env);
        self.restore_unit(root);
        info!(
            time = self.time(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            finished,
            "🏁 仿真结束"
        );
        Ok(finished)
    }

    /// 进入仿真状态并取出根执行单元
    pub(crate) fn begin_run(&mut self) -> KernelResult<ExecUnit> {
        self.ensure_state("simulate", &[ComponentState::Initialized, ComponentState::Simulating])?;
        let root = self.take_unit(Self::ROOT)?.ok_or_else(|| KernelError::InvalidState {
            op: "simulate",
            state: "the root system is disabled".to_string(),
        })?;
        self.set_all_states(ComponentState::Simulating);
        Ok(root)
    }

    /// 结束仿真；需要时把节点终值写回起始值
    #[instrument(skip(self), fields(model = %self.name()))]
    pub fn finalize(&mut self) -> bool {
        match self.try_finalize() {
            Ok(()) => true,
            Err(e) => {
                self.messages.error(e.to_string());
                false
            }
        }
    }

    pub fn try_finalize(&mut self) -> KernelResult<()> {
        self.ensure_state("finalize", &[ComponentState::Initialized, ComponentState::Simulating])?;
        for id in self.component_ids() {
            if self.is_effectively_disabled(id) {
                continue;
            }
            self.finalize_component(id);
        }
        for id in self.component_ids() {
            let keep = self
                .component(id)
                .and_then(|c| c.system())
                .is_some_and(|s| s.keep_start_values);
            if keep {
                debug!(system = %self.comp(id)?.name, "保留终值作为起始值");
                self.load_start_values_from_simulation(id)?;
            }
        }
        self.set_all_states(ComponentState::Finalized);
        Ok(())
    }

    /// 请求停止仿真；工作线程在下一个阶段屏障处观察到
    pub fn stop_simulation(&self, reason: &str) {
        if self.cancel.cancel(reason) {
            self.messages.info(format!(
                "Simulation was stopped at t={}: {reason}",
                self.time()
            ));
        }
    }

    pub fn was_simulation_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// 所有叶子组件累计的实测耗时
    pub fn total_measured_time(&self) -> Duration {
        self.components
            .iter()
            .flatten()
            .filter(|c| !c.is_system())
            .map(|c| c.measured_time)
            .sum()
    }
}
