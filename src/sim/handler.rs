//! 仿真处理器
//!
//! 在模型之上提供"初始化 → 仿真 → 结束"的便捷入口，并能把多个互不耦合的模型分给多个线程。

use std::thread;

use tracing::{info, instrument, warn};

use crate::sched::{BarrierKind, ParallelAlgorithm, effective_threads, greedy_partition};
use crate::system::Model;

use super::config::SimConfig;

/// 按累计实测耗时降序排列模型
pub fn sort_systems_by_total_measured_time(models: &[Model]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..models.len()).collect();
    order.sort_by_key(|i| std::cmp::Reverse(models[*i].total_measured_time()));
    order
}

/// 贪心地把模型分给 `n` 个线程，返回每个线程负责的模型下标
pub fn distribute_systems(models: &[Model], n: usize) -> Vec<Vec<usize>> {
    let costs: Vec<_> = models.iter().map(Model::total_measured_time).collect();
    greedy_partition(&costs, n)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SimulationHandler {
    barrier: BarrierKind,
}

impl SimulationHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_barrier(barrier: BarrierKind) -> Self {
        Self { barrier }
    }

    /// 先检查，再初始化
    #[instrument(skip(self, model), fields(model = %model.name()))]
    pub fn initialize_system(&self, start: f64, stop: f64, model: &mut Model) -> bool {
        if !model.check_model_before_simulation() {
            warn!("模型检查未通过");
            return false;
        }
        model.initialize(start, stop)
    }

    /// `n_threads < 0` 时单线程
    pub fn simulate_system(
        &self,
        start: f64,
        stop: f64,
        n_threads: i32,
        model: &mut Model,
        no_changes: bool,
        algorithm: ParallelAlgorithm,
    ) -> bool {
        if (model.time() - start).abs() > f64::EPSILON * start.abs().max(1.0) {
            warn!(model_time = model.time(), start, "模型时间与给定的起始时间不一致");
        }
        match usize::try_from(n_threads) {
            Ok(n) => model.simulate_multi_threaded_with(stop, n, no_changes, algorithm, self.barrier),
            Err(_) => model.simulate(stop),
        }
    }

    /// 把多个已初始化的模型分给线程，各自推进到 `stop`
    #[instrument(skip(self, models), fields(n_models = models.len()))]
    pub fn simulate_multiple_systems(&self, stop: f64, n_threads: usize, models: &mut [Model]) -> bool {
        if models.is_empty() {
            return true;
        }
        let mut rank = vec![0usize; models.len()];
        for (r, i) in sort_systems_by_total_measured_time(models).into_iter().enumerate() {
            rank[i] = r;
        }
        let n = effective_threads(n_threads, models.len());
        let mut owner = vec![0usize; models.len()];
        for (tid, bucket) in distribute_systems(models, n).into_iter().enumerate() {
            for i in bucket {
                owner[i] = tid;
            }
        }
        // 调用者的顺序不变；每个线程内按耗时从大到小执行
        let mut buckets: Vec<Vec<(usize, &mut Model)>> = (0..n).map(|_| Vec::new()).collect();
        for (i, m) in models.iter_mut().enumerate() {
            buckets[owner[i]].push((rank[i], m));
        }
        for bucket in &mut buckets {
            bucket.sort_by_key(|(r, _)| *r);
        }
        let ok = thread::scope(|s| {
            let handles: Vec<_> = buckets
                .into_iter()
                .map(|bucket| {
                    s.spawn(move || {
                        bucket
                            .into_iter()
                            .fold(true, |ok, (_, m)| m.simulate(stop) && ok)
                    })
                })
                .collect();
            handles
                .into_iter()
                .fold(true, |ok, h| h.join().unwrap_or(false) && ok)
        });
        info!(threads = n, ok, "多模型仿真结束");
        ok
    }

    pub fn finalize_system(&self, model: &mut Model) -> bool {
        model.finalize()
    }

    /// 一组模型：初始化、一起仿真、结束
    pub fn run_coupled_simulation(&self, models: &mut [Model], start: f64, stop: f64, n_threads: usize) -> bool {
        let mut ok = true;
        for m in models.iter_mut() {
            ok &= self.initialize_system(start, stop, m);
        }
        if !ok {
            return false;
        }
        ok &= self.simulate_multiple_systems(stop, n_threads, models);
        for m in models.iter_mut() {
            ok &= self.finalize_system(m);
        }
        ok
    }

    /// 按配置跑完一个模型的完整生命周期
    #[instrument(skip(self, model, config), fields(model = %model.name()))]
    pub fn run(&self, model: &mut Model, config: &SimConfig) -> bool {
        if let Err(e) = config.apply(model) {
            model.message_sink().error(e.to_string());
            return false;
        }
        if !self.initialize_system(config.start_time, config.stop_time, model) {
            return false;
        }
        let finished = self.simulate_system(
            config.start_time,
            config.stop_time,
            config.threads,
            model,
            config.no_changes,
            config.algorithm,
        );
        self.finalize_system(model) && finished
    }
}
