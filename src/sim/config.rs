//! 运行配置

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::{KernelError, KernelResult};
use crate::sched::ParallelAlgorithm;
use crate::system::{DEFAULT_LOG_SAMPLES, Model};

/// 一次仿真运行的配置（JSON）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub start_time: f64,
    pub stop_time: f64,
    pub timestep: f64,
    pub n_log_samples: usize,
    pub log_start_time: Option<f64>,
    /// 负数表示单线程，0 表示全部核心
    pub threads: i32,
    pub algorithm: ParallelAlgorithm,
    pub no_changes: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            start_time: 0.0,
            stop_time: 1.0,
            timestep: 0.001,
            n_log_samples: DEFAULT_LOG_SAMPLES,
            log_start_time: None,
            threads: -1,
            algorithm: ParallelAlgorithm::Offline,
            no_changes: false,
        }
    }
}

impl SimConfig {
    pub fn from_json(text: &str) -> KernelResult<Self> {
        let cfg: SimConfig = serde_json::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_file(path: impl AsRef<Path>) -> KernelResult<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    pub fn validate(&self) -> KernelResult<()> {
        if self.timestep.is_nan() || self.timestep <= 0.0 {
            return Err(KernelError::Initialization(format!(
                "timestep must be positive, got {}",
                self.timestep
            )));
        }
        if self.stop_time < self.start_time {
            return Err(KernelError::Initialization(format!(
                "stop time {} is before start time {}",
                self.stop_time, self.start_time
            )));
        }
        Ok(())
    }

    /// 把时间步与日志设置写入模型根系统
    pub fn apply(&self, model: &mut Model) -> KernelResult<()> {
        self.validate()?;
        let root = model.root();
        model.set_desired_timestep(root, self.timestep)?;
        model.set_num_log_samples(root, self.n_log_samples)?;
        if let Some(t) = self.log_start_time {
            model.set_log_start_time(root, t)?;
        }
        Ok(())
    }
}
