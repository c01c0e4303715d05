//! 仿真处理模块
//!
//! 此模块包含运行配置与仿真处理器（单模型与多模型执行）。

// 子模块声明
mod config;
mod handler;

// 重新导出公共接口
pub use config::SimConfig;
pub use handler::{SimulationHandler, distribute_systems, sort_systems_by_total_measured_time};
