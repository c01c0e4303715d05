//! 组件系统模块
//!
//! 此模块包含顶层 [`Model`]（拥有组件与节点竞技场的组件系统）、连接助手、CQS 推导、
//! 信号排序、模型检查、别名、日志槽位、系统参数以及初始化/仿真/结束的生命周期。

// 子模块声明
mod alias;
mod check;
mod connect;
mod cqs;
pub(crate) mod exec;
mod lifecycle;
mod logging;
mod model;
mod params;
mod sort;
mod structure;

// 重新导出公共接口
pub use alias::{AliasHandler, AliasTarget};
pub use logging::{DEFAULT_LOG_SAMPLES, LogSchedule, LogSettings};
pub use model::{Model, SystemData};
