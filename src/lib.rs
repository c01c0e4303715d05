//! TLM 物理系统仿真内核
//!
//! 组件通过类型化端口共享节点数据，传输线（TLM）耦合让同一阶段的 C、Q 组件互不依赖，
//! 从而可以逐步锁步地并行执行。

pub mod component;
pub mod core;
pub mod demo;
pub mod export;
pub mod library;
pub mod sched;
pub mod sim;
pub mod system;
pub mod util;

#[cfg(test)]
mod test;
