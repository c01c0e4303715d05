//! 日志导出
//!
//! 把系统记录的节点日志整理成按列组织的 JSON，供离线画图或对比使用。

mod types;

pub use types::{LogColumn, LogExport};
