//! 工具模块
//!
//! 此模块包含组件库使用的查找表。

// 子模块声明
mod lookup;

// 重新导出公共接口
pub use lookup::LookupTable;
