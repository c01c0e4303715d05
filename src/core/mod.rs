//! 内核数据模型
//!
//! 此模块包含节点、端口、参数、表达式求值、消息队列与中止令牌等基础类型。

// 子模块声明
mod cancel;
mod error;
pub mod expr;
mod id;
mod message;
mod node;
pub mod node_types;
mod parameter;
mod port;

// 重新导出公共接口
pub use cancel::CancellationToken;
pub use error::{KernelError, KernelResult};
pub use id::{ComponentId, NodeId, PortId, PortRef, SubPortId};
pub use message::{DEFAULT_MAX_MESSAGES, Message, MessageHandler, MessageKind, MessageSink};
pub use node::{
    DataDescription, DataPtr, Node, NodeAttachment, NodeBuffer, NodeDataRole, NodeLog, NodeType,
    ValueCell,
};
pub use parameter::{Parameter, ParameterSet, ParameterType, ParameterValue};
pub use port::{Port, PortKind, PortLink, PortRequirement, SortHint, SubPort};
