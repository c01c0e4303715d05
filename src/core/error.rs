//! 内核错误类型

use thiserror::Error;

/// 内核操作失败的原因
///
/// 所有可失败的公共操作都返回 [`KernelResult`]，同时会在消息队列中留下一条对应的消息。
#[derive(Debug, Error)]
pub enum KernelError {
    #[error("component type `{0}` is not registered")]
    UnknownComponentType(String),
    #[error("no component named `{0}`")]
    UnknownComponent(String),
    #[error("component `{component}` has no port `{port}`")]
    UnknownPort { component: String, port: String },
    #[error("node type `{0}` is not registered")]
    UnknownNodeType(String),
    #[error("node type mismatch: `{left}` vs `{right}`")]
    NodeTypeMismatch { left: String, right: String },
    #[error("invalid connection: {0}")]
    InvalidConnection(String),
    #[error("ports are not connected: {0}")]
    NotConnected(String),
    #[error("`{op}` is not allowed while {state}")]
    InvalidState { op: &'static str, state: String },
    #[error("name `{0}` is already in use")]
    NameInUse(String),
    #[error("`{0}` is not a valid name")]
    InvalidName(String),
    #[error("algebraic loop among signal components in `{0}`")]
    AlgebraicLoop(String),
    #[error("parameter `{name}`: {reason}")]
    Parameter { name: String, reason: String },
    #[error("expression error: {0}")]
    Expression(String),
    #[error("model check failed with {} error(s)", errors.len())]
    ModelCheck { errors: Vec<String> },
    #[error("initialization failed: {0}")]
    Initialization(String),
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type KernelResult<T> = Result<T, KernelError>;
