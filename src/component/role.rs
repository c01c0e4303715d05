//! CQS 角色与组件生命周期状态

use std::fmt;

use serde::{Deserialize, Serialize};

/// 组件在键合图因果约定中的位置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CqsRole {
    /// 计算波变量与特征阻抗
    C,
    /// 由 C 侧输出计算流量、压力等
    Q,
    /// 纯信号
    S,
    /// 未定义（混合子系统、占位组件）
    Undefined,
}

impl fmt::Display for CqsRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CqsRole::C => "C",
            CqsRole::Q => "Q",
            CqsRole::S => "S",
            CqsRole::Undefined => "Undefined",
        };
        f.write_str(s)
    }
}

/// 组件生命周期
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentState {
    Unconfigured,
    Configured,
    Initialized,
    Simulating,
    Finalized,
}

impl ComponentState {
    /// 是否允许修改拓扑或端口
    pub fn is_editable(self) -> bool {
        !matches!(self, ComponentState::Initialized | ComponentState::Simulating)
    }
}

impl fmt::Display for ComponentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ComponentState::Unconfigured => "unconfigured",
            ComponentState::Configured => "configured",
            ComponentState::Initialized => "initialized",
            ComponentState::Simulating => "simulating",
            ComponentState::Finalized => "finalized",
        };
        f.write_str(s)
    }
}
