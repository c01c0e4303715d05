//! 标识符类型
//!
//! 定义组件、节点与端口在模型竞技场（arena）中的唯一标识符。

/// 组件标识符（模型组件竞技场中的下标）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(pub usize);

/// 节点标识符（模型节点竞技场中的下标）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// 多端口子端口标识符，在所属多端口内单调递增、不复用
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubPortId(pub u32);

/// 端口标识符：所属组件 + 组件端口表下标
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortId {
    pub component: ComponentId,
    pub index: usize,
}

impl PortId {
    pub fn new(component: ComponentId, index: usize) -> Self {
        Self { component, index }
    }
}

/// 指向一个可连接端点：普通端口，或多端口中的某个子端口
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortRef {
    pub port: PortId,
    pub sub: Option<SubPortId>,
}

impl PortRef {
    pub fn new(port: PortId) -> Self {
        Self { port, sub: None }
    }

    pub fn sub(port: PortId, sub: SubPortId) -> Self {
        Self {
            port,
            sub: Some(sub),
        }
    }

    pub fn component(&self) -> ComponentId {
        self.port.component
    }
}
