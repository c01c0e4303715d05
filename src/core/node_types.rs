//! 内置节点类型
//!
//! 每种节点类型都给出数据槽顺序与默认值；槽位常量供组件在 `initialize` 里解析句柄。

use super::node::{NodeDataRole, NodeType};

pub const NODE_SIGNAL: &str = "NodeSignal";
pub const NODE_HYDRAULIC: &str = "NodeHydraulic";
pub const NODE_MECHANIC: &str = "NodeMechanic";
pub const NODE_MECHANIC_ROTATIONAL: &str = "NodeMechanicRotational";
pub const NODE_ELECTRIC: &str = "NodeElectric";

/// 信号节点槽位
pub mod signal {
    pub const VALUE: usize = 0;
}

/// 液压节点槽位
pub mod hydraulic {
    pub const FLOW: usize = 0;
    pub const PRESSURE: usize = 1;
    pub const TEMPERATURE: usize = 2;
    pub const WAVE_VARIABLE: usize = 3;
    pub const CHAR_IMPEDANCE: usize = 4;
    pub const HEAT_FLOW: usize = 5;
}

/// 平动机械节点槽位
pub mod mechanic {
    pub const VELOCITY: usize = 0;
    pub const FORCE: usize = 1;
    pub const POSITION: usize = 2;
    pub const WAVE_VARIABLE: usize = 3;
    pub const CHAR_IMPEDANCE: usize = 4;
    pub const EQUIVALENT_MASS: usize = 5;
}

/// 转动机械节点槽位
pub mod mechanic_rotational {
    pub const ANGULAR_VELOCITY: usize = 0;
    pub const TORQUE: usize = 1;
    pub const ANGLE: usize = 2;
    pub const WAVE_VARIABLE: usize = 3;
    pub const CHAR_IMPEDANCE: usize = 4;
    pub const EQUIVALENT_INERTIA: usize = 5;
}

/// 电气节点槽位
pub mod electric {
    pub const CURRENT: usize = 0;
    pub const VOLTAGE: usize = 1;
    pub const WAVE_VARIABLE: usize = 2;
    pub const CHAR_IMPEDANCE: usize = 3;
}

use NodeDataRole::{Default, Flow, Hidden, Intensity, Tlm};

pub fn signal_node() -> NodeType {
    NodeType::new(NODE_SIGNAL).with_slot("Value", "y", "", Default)
}

pub fn hydraulic_node() -> NodeType {
    NodeType::new(NODE_HYDRAULIC)
        .with_slot("Flow", "q", "m^3/s", Flow)
        .with_slot("Pressure", "p", "Pa", Intensity)
        .with_slot("Temperature", "T", "K", Hidden)
        .with_slot("WaveVariable", "c", "Pa", Tlm)
        .with_slot("CharImpedance", "Zc", "Pa s/m^3", Tlm)
        .with_slot("HeatFlow", "Qdot", "W", Hidden)
        .with_default("Pressure", 1e5)
        .with_default("WaveVariable", 1e5)
        .with_default("Temperature", 293.0)
}

pub fn mechanic_node() -> NodeType {
    NodeType::new(NODE_MECHANIC)
        .with_slot("Velocity", "v", "m/s", Flow)
        .with_slot("Force", "f", "N", Intensity)
        .with_slot("Position", "x", "m", Default)
        .with_slot("WaveVariable", "c", "N", Tlm)
        .with_slot("CharImpedance", "Zc", "N s/m", Tlm)
        .with_slot("EquivalentMass", "me", "kg", Default)
        .with_default("EquivalentMass", 1.0)
}

pub fn mechanic_rotational_node() -> NodeType {
    NodeType::new(NODE_MECHANIC_ROTATIONAL)
        .with_slot("AngularVelocity", "w", "rad/s", Flow)
        .with_slot("Torque", "T", "Nm", Intensity)
        .with_slot("Angle", "a", "rad", Default)
        .with_slot("WaveVariable", "c", "Nm", Tlm)
        .with_slot("CharImpedance", "Zc", "Nm s/rad", Tlm)
        .with_slot("EquivalentInertia", "Je", "kg m^2", Hidden)
        .with_default("EquivalentInertia", 1.0)
}

pub fn electric_node() -> NodeType {
    NodeType::new(NODE_ELECTRIC)
        .with_slot("Current", "i", "A", Flow)
        .with_slot("Voltage", "U", "V", Intensity)
        .with_slot("WaveVariable", "c", "V", Tlm)
        .with_slot("CharImpedance", "Zc", "V/A", Tlm)
}

/// 注册表构造时登记的全部内置节点类型
pub fn builtin_node_types() -> Vec<NodeType> {
    vec![
        signal_node(),
        hydraulic_node(),
        mechanic_node(),
        mechanic_rotational_node(),
        electric_node(),
    ]
}
