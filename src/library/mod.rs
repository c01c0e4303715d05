//! 内置演示组件库
//!
//! 只为端到端地驱动内核而存在，并不追求物理模型的完整性。

// 子模块声明
mod hydraulic;
mod mechanic;
mod signal;

use std::sync::Arc;

use crate::component::Registry;
use crate::core::KernelResult;

// 重新导出公共接口
pub use hydraulic::{HydraulicFixedDisplacementPump, HydraulicLaminarOrifice, HydraulicTankC, HydraulicVolume};
pub use mechanic::{MechanicTranslationalMass, MechanicTranslationalSpring};
pub use signal::{SignalConstant, SignalGain, SignalLookup1D, SignalSink, SignalSum, SignalUnitDelay};

pub const HYDRAULIC_VOLUME: &str = "HydraulicVolume";
pub const HYDRAULIC_TANK_C: &str = "HydraulicTankC";
pub const HYDRAULIC_FIXED_DISPLACEMENT_PUMP: &str = "HydraulicFixedDisplacementPump";
pub const HYDRAULIC_LAMINAR_ORIFICE: &str = "HydraulicLaminarOrifice";
pub const MECHANIC_TRANSLATIONAL_MASS: &str = "MechanicTranslationalMass";
pub const MECHANIC_TRANSLATIONAL_SPRING: &str = "MechanicTranslationalSpring";
pub const SIGNAL_CONSTANT: &str = "SignalConstant";
pub const SIGNAL_GAIN: &str = "SignalGain";
pub const SIGNAL_SUM: &str = "SignalSum";
pub const SIGNAL_UNIT_DELAY: &str = "SignalUnitDelay";
pub const SIGNAL_LOOKUP_1D: &str = "SignalLookup1D";
pub const SIGNAL_SINK: &str = "SignalSink";

/// 把全部内置组件注册进 `registry`
pub fn register_default_library(registry: &mut Registry) -> KernelResult<()> {
    registry.register_component(HYDRAULIC_VOLUME, || Box::new(HydraulicVolume::default()))?;
    registry.register_component(HYDRAULIC_TANK_C, || Box::new(HydraulicTankC::default()))?;
    registry.register_component(HYDRAULIC_FIXED_DISPLACEMENT_PUMP, || {
        Box::new(HydraulicFixedDisplacementPump::default())
    })?;
    registry.register_component(HYDRAULIC_LAMINAR_ORIFICE, || {
        Box::new(HydraulicLaminarOrifice::default())
    })?;
    registry.register_component(MECHANIC_TRANSLATIONAL_MASS, || {
        Box::new(MechanicTranslationalMass::default())
    })?;
    registry.register_component(MECHANIC_TRANSLATIONAL_SPRING, || {
        Box::new(MechanicTranslationalSpring::default())
    })?;
    registry.register_component(SIGNAL_CONSTANT, || Box::new(SignalConstant::default()))?;
    registry.register_component(SIGNAL_GAIN, || Box::new(SignalGain::default()))?;
    registry.register_component(SIGNAL_SUM, || Box::new(SignalSum::default()))?;
    registry.register_component(SIGNAL_UNIT_DELAY, || Box::new(SignalUnitDelay::default()))?;
    registry.register_component(SIGNAL_LOOKUP_1D, || Box::new(SignalLookup1D::default()))?;
    registry.register_component(SIGNAL_SINK, || Box::new(SignalSink::default()))?;
    Ok(())
}

/// 内置节点类型加全部演示组件
pub fn default_registry() -> KernelResult<Arc<Registry>> {
    let mut registry = Registry::new();
    register_default_library(&mut registry)?;
    Ok(Arc::new(registry))
}
