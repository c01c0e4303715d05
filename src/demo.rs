//! 演示模型
//!
//! 包含示例液压回路的构建函数和共享类型

use crate::core::{ComponentId, KernelResult};
use crate::library::{
    HYDRAULIC_FIXED_DISPLACEMENT_PUMP, HYDRAULIC_LAMINAR_ORIFICE, HYDRAULIC_TANK_C, HYDRAULIC_VOLUME,
};
use crate::system::Model;

/// 液压回路配置选项
#[derive(Debug, Clone)]
pub struct LineOpts {
    /// 泵排量 m^3/rev
    pub displacement: f64,
    /// 泵转速 rad/s
    pub speed: f64,
    /// 容腔体积 m^3
    pub volume: f64,
    pub bulk_modulus: f64,
    /// 节流孔压力-流量系数
    pub orifice_kc: f64,
    pub tank_pressure: f64,
}

impl Default for LineOpts {
    fn default() -> Self {
        Self {
            displacement: 5.0e-5,
            speed: 100.0,
            volume: 1.0e-3,
            bulk_modulus: 1.0e9,
            orifice_kc: 1.0e-11,
            tank_pressure: 1.0e5,
        }
    }
}

/// 回路中各组件的编号
#[derive(Debug, Clone, Copy)]
pub struct HydraulicLine {
    pub suction_tank: ComponentId,
    pub pump: ComponentId,
    pub volume: ComponentId,
    pub orifice: ComponentId,
    pub return_tank: ComponentId,
}

/// 构建示例液压回路
///
/// 拓扑结构：tank(C) -> pump(Q) -> volume(C) -> orifice(Q) -> tank(C)
pub fn build_hydraulic_line(model: &mut Model, opts: &LineOpts) -> KernelResult<HydraulicLine> {
    let root = model.root();
    let suction_tank = model.add_component(root, HYDRAULIC_TANK_C, "SuctionTank")?;
    let pump = model.add_component(root, HYDRAULIC_FIXED_DISPLACEMENT_PUMP, "Pump")?;
    let volume = model.add_component(root, HYDRAULIC_VOLUME, "Volume")?;
    let orifice = model.add_component(root, HYDRAULIC_LAMINAR_ORIFICE, "Orifice")?;
    let return_tank = model.add_component(root, HYDRAULIC_TANK_C, "ReturnTank")?;

    let text = |v: f64| v.to_string();
    model.set_parameter_value(pump, "D_p", &text(opts.displacement))?;
    model.set_start_value(pump, "n_p", "Value", opts.speed)?;
    model.set_parameter_value(volume, "V", &text(opts.volume))?;
    model.set_parameter_value(volume, "Beta_e", &text(opts.bulk_modulus))?;
    model.set_start_value(orifice, "Kc", "Value", opts.orifice_kc)?;
    for tank in [suction_tank, return_tank] {
        model.set_parameter_value(tank, "p", &text(opts.tank_pressure))?;
    }

    // tank -> pump -> volume -> orifice -> tank
    model.connect(suction_tank, "P1", pump, "P1")?;
    model.connect(pump, "P2", volume, "P1")?;
    model.connect(volume, "P2", orifice, "P1")?;
    model.connect(orifice, "P2", return_tank, "P1")?;

    Ok(HydraulicLine {
        suction_tank,
        pump,
        volume,
        orifice,
        return_tank,
    })
}
