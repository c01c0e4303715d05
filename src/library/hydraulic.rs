//! 液压组件
//!
//! C 组件（容腔、油箱）计算波变量 `c` 与特征阻抗 `Zc`；Q 组件（泵、节流孔）由两侧的
//! `c`、`Zc` 计算流量与压力：`p = c + Zc·q`。

use std::f64::consts::PI;

use crate::component::{
    Configurable, Configurer, CqsRole, InitContext, PortHandle, StepContext, Steppable,
};
use crate::core::node_types::{NODE_HYDRAULIC, hydraulic};
use crate::core::{DataPtr, KernelError, KernelResult};

/// 液压节点上常用的四个句柄
#[derive(Debug, Clone)]
struct HydraulicPtrs {
    q: DataPtr,
    p: DataPtr,
    c: DataPtr,
    zc: DataPtr,
}

impl HydraulicPtrs {
    fn resolve(ctx: &InitContext<'_>, h: PortHandle) -> KernelResult<Self> {
        Ok(Self {
            q: ctx.data_ptr(h, hydraulic::FLOW)?,
            p: ctx.data_ptr(h, hydraulic::PRESSURE)?,
            c: ctx.data_ptr(h, hydraulic::WAVE_VARIABLE)?,
            zc: ctx.data_ptr(h, hydraulic::CHAR_IMPEDANCE)?,
        })
    }
}

fn positive(ctx: &InitContext<'_>, name: &str) -> KernelResult<f64> {
    let v = ctx.param_f64(name)?;
    if v > 0.0 {
        Ok(v)
    } else {
        Err(KernelError::Parameter {
            name: name.to_string(),
            reason: format!("must be positive in {}, got {v}", ctx.name()),
        })
    }
}

/// 由两侧波变量计算 Q 组件的流量与压力，负压时按气蚀处理
fn q_side(c1: f64, zc1: f64, c2: f64, zc2: f64, q2_of: impl Fn(f64, f64, f64, f64) -> f64) -> [(f64, f64); 2] {
    let solve = |c1: f64, zc1: f64, c2: f64, zc2: f64| {
        let q2 = q2_of(c1, zc1, c2, zc2);
        let q1 = -q2;
        [(q1, c1 + zc1 * q1), (q2, c2 + zc2 * q2)]
    };
    let [(q1, p1), (q2, p2)] = solve(c1, zc1, c2, zc2);
    if p1 >= 0.0 && p2 >= 0.0 {
        return [(q1, p1), (q2, p2)];
    }
    let (c1, zc1) = if p1 < 0.0 { (0.0, 0.0) } else { (c1, zc1) };
    let (c2, zc2) = if p2 < 0.0 { (0.0, 0.0) } else { (c2, zc2) };
    let [(q1, p1), (q2, p2)] = solve(c1, zc1, c2, zc2);
    [(q1, p1.max(0.0)), (q2, p2.max(0.0))]
}

/// 两端口液压容腔（C）
#[derive(Debug, Default)]
pub struct HydraulicVolume {
    p1: PortHandle,
    p2: PortHandle,
    nodes: Option<[HydraulicPtrs; 2]>,
    zc: f64,
    alpha: f64,
}

impl Configurable for HydraulicVolume {
    fn cqs_role(&self) -> CqsRole {
        CqsRole::C
    }

    fn configure(&mut self, cfg: &mut Configurer<'_>) {
        self.p1 = cfg.add_power_port("P1", NODE_HYDRAULIC);
        self.p2 = cfg.add_power_port("P2", NODE_HYDRAULIC);
        cfg.add_parameter("V", "Volume", "m^3", 1.0e-3);
        cfg.add_parameter("Beta_e", "Bulk modulus", "Pa", 1.0e9);
        cfg.add_parameter("alpha", "Low pass coefficient to dampen standing delayline waves", "-", 0.1);
    }
}

impl Steppable for HydraulicVolume {
    fn initialize(&mut self, ctx: &mut InitContext<'_>) -> KernelResult<()> {
        let volume = positive(ctx, "V")?;
        let bulk = positive(ctx, "Beta_e")?;
        self.alpha = ctx.param_f64("alpha")?;
        if !(0.0..1.0).contains(&self.alpha) {
            return Err(KernelError::Parameter {
                name: "alpha".to_string(),
                reason: format!("must be in [0, 1), got {}", self.alpha),
            });
        }
        self.zc = bulk / volume * ctx.timestep() / (1.0 - self.alpha);
        let nodes = [
            HydraulicPtrs::resolve(ctx, self.p1)?,
            HydraulicPtrs::resolve(ctx, self.p2)?,
        ];
        for n in &nodes {
            n.c.set(n.p.get() + self.zc * n.q.get());
            n.zc.set(self.zc);
        }
        self.nodes = Some(nodes);
        Ok(())
    }

    fn simulate_one_timestep(&mut self, _ctx: &StepContext<'_>) {
        let Some([n1, n2]) = &self.nodes else {
            return;
        };
        let (zc, alpha) = (self.zc, self.alpha);
        let (q1, c1) = (n1.q.get(), n1.c.get());
        let (q2, c2) = (n2.q.get(), n2.c.get());
        let c10 = c2 + 2.0 * zc * q2;
        let c20 = c1 + 2.0 * zc * q1;
        n1.c.set(alpha * c1 + (1.0 - alpha) * c10);
        n2.c.set(alpha * c2 + (1.0 - alpha) * c20);
        n1.zc.set(zc);
        n2.zc.set(zc);
    }
}

/// 恒压油箱（C）
#[derive(Debug, Default)]
pub struct HydraulicTankC {
    p1: PortHandle,
    node: Option<HydraulicPtrs>,
    pressure: f64,
}

impl Configurable for HydraulicTankC {
    fn cqs_role(&self) -> CqsRole {
        CqsRole::C
    }

    fn configure(&mut self, cfg: &mut Configurer<'_>) {
        self.p1 = cfg.add_power_port("P1", NODE_HYDRAULIC);
        cfg.add_parameter("p", "Default pressure", "Pa", 1.0e5);
    }
}

impl Steppable for HydraulicTankC {
    fn initialize(&mut self, ctx: &mut InitContext<'_>) -> KernelResult<()> {
        self.pressure = ctx.param_f64("p")?;
        let n = HydraulicPtrs::resolve(ctx, self.p1)?;
        n.p.set(self.pressure);
        n.c.set(self.pressure);
        n.zc.set(0.0);
        self.node = Some(n);
        Ok(())
    }

    fn simulate_one_timestep(&mut self, _ctx: &StepContext<'_>) {
        if let Some(n) = &self.node {
            n.c.set(self.pressure);
            n.zc.set(0.0);
        }
    }
}

/// 定排量泵（Q），转速来自信号输入
#[derive(Debug, Default)]
pub struct HydraulicFixedDisplacementPump {
    p1: PortHandle,
    p2: PortHandle,
    speed_in: PortHandle,
    nodes: Option<[HydraulicPtrs; 2]>,
    speed: Option<DataPtr>,
    displacement: f64,
    leakage: f64,
}

impl Configurable for HydraulicFixedDisplacementPump {
    fn cqs_role(&self) -> CqsRole {
        CqsRole::Q
    }

    fn configure(&mut self, cfg: &mut Configurer<'_>) {
        self.p1 = cfg.add_power_port("P1", NODE_HYDRAULIC);
        self.p2 = cfg.add_power_port("P2", NODE_HYDRAULIC);
        self.speed_in = cfg.add_input_variable("n_p", "Angular velocity", 100.0);
        cfg.add_parameter("D_p", "Displacement", "m^3/rev", 5.0e-5);
        cfg.add_parameter("C_lp", "Leakage coefficient", "m^5/Ns", 0.0);
    }
}

impl Steppable for HydraulicFixedDisplacementPump {
    fn initialize(&mut self, ctx: &mut InitContext<'_>) -> KernelResult<()> {
        self.displacement = ctx.param_f64("D_p")? / (2.0 * PI);
        self.leakage = ctx.param_f64("C_lp")?;
        self.nodes = Some([
            HydraulicPtrs::resolve(ctx, self.p1)?,
            HydraulicPtrs::resolve(ctx, self.p2)?,
        ]);
        self.speed = Some(ctx.data_ptr(self.speed_in, crate::core::node_types::signal::VALUE)?);
        Ok(())
    }

    fn simulate_one_timestep(&mut self, _ctx: &StepContext<'_>) {
        let (Some([n1, n2]), Some(speed)) = (&self.nodes, &self.speed) else {
            return;
        };
        let (dp, cl, n) = (self.displacement, self.leakage, speed.get());
        let [(q1, p1), (q2, p2)] = q_side(n1.c.get(), n1.zc.get(), n2.c.get(), n2.zc.get(), |c1, zc1, c2, zc2| {
            (n * dp + cl * (c1 - c2)) / ((zc1 + zc2) * cl + 1.0)
        });
        n1.q.set(q1);
        n1.p.set(p1);
        n2.q.set(q2);
        n2.p.set(p2);
    }
}

/// 层流节流孔（Q）
#[derive(Debug, Default)]
pub struct HydraulicLaminarOrifice {
    p1: PortHandle,
    p2: PortHandle,
    kc_in: PortHandle,
    nodes: Option<[HydraulicPtrs; 2]>,
    kc: Option<DataPtr>,
}

impl Configurable for HydraulicLaminarOrifice {
    fn cqs_role(&self) -> CqsRole {
        CqsRole::Q
    }

    fn configure(&mut self, cfg: &mut Configurer<'_>) {
        self.p1 = cfg.add_power_port("P1", NODE_HYDRAULIC);
        self.p2 = cfg.add_power_port("P2", NODE_HYDRAULIC);
        self.kc_in = cfg.add_input_variable("Kc", "Pressure-flow coefficient", 1.0e-11);
    }
}

impl Steppable for HydraulicLaminarOrifice {
    fn initialize(&mut self, ctx: &mut InitContext<'_>) -> KernelResult<()> {
        self.nodes = Some([
            HydraulicPtrs::resolve(ctx, self.p1)?,
            HydraulicPtrs::resolve(ctx, self.p2)?,
        ]);
        self.kc = Some(ctx.data_ptr(self.kc_in, crate::core::node_types::signal::VALUE)?);
        Ok(())
    }

    fn simulate_one_timestep(&mut self, _ctx: &StepContext<'_>) {
        let (Some([n1, n2]), Some(kc)) = (&self.nodes, &self.kc) else {
            return;
        };
        let kc = kc.get().abs();
        let [(q1, p1), (q2, p2)] = q_side(n1.c.get(), n1.zc.get(), n2.c.get(), n2.zc.get(), |c1, zc1, c2, zc2| {
            kc * (c1 - c2) / (1.0 + kc * (zc1 + zc2))
        });
        n1.q.set(q1);
        n1.p.set(p1);
        n2.q.set(q2);
        n2.p.set(p2);
    }
}
