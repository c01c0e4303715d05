//! 平动机械组件

use crate::component::{
    Configurable, Configurer, CqsRole, InitContext, PortHandle, StepContext, Steppable,
};
use crate::core::node_types::{NODE_MECHANIC, mechanic, signal};
use crate::core::{DataPtr, KernelError, KernelResult, PortRequirement};

#[derive(Debug, Clone)]
struct MechanicPtrs {
    v: DataPtr,
    f: DataPtr,
    x: DataPtr,
    c: DataPtr,
    zc: DataPtr,
    me: DataPtr,
}

impl MechanicPtrs {
    fn resolve(ctx: &InitContext<'_>, h: PortHandle) -> KernelResult<Self> {
        Ok(Self {
            v: ctx.data_ptr(h, mechanic::VELOCITY)?,
            f: ctx.data_ptr(h, mechanic::FORCE)?,
            x: ctx.data_ptr(h, mechanic::POSITION)?,
            c: ctx.data_ptr(h, mechanic::WAVE_VARIABLE)?,
            zc: ctx.data_ptr(h, mechanic::CHAR_IMPEDANCE)?,
            me: ctx.data_ptr(h, mechanic::EQUIVALENT_MASS)?,
        })
    }
}

/// 平动质量（Q）
///
/// 隐式欧拉积分 `m·dv/dt = c1 − c2 − (Zc1 + Zc2 + B)·v − k·x`，P2 方向为正。
/// 质量是信号输入，仿真中变得不为正时请求停止仿真。
#[derive(Debug, Default)]
pub struct MechanicTranslationalMass {
    p1: PortHandle,
    p2: PortHandle,
    mass_in: PortHandle,
    nodes: Option<[MechanicPtrs; 2]>,
    mass: Option<DataPtr>,
    damping: f64,
    stiffness: f64,
    timestep: f64,
    v: f64,
    x: f64,
}

impl Configurable for MechanicTranslationalMass {
    fn cqs_role(&self) -> CqsRole {
        CqsRole::Q
    }

    fn configure(&mut self, cfg: &mut Configurer<'_>) {
        self.p1 = cfg.add_power_port("P1", NODE_MECHANIC);
        self.p2 = cfg.add_power_port("P2", NODE_MECHANIC);
        self.mass_in = cfg.add_input_variable("m", "Mass", 1.0);
        cfg.add_parameter("B", "Viscous friction coefficient", "Ns/m", 10.0);
        cfg.add_parameter("k", "Spring coefficient to ground", "N/m", 0.0);
    }
}

impl Steppable for MechanicTranslationalMass {
    fn initialize(&mut self, ctx: &mut InitContext<'_>) -> KernelResult<()> {
        self.damping = ctx.param_f64("B")?;
        self.stiffness = ctx.param_f64("k")?;
        self.timestep = ctx.timestep();
        let nodes = [
            MechanicPtrs::resolve(ctx, self.p1)?,
            MechanicPtrs::resolve(ctx, self.p2)?,
        ];
        let mass = ctx.data_ptr(self.mass_in, signal::VALUE)?;
        if mass.get() <= 0.0 {
            return Err(KernelError::Parameter {
                name: "m".to_string(),
                reason: format!("mass must be positive in {}, got {}", ctx.name(), mass.get()),
            });
        }
        self.v = nodes[1].v.get();
        self.x = nodes[1].x.get();
        for n in &nodes {
            n.me.set(mass.get());
        }
        self.nodes = Some(nodes);
        self.mass = Some(mass);
        Ok(())
    }

    fn simulate_one_timestep(&mut self, ctx: &StepContext<'_>) {
        let (Some([n1, n2]), Some(mass)) = (&self.nodes, &self.mass) else {
            return;
        };
        let m = mass.get();
        if m <= 0.0 {
            ctx.stop_simulation(format!("mass must be positive, got {m}"));
            return;
        }
        let dt = self.timestep;
        let (c1, zc1, c2, zc2) = (n1.c.get(), n1.zc.get(), n2.c.get(), n2.zc.get());
        let den = m + dt * (self.damping + zc1 + zc2) + dt * dt * self.stiffness;
        self.v = (m * self.v + dt * (c1 - c2 - self.stiffness * self.x)) / den;
        self.x += dt * self.v;

        let v1 = -self.v;
        n1.v.set(v1);
        n1.f.set(c1 + zc1 * v1);
        n1.x.set(-self.x);
        n1.me.set(m);
        n2.v.set(self.v);
        n2.f.set(c2 + zc2 * self.v);
        n2.x.set(self.x);
        n2.me.set(m);
    }
}

/// 平动弹簧（C），两端都可以悬空
#[derive(Debug, Default)]
pub struct MechanicTranslationalSpring {
    p1: PortHandle,
    p2: PortHandle,
    nodes: Option<[MechanicPtrs; 2]>,
    zc: f64,
}

impl Configurable for MechanicTranslationalSpring {
    fn cqs_role(&self) -> CqsRole {
        CqsRole::C
    }

    fn configure(&mut self, cfg: &mut Configurer<'_>) {
        self.p1 = cfg.add_power_port_with("P1", NODE_MECHANIC, PortRequirement::NotRequired);
        self.p2 = cfg.add_power_port_with("P2", NODE_MECHANIC, PortRequirement::NotRequired);
        cfg.add_parameter("k", "Spring coefficient", "N/m", 100.0);
    }
}

impl Steppable for MechanicTranslationalSpring {
    fn initialize(&mut self, ctx: &mut InitContext<'_>) -> KernelResult<()> {
        let k = ctx.param_f64("k")?;
        if k <= 0.0 {
            return Err(KernelError::Parameter {
                name: "k".to_string(),
                reason: format!("must be positive in {}, got {k}", ctx.name()),
            });
        }
        self.zc = k * ctx.timestep();
        let nodes = [
            MechanicPtrs::resolve(ctx, self.p1)?,
            MechanicPtrs::resolve(ctx, self.p2)?,
        ];
        let (f1, f2) = (nodes[0].f.get(), nodes[1].f.get());
        nodes[0].c.set(f2);
        nodes[1].c.set(f1);
        for n in &nodes {
            n.zc.set(self.zc);
        }
        self.nodes = Some(nodes);
        Ok(())
    }

    fn simulate_one_timestep(&mut self, _ctx: &StepContext<'_>) {
        let Some([n1, n2]) = &self.nodes else {
            return;
        };
        let zc = self.zc;
        let (c1, v1) = (n1.c.get(), n1.v.get());
        let (c2, v2) = (n2.c.get(), n2.v.get());
        n1.c.set(c2 + 2.0 * zc * v2);
        n2.c.set(c1 + 2.0 * zc * v1);
        n1.zc.set(zc);
        n2.zc.set(zc);
    }
}
