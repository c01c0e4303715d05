//! 信号组件（S）

use crate::component::{
    Configurable, Configurer, CqsRole, InitContext, PortHandle, StepContext, Steppable,
};
use crate::core::node_types::{NODE_SIGNAL, signal::VALUE};
use crate::core::{DataPtr, KernelResult, PortRequirement};
use crate::util::LookupTable;

/// 常数源
#[derive(Debug, Default)]
pub struct SignalConstant {
    out: PortHandle,
    out_ptr: Option<DataPtr>,
    value: f64,
}

impl Configurable for SignalConstant {
    fn cqs_role(&self) -> CqsRole {
        CqsRole::S
    }

    fn configure(&mut self, cfg: &mut Configurer<'_>) {
        self.out = cfg.add_output_variable("out", "Constant output");
        cfg.add_parameter("y", "Output value", "-", 1.0);
    }
}

impl Steppable for SignalConstant {
    fn initialize(&mut self, ctx: &mut InitContext<'_>) -> KernelResult<()> {
        self.value = ctx.param_f64("y")?;
        let out = ctx.data_ptr(self.out, VALUE)?;
        out.set(self.value);
        self.out_ptr = Some(out);
        Ok(())
    }

    fn simulate_one_timestep(&mut self, _ctx: &StepContext<'_>) {
        if let Some(out) = &self.out_ptr {
            out.set(self.value);
        }
    }
}

/// 增益 `out = k·in`
#[derive(Debug, Default)]
pub struct SignalGain {
    input: PortHandle,
    out: PortHandle,
    ptrs: Option<(DataPtr, DataPtr)>,
    k: f64,
}

impl Configurable for SignalGain {
    fn cqs_role(&self) -> CqsRole {
        CqsRole::S
    }

    fn configure(&mut self, cfg: &mut Configurer<'_>) {
        self.input = cfg.add_input_variable("in", "Input", 0.0);
        self.out = cfg.add_output_variable("out", "Amplified input");
        cfg.add_parameter("k", "Gain", "-", 1.0);
    }
}

impl Steppable for SignalGain {
    fn initialize(&mut self, ctx: &mut InitContext<'_>) -> KernelResult<()> {
        self.k = ctx.param_f64("k")?;
        let (i, o) = (ctx.data_ptr(self.input, VALUE)?, ctx.data_ptr(self.out, VALUE)?);
        o.set(self.k * i.get());
        self.ptrs = Some((i, o));
        Ok(())
    }

    fn simulate_one_timestep(&mut self, _ctx: &StepContext<'_>) {
        if let Some((i, o)) = &self.ptrs {
            o.set(self.k * i.get());
        }
    }
}

/// 多输入求和
#[derive(Debug, Default)]
pub struct SignalSum {
    input: PortHandle,
    out: PortHandle,
    inputs: Vec<DataPtr>,
    out_ptr: Option<DataPtr>,
}

impl Configurable for SignalSum {
    fn cqs_role(&self) -> CqsRole {
        CqsRole::S
    }

    fn configure(&mut self, cfg: &mut Configurer<'_>) {
        self.input = cfg.add_read_multiport("in", NODE_SIGNAL, PortRequirement::NotRequired);
        self.out = cfg.add_output_variable("out", "Sum of all inputs");
    }
}

impl Steppable for SignalSum {
    fn initialize(&mut self, ctx: &mut InitContext<'_>) -> KernelResult<()> {
        self.inputs = ctx.sub_data_ptrs(self.input, VALUE)?;
        self.out_ptr = Some(ctx.data_ptr(self.out, VALUE)?);
        self.simulate_sum();
        Ok(())
    }

    fn simulate_one_timestep(&mut self, _ctx: &StepContext<'_>) {
        self.simulate_sum();
    }
}

impl SignalSum {
    fn simulate_sum(&self) {
        if let Some(out) = &self.out_ptr {
            out.set(self.inputs.iter().map(DataPtr::get).sum());
        }
    }
}

/// 单位延迟：输出上一步的输入，可以打断代数环
#[derive(Debug, Default)]
pub struct SignalUnitDelay {
    input: PortHandle,
    out: PortHandle,
    ptrs: Option<(DataPtr, DataPtr)>,
    previous: f64,
}

impl Configurable for SignalUnitDelay {
    fn cqs_role(&self) -> CqsRole {
        CqsRole::S
    }

    fn configure(&mut self, cfg: &mut Configurer<'_>) {
        self.input = cfg.add_input_variable("in", "Input", 0.0);
        self.out = cfg.add_output_variable("out", "Input delayed one timestep");
        cfg.set_breaks_algebraic_loops();
    }
}

impl Steppable for SignalUnitDelay {
    fn initialize(&mut self, ctx: &mut InitContext<'_>) -> KernelResult<()> {
        let (i, o) = (ctx.data_ptr(self.input, VALUE)?, ctx.data_ptr(self.out, VALUE)?);
        // 第一步输出起始值
        self.previous = o.get();
        self.ptrs = Some((i, o));
        Ok(())
    }

    fn simulate_one_timestep(&mut self, _ctx: &StepContext<'_>) {
        if let Some((i, o)) = &self.ptrs {
            o.set(self.previous);
            self.previous = i.get();
        }
    }
}

/// 一维查找表，表格以 `"x0,y0;x1,y1;..."` 文本参数给出
#[derive(Debug, Default)]
pub struct SignalLookup1D {
    input: PortHandle,
    out: PortHandle,
    ptrs: Option<(DataPtr, DataPtr)>,
    table: Option<LookupTable>,
}

impl Configurable for SignalLookup1D {
    fn cqs_role(&self) -> CqsRole {
        CqsRole::S
    }

    fn configure(&mut self, cfg: &mut Configurer<'_>) {
        self.input = cfg.add_input_variable("in", "Lookup key", 0.0);
        self.out = cfg.add_output_variable("out", "Interpolated value");
        cfg.add_parameter("table", "Lookup data as x,y;x,y;...", "-", "0,0;1,1");
    }
}

impl Steppable for SignalLookup1D {
    fn initialize(&mut self, ctx: &mut InitContext<'_>) -> KernelResult<()> {
        let mut table = LookupTable::parse_1d(&ctx.param_str("table")?)?;
        if !table.is_ascending() {
            ctx.warning("lookup index is not strictly increasing, sorting it");
            table.sort()?;
        }
        let (i, o) = (ctx.data_ptr(self.input, VALUE)?, ctx.data_ptr(self.out, VALUE)?);
        o.set(table.interpolate_1d(i.get()));
        self.ptrs = Some((i, o));
        self.table = Some(table);
        Ok(())
    }

    fn simulate_one_timestep(&mut self, _ctx: &StepContext<'_>) {
        if let (Some((i, o)), Some(table)) = (&self.ptrs, &self.table) {
            o.set(table.interpolate_1d(i.get()));
        }
    }
}

/// 信号汇：只用来把信号接入日志
#[derive(Debug, Default)]
pub struct SignalSink {
    input: PortHandle,
}

impl Configurable for SignalSink {
    fn cqs_role(&self) -> CqsRole {
        CqsRole::S
    }

    fn configure(&mut self, cfg: &mut Configurer<'_>) {
        self.input = cfg.add_read_multiport("in", NODE_SIGNAL, PortRequirement::NotRequired);
    }
}

impl Steppable for SignalSink {
    fn initialize(&mut self, ctx: &mut InitContext<'_>) -> KernelResult<()> {
        ctx.sub_data_ptrs(self.input, VALUE).map(|_| ())
    }

    fn simulate_one_timestep(&mut self, _ctx: &StepContext<'_>) {}
}
