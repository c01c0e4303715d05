//! 子系统 CQS 角色推导

use tracing::debug;

use crate::component::CqsRole;
use crate::core::{ComponentId, KernelResult, PortKind};

use super::model::Model;
use super::structure::push_role;

impl Model {
    /// 根据直接连在本系统系统端口上的子组件端口推导角色
    ///
    /// 读写端口计为 S，功率端口计为所属组件的角色。只有 C 为 C，只有 Q 为 Q，只有 S 为 S，其余未定义。
    pub fn determine_cqs_type(&mut self, system: ComponentId) -> KernelResult<CqsRole> {
        let (mut c, mut q, mut s) = (0usize, 0usize, 0usize);
        {
            let sys_comp = self.comp(system)?;
            for port in sys_comp.ports().filter(|p| p.kind() == PortKind::System) {
                for r in port.link().connected() {
                    let Some(child) = self.component(r.component()) else {
                        continue;
                    };
                    if child.parent != Some(system) {
                        continue;
                    }
                    let kind = self.port_by_id(r.port)?.kind().sub_kind();
                    if matches!(kind, PortKind::Read | PortKind::Write) {
                        s += 1;
                        continue;
                    }
                    match child.cqs {
                        CqsRole::C => c += 1,
                        CqsRole::Q => q += 1,
                        CqsRole::S => s += 1,
                        CqsRole::Undefined => {}
                    }
                }
            }
        }
        let role = if c > 0 && q == 0 {
            CqsRole::C
        } else if q > 0 && c == 0 {
            CqsRole::Q
        } else if s > 0 && c == 0 && q == 0 {
            CqsRole::S
        } else {
            CqsRole::Undefined
        };
        self.set_cqs(system, role)?;
        Ok(role)
    }

    /// 改变角色并在父系统的角色表之间移动
    fn set_cqs(&mut self, id: ComponentId, role: CqsRole) -> KernelResult<()> {
        let (old, parent) = {
            let c = self.comp(id)?;
            (c.cqs, c.parent)
        };
        if old == role {
            return Ok(());
        }
        debug!(component = %self.comp(id)?.name, from = %old, to = %role, "子系统 CQS 角色变化");
        self.comp_mut(id)?.cqs = role;
        if let Some(parent) = parent {
            let sys = self.sys_mut(parent)?;
            for v in sys.role_vectors_mut() {
                v.retain(|c| *c != id);
            }
            push_role(sys, id, role);
        }
        Ok(())
    }

    /// 从组件所在（或自身）系统开始，逐级向上重新推导
    pub(crate) fn refresh_cqs_from(&mut self, comp: ComponentId) {
        for system in self.system_chain(comp) {
            if system == Self::ROOT {
                continue;
            }
            if let Err(e) = self.determine_cqs_type(system) {
                self.messages.warning(format!("could not determine CQS type: {e}"));
            }
        }
    }
}
