//! 负载分配
//!
//! 贪心装箱：按实测耗时降序，每个组件交给当前总耗时最小的线程，平局取编号最小者。
//! 没有测量过的组件按一个单位计。实测耗时在每次运行中持续累计，所以下一次运行会据此重新平衡。

use std::collections::HashMap;
use std::time::Duration;

use crate::core::{ComponentId, KernelResult, NodeId};
use crate::system::Model;
use crate::system::exec::ExecUnit;

use crate::system::exec::NodeLogger;

use super::lockstep::Phase;

#[inline]
fn weight(cost: Duration) -> u128 {
    cost.as_nanos().max(1)
}

/// 把 `costs` 的下标分给 `n` 个线程
pub fn greedy_partition(costs: &[Duration], n: usize) -> Vec<Vec<usize>> {
    let n = n.max(1);
    let mut order: Vec<usize> = (0..costs.len()).collect();
    // 稳定排序：耗时相同的保持原顺序
    order.sort_by(|a, b| weight(costs[*b]).cmp(&weight(costs[*a])));
    let mut load = vec![0u128; n];
    let mut buckets: Vec<Vec<usize>> = vec![Vec::new(); n];
    for i in order {
        let tid = (0..n).min_by_key(|t| load[*t]).unwrap_or(0);
        load[tid] += weight(costs[i]);
        buckets[tid].push(i);
    }
    buckets
}

/// 每个线程负责的组件
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partition {
    n_threads: usize,
    signal: Vec<Vec<ComponentId>>,
    c: Vec<Vec<ComponentId>>,
    q: Vec<Vec<ComponentId>>,
    nodes: Vec<Vec<NodeId>>,
}

impl Partition {
    pub fn n_threads(&self) -> usize {
        self.n_threads
    }

    pub fn signal(&self) -> &[Vec<ComponentId>] {
        &self.signal
    }

    pub fn c(&self) -> &[Vec<ComponentId>] {
        &self.c
    }

    pub fn q(&self) -> &[Vec<ComponentId>] {
        &self.q
    }

    pub fn node_logs(&self) -> &[Vec<NodeId>] {
        &self.nodes
    }

    /// 分配是否仍然覆盖同样的线程数与组件集合
    pub(crate) fn covers(&self, n_threads: usize, c: &[ComponentId], q: &[ComponentId]) -> bool {
        let same = |buckets: &[Vec<ComponentId>], ids: &[ComponentId]| {
            let mut a: Vec<_> = buckets.iter().flatten().copied().collect();
            let mut b = ids.to_vec();
            a.sort();
            b.sort();
            a == b
        };
        self.n_threads == n_threads && same(&self.c, c) && same(&self.q, q)
    }

    /// 第 i 个节点日志归哪个线程；分配里没有的节点轮转补上
    pub(crate) fn log_owners(&self, logs: &[NodeLogger]) -> Vec<usize> {
        let n = self.n_threads.max(1);
        let map: HashMap<NodeId, usize> = self
            .nodes
            .iter()
            .enumerate()
            .flat_map(|(tid, ids)| ids.iter().map(move |id| (*id, tid)))
            .collect();
        logs.iter()
            .enumerate()
            .map(|(i, l)| map.get(&l.id).copied().unwrap_or(i % n))
            .collect()
    }

    /// 计划中第 i 个单元归哪个线程
    pub(crate) fn owners(&self, phase: Phase, units: &[ExecUnit]) -> Vec<usize> {
        let buckets = match phase {
            Phase::C => &self.c,
            Phase::Q => &self.q,
        };
        let map: HashMap<ComponentId, usize> = buckets
            .iter()
            .enumerate()
            .flat_map(|(tid, ids)| ids.iter().map(move |id| (*id, tid)))
            .collect();
        units
            .iter()
            .map(|u| map.get(&u.id).copied().unwrap_or(0))
            .collect()
    }
}

impl Model {
    fn measured(&self, id: ComponentId) -> Duration {
        self.component(id).map(|c| c.measured_time()).unwrap_or_default()
    }

    /// C、Q 表按实测耗时降序排列（信号表保持拓扑顺序）
    pub fn sort_component_vectors_by_measured_time(&mut self, system: ComponentId) -> KernelResult<()> {
        let (mut c, mut q) = {
            let sys = self.sys(system)?;
            (sys.c.clone(), sys.q.clone())
        };
        c.sort_by_key(|id| std::cmp::Reverse(self.measured(*id)));
        q.sort_by_key(|id| std::cmp::Reverse(self.measured(*id)));
        let sys = self.sys_mut(system)?;
        sys.c = c;
        sys.q = q;
        Ok(())
    }

    fn distribute(&self, ids: &[ComponentId], n: usize) -> Vec<Vec<ComponentId>> {
        let costs: Vec<Duration> = ids.iter().map(|id| self.measured(*id)).collect();
        greedy_partition(&costs, n)
            .into_iter()
            .map(|b| b.into_iter().map(|i| ids[i]).collect())
            .collect()
    }

    pub fn distribute_c_components(&self, system: ComponentId, n: usize) -> KernelResult<Vec<Vec<ComponentId>>> {
        Ok(self.distribute(&self.sys(system)?.c, n))
    }

    pub fn distribute_q_components(&self, system: ComponentId, n: usize) -> KernelResult<Vec<Vec<ComponentId>>> {
        Ok(self.distribute(&self.sys(system)?.q, n))
    }

    /// 信号组件之间有依赖，全部留在 0 号线程并保持排序结果
    pub fn distribute_signal_components(
        &self,
        system: ComponentId,
        n: usize,
    ) -> KernelResult<Vec<Vec<ComponentId>>> {
        let mut buckets = vec![Vec::new(); n.max(1)];
        buckets[0] = self.sys(system)?.signal.clone();
        Ok(buckets)
    }

    /// 节点日志轮转分配
    pub fn distribute_node_logs(&self, system: ComponentId, n: usize) -> KernelResult<Vec<Vec<NodeId>>> {
        let n = n.max(1);
        let mut buckets = vec![Vec::new(); n];
        for (i, id) in self.sys(system)?.sub_nodes.iter().enumerate() {
            buckets[i % n].push(*id);
        }
        Ok(buckets)
    }

    /// 为 `system` 生成完整的分配
    pub fn partition_system(&self, system: ComponentId, n: usize) -> KernelResult<Partition> {
        Ok(Partition {
            n_threads: n.max(1),
            signal: self.distribute_signal_components(system, n)?,
            c: self.distribute_c_components(system, n)?,
            q: self.distribute_q_components(system, n)?,
            nodes: self.distribute_node_logs(system, n)?,
        })
    }

    /// 上一次并行运行使用的分配
    pub fn last_partition(&self) -> Option<&Partition> {
        self.partition.as_ref()
    }
}
