use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::component::Registry;
use crate::core::{KernelError, MessageKind};
use crate::demo::{HydraulicLine, LineOpts, build_hydraulic_line};
use crate::sched::{BarrierKind, ParallelAlgorithm, effective_threads, greedy_partition};
use crate::sim::{SimulationHandler, sort_systems_by_total_measured_time};
use crate::system::Model;

use super::components::{Trace, register_test_components};
use super::lifecycle::mass_model;
use super::{drain_of, has_message, hydraulic_line};

const STOP: f64 = 0.05;

/// 日志时间与几个有代表性的节点列
pub(super) fn fingerprint(m: &Model, line: &HydraulicLine) -> Vec<Vec<f64>> {
    let root = m.root();
    vec![
        m.log_time_vector(root).to_vec(),
        m.node_log_column(line.volume, "P1", "Pressure").unwrap(),
        m.node_log_column(line.volume, "P2", "Pressure").unwrap(),
        m.node_log_column(line.orifice, "P2", "Flow").unwrap(),
        m.node_log_column(line.pump, "P1", "Flow").unwrap(),
    ]
}

fn single_threaded_reference() -> Vec<Vec<f64>> {
    let (mut m, line) = hydraulic_line(&LineOpts::default());
    assert!(m.initialize(0.0, STOP));
    assert!(m.simulate(STOP));
    fingerprint(&m, &line)
}

#[test]
fn every_algorithm_matches_single_threaded_results() {
    let reference = single_threaded_reference();
    assert_eq!(reference[0].len(), 50);
    for algorithm in ParallelAlgorithm::ALL {
        let (mut m, line) = hydraulic_line(&LineOpts::default());
        assert!(m.initialize(0.0, STOP));
        assert!(m.simulate_multi_threaded(STOP, 2, false, algorithm), "{algorithm}");
        assert_eq!(fingerprint(&m, &line), reference, "{algorithm}");
        assert_eq!(m.system_data(m.root()).unwrap().total_taken_steps(), 50);
        assert!(m.finalize());
    }
}

#[test]
fn blocking_barrier_gives_the_same_results() {
    let reference = single_threaded_reference();
    let (mut m, line) = hydraulic_line(&LineOpts::default());
    assert!(m.initialize(0.0, STOP));
    assert!(m.simulate_multi_threaded_with(
        STOP,
        2,
        false,
        ParallelAlgorithm::TaskPool,
        BarrierKind::Blocking
    ));
    assert_eq!(fingerprint(&m, &line), reference);
}

#[test]
fn split_parallel_runs_continue_the_log() {
    let reference = single_threaded_reference();
    let (mut m, line) = hydraulic_line(&LineOpts::default());
    assert!(m.initialize(0.0, STOP));
    assert!(m.simulate_multi_threaded(0.02, 2, false, ParallelAlgorithm::Offline));
    assert!(m.simulate_multi_threaded(STOP, 2, true, ParallelAlgorithm::WorkStealing));
    assert_eq!(fingerprint(&m, &line), reference);
}

#[test]
fn greedy_partition_balances_measured_costs() {
    let ns = |v: &[u64]| v.iter().map(|n| Duration::from_nanos(*n)).collect::<Vec<_>>();
    assert_eq!(
        greedy_partition(&ns(&[5, 3, 3, 1]), 2),
        vec![vec![0, 3], vec![1, 2]]
    );
    // 没有测量过的组件每个按一个单位计
    assert_eq!(
        greedy_partition(&ns(&[0, 0, 0, 0]), 2),
        vec![vec![0, 2], vec![1, 3]]
    );
    assert_eq!(greedy_partition(&ns(&[7]), 3), vec![vec![0], vec![], vec![]]);
    assert_eq!(greedy_partition(&[], 0), vec![Vec::<usize>::new()]);
}

#[test]
fn algorithm_names_parse_leniently() {
    assert_eq!(
        "work-stealing".parse::<ParallelAlgorithm>().unwrap(),
        ParallelAlgorithm::WorkStealing
    );
    assert_eq!(
        " Parallel_For_Rayon ".parse::<ParallelAlgorithm>().unwrap(),
        ParallelAlgorithm::ParallelForRayon
    );
    assert!(matches!(
        "bogus".parse::<ParallelAlgorithm>(),
        Err(KernelError::Unsupported(_))
    ));
    for a in ParallelAlgorithm::ALL {
        assert_eq!(a.to_string().parse::<ParallelAlgorithm>().unwrap(), a);
    }
}

#[test]
fn effective_threads_is_bounded_by_cores_and_work() {
    let cores = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
    assert_eq!(effective_threads(0, usize::MAX), cores);
    assert_eq!(effective_threads(5, 0), 1);
    assert_eq!(effective_threads(1, 10), 1);
    assert_eq!(effective_threads(usize::MAX, 3), cores.min(3));
}

#[test]
fn partition_is_reused_only_when_nothing_changed() {
    let (mut m, _line) = hydraulic_line(&LineOpts::default());
    assert!(m.initialize(0.0, STOP));
    assert!(m.simulate_multi_threaded(0.02, 2, false, ParallelAlgorithm::Offline));
    if effective_threads(2, 3) < 2 {
        assert!(m.last_partition().is_none());
        return;
    }
    let first = m.last_partition().cloned().unwrap();
    assert_eq!(first.n_threads(), 2);
    let root = m.root();
    let sys = m.system_data(root).unwrap();
    let mut c: Vec<_> = first.c().iter().flatten().copied().collect();
    let mut expected = sys.c_components().to_vec();
    c.sort();
    expected.sort();
    assert_eq!(c, expected);
    assert_eq!(first.q().iter().flatten().count(), sys.q_components().len());
    assert_eq!(first.signal()[0], sys.signal_components());
    // 节点日志按分配结果分给两个线程，覆盖系统的全部节点
    let mut logged: Vec<_> = first.node_logs().iter().flatten().copied().collect();
    let mut nodes = sys.sub_nodes().to_vec();
    logged.sort();
    nodes.sort();
    assert_eq!(logged, nodes);
    assert!(first.node_logs().iter().all(|b| !b.is_empty()));

    assert!(m.simulate_multi_threaded(STOP, 2, true, ParallelAlgorithm::Offline));
    assert_eq!(m.last_partition(), Some(&first));
}

#[test]
fn component_stop_halts_every_worker() {
    let (mut m, mass) = mass_model();
    assert!(m.initialize(0.0, 0.1));
    assert!(m.write_node_safe(mass, "m", 0, 0.0));
    m.messages().clear();
    assert!(!m.simulate_multi_threaded(0.1, 2, false, ParallelAlgorithm::WorkStealing));
    assert!(m.was_simulation_stopped());
    assert!(m.time() < 0.1);
    assert!(has_message(&drain_of(&m, MessageKind::Info), "mass must be positive"));
    assert!(m.finalize());
}

#[test]
fn panicking_component_is_contained() {
    // 单线程路径不拦截 panic
    if effective_threads(2, 2) < 2 {
        return;
    }
    let trace: Trace = Arc::new(Mutex::new(Vec::new()));
    let mut registry = Registry::new();
    register_test_components(&mut registry, &trace);
    let mut m = Model::new("Panic", Arc::new(registry));
    let root = m.root();
    m.add_component(root, "Panicker", "Boom").unwrap();
    m.add_component(root, "RecC", "C1").unwrap();
    m.add_component(root, "RecC", "C2").unwrap();

    assert!(m.initialize(0.0, 0.01));
    assert!(!m.simulate_multi_threaded(0.01, 2, false, ParallelAlgorithm::Offline));
    assert!(m.was_simulation_stopped());
    assert!(has_message(
        &drain_of(&m, MessageKind::Fatal),
        "a component panicked during a parallel step"
    ));
    // 第三步的 Q 阶段出事，前两步完整
    assert_eq!(m.system_data(root).unwrap().total_taken_steps(), 2);
    assert!(m.finalize());
}

fn named_line(name: &str, displacement: f64) -> Model {
    let registry = Arc::new(super::registry());
    let mut m = Model::new(name, registry);
    let opts = LineOpts {
        displacement,
        ..LineOpts::default()
    };
    build_hydraulic_line(&mut m, &opts).unwrap();
    m
}

#[test]
fn independent_models_run_on_separate_threads() {
    let handler = SimulationHandler::new();
    let mut models = vec![
        named_line("Small", 1e-5),
        named_line("Large", 5e-5),
        named_line("Medium", 3e-5),
    ];
    assert!(handler.run_coupled_simulation(&mut models, 0.0, STOP, 2));

    for m in &models {
        assert!((m.time() - STOP).abs() < 1e-12, "{}", m.name());
        assert_eq!(m.system_data(m.root()).unwrap().total_taken_steps(), 50);
    }
    let final_pressure = |name: &str| {
        let m = models.iter().find(|m| m.name() == name).unwrap();
        let vol = m.find_component("Volume").unwrap();
        *m.node_log_column(vol, "P2", "Pressure").unwrap().last().unwrap()
    };
    assert!(final_pressure("Small") < final_pressure("Medium"));
    assert!(final_pressure("Medium") < final_pressure("Large"));

    let mut alone = named_line("Alone", 3e-5);
    assert!(alone.initialize(0.0, STOP));
    assert!(alone.simulate(STOP));
    let vol = alone.find_component("Volume").unwrap();
    let expected = alone.node_log_column(vol, "P2", "Pressure").unwrap();
    let medium = models.iter().find(|m| m.name() == "Medium").unwrap();
    let vol = medium.find_component("Volume").unwrap();
    assert_eq!(medium.node_log_column(vol, "P2", "Pressure").unwrap(), expected);
}

#[test]
fn multiple_systems_keep_the_callers_order() {
    let handler = SimulationHandler::new();
    let names = ["Small", "Large", "Medium"];
    let mut models: Vec<Model> = names
        .iter()
        .zip([1e-5, 5e-5, 3e-5])
        .map(|(name, d)| named_line(name, d))
        .collect();
    for m in &mut models {
        assert!(m.initialize(0.0, STOP));
    }
    // 先单独跑一段，让实测耗时各不相同
    for (steps, m) in [3.0, 20.0, 10.0].into_iter().zip(models.iter_mut()) {
        assert!(m.simulate(steps * 0.001));
    }
    let order = sort_systems_by_total_measured_time(&models);
    let mut seen = order.clone();
    seen.sort();
    assert_eq!(seen, vec![0, 1, 2]);

    assert!(handler.simulate_multiple_systems(STOP, 2, &mut models));
    let after: Vec<&str> = models.iter().map(Model::name).collect();
    assert_eq!(after, names);
    assert!(models.iter().all(|m| (m.time() - STOP).abs() < 1e-12));
}

#[test]
fn handler_treats_negative_threads_as_single_threaded() {
    let handler = SimulationHandler::new();
    let (mut m, _line) = hydraulic_line(&LineOpts::default());
    assert!(handler.initialize_system(0.0, STOP, &mut m));
    assert!(handler.simulate_system(0.0, STOP, -1, &mut m, false, ParallelAlgorithm::Offline));
    assert!(m.last_partition().is_none());
    assert!(handler.finalize_system(&mut m));
    assert!(handler.simulate_multiple_systems(STOP, 2, &mut []));
}
