use std::sync::{Arc, Mutex};

use crate::component::{ComponentState, Registry};
use crate::core::{KernelError, MessageKind};
use crate::library::{
    HYDRAULIC_VOLUME, MECHANIC_TRANSLATIONAL_MASS, MECHANIC_TRANSLATIONAL_SPRING,
    register_default_library,
};
use crate::system::Model;

use crate::demo::LineOpts;

use super::components::{Trace, names, register_lifecycle_components, register_test_components};
use super::parallel::fingerprint;
use super::{drain_of, has_message, hydraulic_line, new_model};

fn recorder_model() -> (Model, Trace) {
    let trace: Trace = Arc::new(Mutex::new(Vec::new()));
    let mut registry = Registry::new();
    register_test_components(&mut registry, &trace);
    let mut m = Model::new("Rec", Arc::new(registry));
    let root = m.root();
    // 故意倒序添加
    m.add_component(root, "RecQ", "Q").unwrap();
    m.add_component(root, "RecC", "C").unwrap();
    m.add_component(root, "RecS", "S").unwrap();
    (m, trace)
}

#[test]
fn each_step_runs_signal_then_c_then_q() {
    let (mut m, trace) = recorder_model();
    assert!(m.initialize(0.0, 0.003));
    assert!(m.simulate(0.003));
    assert!(m.finalize());

    let expected: Vec<String> = ["S", "C", "Q", "S", "C", "Q", "S", "C", "Q"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    assert_eq!(names(&trace), expected);

    // 同一步内所有组件看到的时间相同，且已经推进过
    let times: Vec<f64> = trace.lock().unwrap().iter().map(|(_, t)| *t).collect();
    assert_eq!(times[0], times[2]);
    assert!((times[0] - 0.001).abs() < 1e-12);
    assert!((m.time() - 0.003).abs() < 1e-12);
}

#[test]
fn disabling_twice_is_the_same_as_once() {
    let (mut m, trace) = recorder_model();
    let c = m.find_component("C").unwrap();
    m.set_disabled(c, true).unwrap();
    m.set_disabled(c, true).unwrap();
    assert!(m.is_effectively_disabled(c));

    assert!(m.initialize(0.0, 0.002));
    assert!(m.simulate(0.002));
    assert!(m.finalize());
    assert_eq!(names(&trace), vec!["S", "Q", "S", "Q"]);
    assert_eq!(m.component(c).unwrap().time(), 0.0);

    m.set_disabled(c, false).unwrap();
    assert!(!m.is_effectively_disabled(c));
    trace.lock().unwrap().clear();
    assert!(m.initialize(0.0, 0.001));
    assert!(m.simulate(0.001));
    assert_eq!(names(&trace), vec!["S", "C", "Q"]);
}

#[test]
fn reenabled_component_logs_the_same_values_as_never_disabled() {
    const STOP: f64 = 0.02;
    let (mut fresh, fresh_line) = hydraulic_line(&LineOpts::default());
    assert!(fresh.initialize(0.0, STOP));
    assert!(fresh.simulate(STOP));
    let reference = fingerprint(&fresh, &fresh_line);

    let (mut m, line) = hydraulic_line(&LineOpts::default());
    m.set_disabled(line.orifice, true).unwrap();
    m.set_disabled(line.orifice, true).unwrap();
    assert!(m.initialize(0.0, STOP));
    assert!(m.simulate(STOP));
    assert!(m.finalize());
    assert_ne!(fingerprint(&m, &line), reference);

    m.set_disabled(line.orifice, false).unwrap();
    assert!(m.initialize(0.0, STOP));
    assert!(m.simulate(STOP));
    let again = fingerprint(&m, &line);
    assert_eq!(again.len(), reference.len());
    for (a, b) in again.iter().zip(&reference) {
        let bits = |v: &[f64]| v.iter().map(|x| x.to_bits()).collect::<Vec<_>>();
        assert_eq!(bits(a), bits(b));
    }
}

#[test]
fn failed_initialize_finalizes_what_already_started() {
    let trace: Trace = Arc::new(Mutex::new(Vec::new()));
    let mut registry = Registry::new();
    register_lifecycle_components(&mut registry, &trace);
    let mut m = Model::new("HalfStarted", Arc::new(registry));
    let root = m.root();
    m.add_component(root, "Tracked", "First").unwrap();
    m.add_component(root, "Refuses", "Broken").unwrap();
    m.add_component(root, "Tracked", "Never").unwrap();

    assert!(matches!(
        m.try_initialize(0.0, 0.01),
        Err(KernelError::Initialization(_))
    ));
    assert_eq!(names(&trace), vec!["First init", "First finalize"]);
    assert_ne!(m.state(), ComponentState::Initialized);
}

#[test]
fn disabled_subsystem_disables_its_children() {
    let mut m = new_model("DisabledSub");
    let root = m.root();
    let sub = m.add_subsystem(root, "Sub").unwrap();
    let vol = m.add_component(sub, HYDRAULIC_VOLUME, "").unwrap();
    m.set_disabled(sub, true).unwrap();
    assert!(m.is_effectively_disabled(vol));
    // 未连接的容腔被整体跳过，检查可以通过
    assert!(m.check_model_before_simulation());
}

#[test]
fn state_machine_guards_editing_and_simulation() {
    let (mut m, _trace) = recorder_model();
    assert!(!m.simulate(0.01));
    assert!(has_message(&drain_of(&m, MessageKind::Error), "simulate"));

    assert!(m.initialize(0.0, 0.01));
    assert_eq!(m.state(), ComponentState::Initialized);
    let root = m.root();
    assert!(matches!(
        m.add_component(root, "RecS", "Late"),
        Err(KernelError::InvalidState { .. })
    ));

    assert!(m.simulate(0.005));
    assert_eq!(m.state(), ComponentState::Simulating);
    // 可以分段推进
    assert!(m.simulate(0.01));
    assert!((m.time() - 0.01).abs() < 1e-12);

    assert!(m.finalize());
    assert_eq!(m.state(), ComponentState::Finalized);
    assert!(m.add_component(root, "RecS", "Late").is_ok());
}

#[test]
fn stop_before_start_is_rejected() {
    let (mut m, _trace) = recorder_model();
    assert!(!m.initialize(1.0, 0.5));
    assert_ne!(m.state(), ComponentState::Initialized);
}

#[test]
fn unconnected_required_ports_fail_initialize_with_every_violation() {
    let mut m = new_model("Lonely");
    let root = m.root();
    m.add_component(root, HYDRAULIC_VOLUME, "V").unwrap();
    m.messages().clear();

    assert!(!m.initialize(0.0, 1.0));
    assert_eq!(m.state(), ComponentState::Configured);
    let errors = drain_of(&m, MessageKind::Error);
    assert!(has_message(&errors, "Port V.P1 is required but not connected"));
    assert!(has_message(&errors, "Port V.P2 is required but not connected"));
}

#[test]
fn unknown_component_type_becomes_a_placeholder() {
    let mut m = new_model("Missing");
    let root = m.root();
    let id = m.add_component(root, "NoSuchThing", "").unwrap();
    let c = m.component(id).unwrap();
    assert_eq!(c.type_name(), crate::component::MISSING_COMPONENT);
    assert_eq!(c.ports().count(), 0);
    let errors = drain_of(&m, MessageKind::Error);
    assert!(has_message(&errors, "NoSuchThing"));

    assert!(!m.initialize(0.0, 1.0));
    assert!(has_message(&drain_of(&m, MessageKind::Error), "undefined CQS type"));
}

pub(super) fn mass_model() -> (Model, crate::core::ComponentId) {
    let mut registry = Registry::new();
    register_default_library(&mut registry).unwrap();
    let mut m = Model::new("Mass", Arc::new(registry));
    let root = m.root();
    let left = m.add_component(root, MECHANIC_TRANSLATIONAL_SPRING, "Left").unwrap();
    let mass = m.add_component(root, MECHANIC_TRANSLATIONAL_MASS, "Mass").unwrap();
    let right = m.add_component(root, MECHANIC_TRANSLATIONAL_SPRING, "Right").unwrap();
    m.connect(left, "P2", mass, "P1").unwrap();
    m.connect(mass, "P2", right, "P1").unwrap();
    (m, mass)
}

#[test]
fn component_can_stop_the_simulation() {
    let (mut m, mass) = mass_model();
    assert!(m.initialize(0.0, 0.1));
    assert!(m.write_node_safe(mass, "m", 0, 0.0));
    m.messages().clear();

    assert!(!m.simulate(0.1));
    assert!(m.was_simulation_stopped());
    let steps = m.system_data(m.root()).unwrap().total_taken_steps();
    assert_eq!(steps, 0);
    let infos = drain_of(&m, MessageKind::Info);
    assert!(has_message(&infos, "Simulation was stopped"));
    assert!(has_message(&infos, "mass must be positive"));
    assert!(m.finalize());
}

#[test]
fn invalid_mass_fails_initialize() {
    let (mut m, mass) = mass_model();
    m.set_start_value(mass, "m", "Value", -1.0).unwrap();
    m.messages().clear();
    assert!(!m.initialize(0.0, 0.1));
    assert!(has_message(&drain_of(&m, MessageKind::Error), "failed to initialize"));
}

#[test]
fn host_stop_is_cleared_by_the_next_initialize() {
    let (mut m, _trace) = recorder_model();
    assert!(m.initialize(0.0, 0.01));
    m.stop_simulation("host request");
    assert!(!m.simulate(0.01));
    assert!(m.was_simulation_stopped());
    assert!(m.finalize());

    assert!(m.initialize(0.0, 0.01));
    assert!(!m.was_simulation_stopped());
    assert!(m.simulate(0.01));
}

#[test]
fn mass_between_two_springs_runs_to_completion() {
    let (mut m, mass) = mass_model();
    assert!(m.initialize(0.0, 0.1));
    assert!(m.simulate(0.1));
    assert!((m.time() - 0.1).abs() < 1e-12);
    let v = m.read_node_safe(mass, "P2", 0).unwrap();
    assert!(v.is_finite());
    assert!(m.finalize());
}
