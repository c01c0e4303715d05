use crate::core::{KernelError, MessageKind};
use crate::library::{SIGNAL_CONSTANT, SIGNAL_GAIN, SIGNAL_SUM, SIGNAL_UNIT_DELAY};

use super::{has_message, new_model};

#[test]
fn signal_chain_is_sorted_by_data_flow() {
    let mut m = new_model("Chain");
    let root = m.root();
    // 故意倒序添加
    let g2 = m.add_component(root, SIGNAL_GAIN, "Gain2").unwrap();
    let g1 = m.add_component(root, SIGNAL_GAIN, "Gain1").unwrap();
    let y = m.add_component(root, SIGNAL_CONSTANT, "Const").unwrap();
    m.set_parameter_value(y, "y", "2").unwrap();
    m.set_parameter_value(g1, "k", "3").unwrap();
    m.set_parameter_value(g2, "k", "4").unwrap();
    m.connect(g1, "out", g2, "in").unwrap();
    m.connect(y, "out", g1, "in").unwrap();

    assert!(m.initialize(0.0, 0.001));
    assert_eq!(
        m.system_data(root).unwrap().signal_components(),
        &[y, g1, g2]
    );
    assert!(m.simulate(0.001));
    assert_eq!(m.read_node_safe(g2, "out", 0), Some(24.0));
}

#[test]
fn algebraic_loop_fails_initialize_with_a_hint() {
    let mut m = new_model("Loop");
    let root = m.root();
    m.add_component(root, SIGNAL_CONSTANT, "Const").unwrap();
    let a = m.add_component(root, SIGNAL_GAIN, "A").unwrap();
    let b = m.add_component(root, SIGNAL_GAIN, "B").unwrap();
    m.connect(a, "out", b, "in").unwrap();
    m.connect(b, "out", a, "in").unwrap();

    assert!(matches!(
        m.sort_signal_components(root),
        Err(KernelError::AlgebraicLoop(_))
    ));
    m.messages().clear();

    assert!(!m.initialize(0.0, 0.01));
    let all = m.messages().drain();
    let errors: Vec<_> = all.iter().filter(|x| x.kind == MessageKind::Error).cloned().collect();
    let infos: Vec<_> = all.iter().filter(|x| x.kind == MessageKind::Info).cloned().collect();
    assert!(has_message(
        &errors,
        "Algebraic loops was found, signal components could not be sorted."
    ));
    assert!(has_message(&infos, "Last component that was successfully sorted: Const"));
    assert!(has_message(&infos, "Hint: Use unit delay components to resolve loops."));
}

#[test]
fn unit_delay_breaks_the_loop() {
    let mut m = new_model("Accumulator");
    let root = m.root();
    let one = m.add_component(root, SIGNAL_CONSTANT, "One").unwrap();
    let sum = m.add_component(root, SIGNAL_SUM, "Sum").unwrap();
    let delay = m.add_component(root, SIGNAL_UNIT_DELAY, "Delay").unwrap();
    m.connect(one, "out", sum, "in").unwrap();
    m.connect(sum, "out", delay, "in").unwrap();
    m.connect(delay, "out", sum, "in").unwrap();

    assert!(m.initialize(0.0, 0.01));
    let order = m.system_data(root).unwrap().signal_components().to_vec();
    let pos = |id| order.iter().position(|x| *x == id).unwrap();
    assert!(pos(one) < pos(sum));

    assert!(m.simulate(0.01));
    assert_eq!(m.system_data(root).unwrap().total_taken_steps(), 10);
    assert_eq!(m.read_node_safe(sum, "out", 0), Some(5.0));
}
