use crate::demo::LineOpts;
use crate::system::LogSchedule;

use super::hydraulic_line;

#[test]
fn schedule_spreads_slots_over_the_whole_run() {
    let s = LogSchedule::compute(0.0, 1.0, 0.001, 100, 0.0);
    assert_eq!(s.num_slots(), 100);
    assert_eq!(s.steps().first(), Some(&1));
    assert_eq!(s.steps().last(), Some(&1000));
    assert!(s.steps().windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn schedule_never_asks_for_more_slots_than_steps() {
    let s = LogSchedule::compute(0.0, 0.01, 0.001, 2048, 0.0);
    assert_eq!(s.num_slots(), 10);
    assert_eq!(s.steps(), &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
}

#[test]
fn schedule_starts_at_the_log_start_time() {
    let s = LogSchedule::compute(0.0, 1.0, 0.001, 2048, 0.5);
    assert_eq!(s.num_slots(), 501);
    assert_eq!(s.steps().first(), Some(&500));
    assert_eq!(s.steps().last(), Some(&1000));

    // 早于起点的日志起始时间按第 1 步算
    let early = LogSchedule::compute(1.0, 2.0, 0.1, 100, -5.0);
    assert_eq!(early.steps().first(), Some(&1));
    assert_eq!(early.num_slots(), 10);
}

#[test]
fn degenerate_schedules_are_empty() {
    assert_eq!(LogSchedule::compute(0.0, 1.0, 0.001, 0, 0.0).num_slots(), 0);
    assert_eq!(LogSchedule::compute(1.0, 1.0, 0.001, 10, 0.0).num_slots(), 0);
    assert_eq!(LogSchedule::compute(0.0, 1.0, 0.0, 10, 0.0).num_slots(), 0);
    assert_eq!(LogSchedule::compute(0.0, 1.0, 0.001, 10, 2.0).num_slots(), 0);
}

#[test]
fn single_slot_logs_the_first_step_in_the_window() {
    let s = LogSchedule::compute(0.0, 1.0, 0.01, 1, 0.25);
    assert_eq!(s.steps(), &[25]);
}

#[test]
fn row_lookup_only_hits_scheduled_steps() {
    let s = LogSchedule::compute(0.0, 1.0, 0.01, 3, 0.0);
    assert_eq!(s.steps(), &[1, 51, 100]);
    assert_eq!(s.row_for(0), None);
    assert_eq!(s.row_for(1), Some(0));
    assert_eq!(s.row_for(50), None);
    assert_eq!(s.row_for(51), Some(1));
    assert_eq!(s.row_for(100), Some(2));
}

#[test]
fn split_runs_fill_one_continuous_log() {
    let (mut m, line) = hydraulic_line(&LineOpts::default());
    let root = m.root();
    assert!(m.initialize(0.0, 0.01));
    assert_eq!(m.num_log_slots(root), 10);
    assert!(m.simulate(0.005));
    assert_eq!(m.log_time_vector(root).len(), 5);
    assert!(m.simulate(0.01));

    let time = m.log_time_vector(root);
    assert_eq!(time.len(), 10);
    for (k, t) in time.iter().enumerate() {
        assert!((t - 0.001 * (k + 1) as f64).abs() < 1e-12);
    }
    let p = m.node_log_column(line.volume, "P2", "Pressure").unwrap();
    assert_eq!(p.len(), 10);
    assert!(m.finalize());
}

#[test]
fn nodes_without_logging_ports_are_not_logged() {
    let (mut m, line) = hydraulic_line(&LineOpts::default());
    m.set_port_logging(line.volume, "P2", false).unwrap();
    m.set_port_logging(line.orifice, "P1", false).unwrap();
    assert!(m.set_port_logging(line.volume, "P9", false).is_err());

    assert!(m.initialize(0.0, 0.01));
    assert!(m.simulate(0.01));
    assert_eq!(m.node_log_column(line.volume, "P2", "Pressure"), Some(Vec::new()));
    assert_eq!(m.node_log_column(line.volume, "P1", "Pressure").map(|c| c.len()), Some(10));
    assert_eq!(m.node_log_column(line.volume, "P1", "Nope"), None);
}

#[test]
fn force_disabled_nodes_skip_logging() {
    let (mut m, line) = hydraulic_line(&LineOpts::default());
    let node = m.node_of_port(line.orifice, "P2").unwrap();
    m.node_mut(node).unwrap().set_force_disable_log(true);

    assert!(m.initialize(0.0, 0.01));
    assert!(m.simulate(0.01));
    assert!(!m.node(node).unwrap().is_logging());
    assert_eq!(m.node_log_column(line.orifice, "P2", "Flow"), Some(Vec::new()));
    assert_eq!(m.node_log_column(line.pump, "P1", "Flow").map(|c| c.len()), Some(10));
}
