use std::f64::consts::PI;

use crate::demo::LineOpts;
use crate::export::LogExport;
use crate::sim::{SimConfig, SimulationHandler};

use super::hydraulic_line;

#[test]
fn pump_and_volume_line_runs_one_thousand_steps() {
    let (mut m, line) = hydraulic_line(&LineOpts::default());
    let root = m.root();
    assert!(m.initialize(0.0, 1.0));

    let sys = m.system_data(root).unwrap();
    assert!(sys.signal_components().is_empty());
    assert_eq!(sys.c_components().len(), 3);
    assert_eq!(sys.q_components().len(), 2);
    assert_eq!(m.num_log_slots(root), 1000);

    assert!(m.simulate(1.0));
    assert!(m.finalize());

    assert_eq!(m.system_data(root).unwrap().total_taken_steps(), 1000);
    let time = m.log_time_vector(root);
    assert_eq!(time.len(), 1000);
    assert!(time.windows(2).all(|w| w[0] <= w[1]));
    assert!((time[0] - 0.001).abs() < 1e-12);
    assert!((time[999] - 1.0).abs() < 1e-9);

    let pressure = m.node_log_column(line.volume, "P1", "Pressure").unwrap();
    assert_eq!(pressure.len(), 1000);
    assert!(pressure.iter().all(|p| p.is_finite() && *p >= 0.0));
    assert!(pressure[999] > pressure[0]);
}

#[test]
fn volume_pressure_settles_where_orifice_flow_matches_pump_flow() {
    let opts = LineOpts::default();
    let (mut m, line) = hydraulic_line(&opts);
    assert!(m.initialize(0.0, 1.0));
    assert!(m.simulate(1.0));

    let q_pump = opts.speed * opts.displacement / (2.0 * PI);
    let expected = opts.tank_pressure + q_pump / opts.orifice_kc;
    let p = m.read_node_safe(line.volume, "P2", 1).unwrap();
    assert!(
        ((p - expected) / expected).abs() < 0.02,
        "pressure {p} should settle near {expected}"
    );
    // 泵出口流量就是理论排量
    let q = m.read_node_safe(line.pump, "P2", 0).unwrap();
    assert!(((q - q_pump) / q_pump).abs() < 1e-9);
}

#[test]
fn fewer_requested_samples_limit_the_rows() {
    let (mut m, line) = hydraulic_line(&LineOpts::default());
    let root = m.root();
    m.set_num_log_samples(root, 100).unwrap();
    assert!(m.initialize(0.0, 1.0));
    assert!(m.simulate(1.0));

    let time = m.log_time_vector(root);
    assert_eq!(time.len(), 100);
    assert!((time[0] - 0.001).abs() < 1e-12);
    assert!((time[99] - 1.0).abs() < 1e-9);
    assert_eq!(m.node_log_column(line.volume, "P1", "Pressure").unwrap().len(), 100);
}

#[test]
fn log_start_time_skips_the_beginning() {
    let (mut m, _line) = hydraulic_line(&LineOpts::default());
    let root = m.root();
    m.set_log_start_time(root, 0.5).unwrap();
    assert!(m.initialize(0.0, 1.0));
    assert!(m.simulate(1.0));

    let time = m.log_time_vector(root);
    assert_eq!(time.len(), 501);
    assert!((time[0] - 0.5).abs() < 1e-9);
}

#[test]
fn export_collects_one_column_per_visible_variable() {
    let (mut m, line) = hydraulic_line(&LineOpts::default());
    assert!(m.initialize(0.0, 0.1));
    assert!(m.simulate(0.1));

    let export = LogExport::from_model(&m);
    assert_eq!(export.model, "Line");
    assert_eq!(export.num_rows(), 100);
    let col = export.column("Volume", "P2", "Pressure").unwrap();
    assert_eq!(col.unit, "Pa");
    assert_eq!(
        Some(col.values.clone()),
        m.node_log_column(line.volume, "P2", "Pressure")
    );
    assert!(export.columns.iter().all(|c| c.variable != "Temperature"));
    assert!(export.columns.iter().all(|c| c.values.len() == 100));

    let json = export.to_json().unwrap();
    let v: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(v["time"].as_array().unwrap().len(), 100);
}

#[test]
fn handler_runs_the_whole_lifecycle_from_a_config() {
    let (mut m, line) = hydraulic_line(&LineOpts::default());
    let config = SimConfig::from_json(r#"{ "stop_time": 0.2, "timestep": 0.0005, "n_log_samples": 50 }"#)
        .unwrap();
    assert!(SimulationHandler::new().run(&mut m, &config));
    assert_eq!(m.system_data(m.root()).unwrap().total_taken_steps(), 400);
    assert_eq!(m.log_time_vector(m.root()).len(), 50);
    assert!(m.node_log_column(line.pump, "P2", "Flow").is_some());
}

#[test]
fn keep_start_values_carries_the_final_state_over() {
    let (mut m, line) = hydraulic_line(&LineOpts::default());
    let root = m.root();
    m.set_keep_values_as_start_values(root, true).unwrap();
    assert!(m.initialize(0.0, 0.5));
    assert!(m.simulate(0.5));
    let p_end = m.read_node_safe(line.volume, "P1", 1).unwrap();
    assert!(m.finalize());
    assert_eq!(m.start_value(line.volume, "P1", "Pressure"), Some(p_end));
}
