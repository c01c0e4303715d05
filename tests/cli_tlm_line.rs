use serde_json::Value;
use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

fn unique_temp_dir(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_nanos();
    let dir = std::env::temp_dir().join(format!(
        "tlmsim-rs-{prefix}-{}-{nanos}",
        std::process::id()
    ));
    fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

fn run_tlm_line(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_tlm_line"))
        .args(args)
        .output()
        .expect("run tlm_line")
}

fn summary_of(output: &Output) -> Value {
    assert!(
        output.status.success(),
        "tlm_line failed: stderr={}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(&stdout).expect("summary must be JSON")
}

#[test]
fn tlm_line_prints_a_json_summary() {
    let output = run_tlm_line(&["--quiet", "--stop", "0.1"]);
    let v = summary_of(&output);

    assert_eq!(v["model"].as_str(), Some("HydraulicLine"));
    assert_eq!(v["finished"].as_bool(), Some(true));
    assert_eq!(v["steps"].as_u64(), Some(100));
    assert_eq!(v["log_rows"].as_u64(), Some(100));
    assert_eq!(v["threads"].as_i64(), Some(-1));
    let time = v["time"].as_f64().expect("time");
    assert!((time - 0.1).abs() < 1e-9, "time={time}");
    let p = v["volume_pressure"].as_f64().expect("volume pressure");
    assert!(p > 1.0e5, "pressure should build up, got {p}");
    assert!(v["messages"].is_array());
}

#[test]
fn tlm_line_writes_node_logs() {
    let dir = unique_temp_dir("tlm-line-logs");
    let out_json = dir.join("logs.json");
    let output = run_tlm_line(&[
        "--quiet",
        "--stop",
        "0.05",
        "--log-samples",
        "10",
        "--log-json",
        out_json.to_str().unwrap(),
    ]);
    let summary = summary_of(&output);
    assert_eq!(summary["log_rows"].as_u64(), Some(10));

    let raw = fs::read_to_string(&out_json).expect("read logs.json");
    let v: Value = serde_json::from_str(&raw).expect("parse logs.json");
    assert_eq!(v["model"].as_str(), Some("HydraulicLine"));
    assert_eq!(v["time"].as_array().map(Vec::len), Some(10));

    let columns = v["columns"].as_array().expect("columns array");
    assert!(!columns.is_empty());
    for c in columns {
        assert_eq!(c["values"].as_array().map(Vec::len), Some(10));
    }
    let pressure = columns
        .iter()
        .find(|c| c["component"] == "Volume" && c["port"] == "P2" && c["variable"] == "Pressure")
        .expect("Volume.P2 pressure column");
    assert_eq!(pressure["unit"].as_str(), Some("Pa"));

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn tlm_line_runs_multi_threaded() {
    let output = run_tlm_line(&[
        "--quiet",
        "--stop",
        "0.05",
        "--threads",
        "2",
        "--algorithm",
        "work-stealing",
    ]);
    let v = summary_of(&output);
    assert_eq!(v["finished"].as_bool(), Some(true));
    assert_eq!(v["algorithm"].as_str(), Some("work_stealing"));
    assert_eq!(v["threads"].as_i64(), Some(2));
    assert_eq!(v["steps"].as_u64(), Some(50));
}

#[test]
fn tlm_line_applies_config_and_parameter_files() {
    let dir = unique_temp_dir("tlm-line-config");
    let config = dir.join("config.json");
    fs::write(&config, r#"{ "stop_time": 0.02, "timestep": 0.0005 }"#).expect("write config");
    let params = dir.join("params.json");
    fs::write(&params, r#"{ "Orifice.Kc": 2e-11 }"#).expect("write params");

    // Kc 是输入变量而不是参数，参数文件应当被拒绝
    let output = run_tlm_line(&[
        "--quiet",
        "--config",
        config.to_str().unwrap(),
        "--params",
        params.to_str().unwrap(),
    ]);
    assert!(!output.status.success());

    fs::write(&params, r#"{ "Volume.Beta_e": 2e9 }"#).expect("write params");
    let output = run_tlm_line(&[
        "--quiet",
        "--config",
        config.to_str().unwrap(),
        "--params",
        params.to_str().unwrap(),
    ]);
    let v = summary_of(&output);
    assert_eq!(v["steps"].as_u64(), Some(40));

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn tlm_line_rejects_a_zero_timestep() {
    let output = run_tlm_line(&["--quiet", "--timestep", "0"]);
    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
}
