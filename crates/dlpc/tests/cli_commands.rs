#![cfg(feature = "cli")]

use std::path::PathBuf;
use std::process::{Command, Output};

fn dlpc(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_dlpc"))
        .env_remove("DLPC_CONFIG")
        .args(["--log-level", "error", "--format", "json", "--simulate"])
        .args(args)
        .output()
        .expect("dlpc should run")
}

fn json(output: &Output) -> serde_json::Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let line = stdout.lines().next().expect("one line of output");
    serde_json::from_str(line).expect("stdout should be JSON")
}

fn unique_temp_file(tag: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "dlpc-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ))
}

#[test]
fn probe_reports_device_address() {
    let output = dlpc(&["probe"]);
    assert!(output.status.success());
    let out = json(&output);
    assert_eq!(out["kind"], "probe");
    assert_eq!(out["address"], 27);
    assert_eq!(out["responding"], true);
}

#[test]
fn status_lists_every_register() {
    let output = dlpc(&["status"]);
    assert!(output.status.success());
    let out = json(&output);
    assert_eq!(out["mode"], "external-print");
    let names: Vec<&str> = out["registers"]
        .as_array()
        .expect("registers array")
        .iter()
        .filter_map(|r| r["name"].as_str())
        .collect();
    assert!(names.contains(&"fpga_control"));
    assert!(names.contains(&"crc_result"));
    assert_eq!(names.len(), 8);
}

#[test]
fn mode_request_writes_once() {
    let output = dlpc(&["mode", "standby"]);
    assert!(output.status.success());
    let out = json(&output);
    assert_eq!(out["from"], "external-print");
    assert_eq!(out["to"], "standby");
    assert_eq!(out["written"], true);
}

#[test]
fn prepare_reports_each_step() {
    let output = dlpc(&["prepare"]);
    assert!(output.status.success());
    let out = json(&output);
    assert_eq!(out["mode"]["to"], "standby");
    assert_eq!(out["crc_enable"]["new"], 0x05);
    assert_eq!(out["active_buffer"]["new"], 0);
    assert_eq!(out["print_config"], serde_json::json!([0, 0]));
}

#[test]
fn stream_reports_frame_crc() {
    let output = dlpc(&["stream", "--pattern", "checker", "--rows", "16", "--buffer", "1"]);
    assert!(output.status.success());
    let out = json(&output);
    assert_eq!(out["buffer"], 1);
    assert_eq!(out["rows"], 16);
    assert_eq!(out["payload_len"], 16 * 8);
    assert_eq!(out["frame_len"], 16 * 8 + 8);
}

#[test]
fn stream_from_file() {
    let path = unique_temp_file("frame");
    std::fs::write(&path, vec![0xAAu8; 8 * 3]).expect("write frame file");
    let output = dlpc(&["stream", "--file", path.to_str().expect("utf-8 path")]);
    let _ = std::fs::remove_file(&path);

    assert!(output.status.success());
    assert_eq!(json(&output)["rows"], 3);
}

#[test]
fn misaligned_file_is_data_invalid() {
    let path = unique_temp_file("short");
    std::fs::write(&path, [0u8; 5]).expect("write frame file");
    let output = dlpc(&["stream", "--file", path.to_str().expect("utf-8 path")]);
    let _ = std::fs::remove_file(&path);

    assert_eq!(output.status.code(), Some(60));
}

#[test]
fn expose_alternates_buffers() {
    let output = dlpc(&["expose", "--dark", "32", "--exposed", "512", "--repeat", "2"]);
    assert!(output.status.success());
    let out = json(&output);
    let cycles = out["cycles"].as_array().expect("cycles array");
    assert_eq!(cycles.len(), 2);
    assert_eq!(cycles[0]["buffer"], 0);
    assert_eq!(cycles[1]["buffer"], 1);
    assert_eq!(
        cycles[0]["trigger"]["payload"],
        serde_json::json!([0, 0x00, 0x20, 0x02, 0x00])
    );
    assert_eq!(cycles[0]["crc_match"], true);
}

#[test]
fn expose_reports_cycles_completed_before_failure() {
    let output = dlpc(&["--simulate-drop-after", "1", "expose", "--repeat", "3"]);
    assert_eq!(output.status.code(), Some(3));
    let out = json(&output);
    let cycles = out["cycles"].as_array().expect("cycles array");
    assert_eq!(cycles.len(), 1);
    assert_eq!(cycles[0]["buffer"], 0);
    assert!(cycles[0]["trigger"]["crc_error"].is_string());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("expose cycle 2 of 3 (1 already exposed)"));
}

#[test]
fn expose_rejects_oversized_count() {
    let output = dlpc(&["expose", "--exposed", "65536"]);
    assert_eq!(output.status.code(), Some(60));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("65535"));
}

#[test]
fn crc_reads_register() {
    let output = dlpc(&["crc"]);
    assert!(output.status.success());
    assert_eq!(json(&output)["crc"], 0);
}

#[test]
fn test_pattern_needs_six_bytes() {
    let output = dlpc(&["test-pattern", "--bytes", "1,2,3"]);
    assert_eq!(output.status.code(), Some(64));

    let output = dlpc(&["test-pattern"]);
    assert!(output.status.success());
    assert_eq!(json(&output)["to"], "test-pattern");
}

#[test]
fn config_file_overrides_defaults() {
    let path = unique_temp_file("config.json");
    std::fs::write(
        &path,
        r#"{"window": {"row_start": 0, "col_start": 0, "col_end": 39}, "dark_frames": 4}"#,
    )
    .expect("write config");
    let output = dlpc(&["--config", path.to_str().expect("utf-8 path"), "config"]);
    let _ = std::fs::remove_file(&path);

    assert!(output.status.success());
    let out = json(&output);
    assert_eq!(out["config"]["window"]["col_end"], 39);
    assert_eq!(out["config"]["dark_frames"], 4);
    assert_eq!(out["config"]["settle_delay_ms"], 0);
}

#[test]
fn invalid_config_file_is_data_invalid() {
    let path = unique_temp_file("bad.json");
    std::fs::write(&path, r#"{"dark_frames": "many"}"#).expect("write config");
    let output = dlpc(&["--config", path.to_str().expect("utf-8 path"), "probe"]);
    let _ = std::fs::remove_file(&path);

    assert_eq!(output.status.code(), Some(60));
}

#[test]
fn doctor_passes_when_simulating() {
    let output = dlpc(&["doctor"]);
    assert!(output.status.success());
    assert_eq!(json(&output)["overall"], "pass");
}

#[test]
fn version_prints_package_version() {
    let output = Command::new(env!("CARGO_BIN_EXE_dlpc"))
        .arg("version")
        .output()
        .expect("version should run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), format!("dlpc {}", env!("CARGO_PKG_VERSION")));
}
