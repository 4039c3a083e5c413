use std::fs;
use std::net::UdpSocket;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use assert_cmd::Command;
use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;
use serde_json::Value;
use tempfile::TempDir;

const PACKET_LEN: usize = 8224;

fn cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("he6daq"))
}

/// Raw packet record with `unix_time` and `packet_index` set, zero payload.
fn record(unix_time: u32, packet_index: u32) -> Vec<u8> {
    let mut bytes = vec![0u8; PACKET_LEN];
    let w0 = (u64::from(packet_index) << 32) | u64::from(unix_time);
    bytes[..8].copy_from_slice(&w0.to_be_bytes());
    bytes
}

fn write_records(dir: &Path, name: &str, indexes: &[u32], tail: &[u8]) -> PathBuf {
    let path = dir.join(name);
    let mut bytes = Vec::new();
    for &index in indexes {
        bytes.extend(record(1_700_000_000, index));
    }
    bytes.extend_from_slice(tail);
    fs::write(&path, bytes).expect("write records");
    path
}

fn stdout_json(assert: &assert_cmd::assert::Assert) -> Value {
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("utf8 stdout");
    serde_json::from_str(&stdout).expect("valid json")
}

#[test]
fn help_lists_commands() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("packets").and(contains("calibrate")));
    cmd()
        .args(["packets", "inspect", "--help"])
        .assert()
        .success();
    cmd()
        .args(["calibrate", "simulate", "--help"])
        .assert()
        .success();
}

#[test]
fn inspect_record_file_to_stdout() {
    let temp = TempDir::new().expect("tempdir");
    let input = write_records(temp.path(), "run.bin", &[0, 1, 2, 5], &[]);

    let assert = cmd()
        .args(["packets", "inspect"])
        .arg(&input)
        .arg("--stdout")
        .assert()
        .success();
    let report = stdout_json(&assert);
    assert_eq!(report["report_version"], 1);
    assert_eq!(report["tool"]["name"], "he6daq");
    assert_eq!(report["input"]["format"], "record");
    assert_eq!(report["packets_decoded"], 4);
    assert_eq!(report["datagrams_rejected"], 0);
    assert_eq!(report["streams"][0]["index_gaps"], 2);
    assert_eq!(report["time_start"], "2023-11-14T22:13:20Z");
    assert!(report.get("packets").is_none());
}

#[test]
fn inspect_writes_report_file() {
    let temp = TempDir::new().expect("tempdir");
    let input = write_records(temp.path(), "run.dat", &[0], &[]);
    let report = temp.path().join("out").join("report.json");

    cmd()
        .args(["packets", "inspect"])
        .arg(&input)
        .arg("-o")
        .arg(&report)
        .arg("--packets")
        .assert()
        .success()
        .stderr(contains("OK: report written"));

    let text = fs::read_to_string(&report).expect("report");
    let value: Value = serde_json::from_str(&text).expect("valid json");
    assert_eq!(value["packets"][0]["packet_index"], 0);
}

#[test]
fn quiet_suppresses_ok_message() {
    let temp = TempDir::new().expect("tempdir");
    let input = write_records(temp.path(), "run.bin", &[0], &[]);
    let report = temp.path().join("report.json");

    cmd()
        .args(["packets", "inspect"])
        .arg(&input)
        .arg("-o")
        .arg(&report)
        .arg("--quiet")
        .assert()
        .success()
        .stderr(contains("OK:").not());
}

#[test]
fn missing_input_shows_error_and_hint() {
    let temp = TempDir::new().expect("tempdir");
    let missing = temp.path().join("missing.pcapng");

    cmd()
        .args(["packets", "inspect"])
        .arg(missing)
        .arg("--stdout")
        .assert()
        .failure()
        .code(2)
        .stderr(contains("error:").and(contains("hint:")));
}

#[test]
fn unsupported_extension_is_rejected() {
    let temp = TempDir::new().expect("tempdir");
    let input = temp.path().join("notes.txt");
    fs::write(&input, b"not a capture").expect("write");

    cmd()
        .args(["packets", "inspect"])
        .arg(input)
        .arg("--stdout")
        .assert()
        .failure()
        .stderr(contains("unsupported input format").and(contains(".pcapng")));
}

#[test]
fn strict_fails_on_rejected_datagrams() {
    let temp = TempDir::new().expect("tempdir");
    let input = write_records(temp.path(), "run.raw", &[0, 1], &[1, 2, 3]);

    cmd()
        .args(["packets", "inspect"])
        .arg(&input)
        .arg("--stdout")
        .assert()
        .success();
    cmd()
        .args(["packets", "inspect"])
        .arg(&input)
        .arg("--stdout")
        .arg("--strict")
        .assert()
        .failure()
        .stderr(contains("1 datagrams rejected"));
}

#[test]
fn glob_with_several_matches_is_an_error() {
    let temp = TempDir::new().expect("tempdir");
    write_records(temp.path(), "a.bin", &[0], &[]);
    write_records(temp.path(), "b.bin", &[0], &[]);
    let pattern = temp.path().join("*.bin");

    cmd()
        .args(["packets", "inspect"])
        .arg(pattern)
        .arg("--stdout")
        .assert()
        .failure()
        .stderr(contains("multiple files match pattern"));
}

#[test]
fn report_must_differ_from_input() {
    let temp = TempDir::new().expect("tempdir");
    let input = write_records(temp.path(), "run.bin", &[0], &[]);

    cmd()
        .args(["packets", "inspect"])
        .arg(&input)
        .arg("-o")
        .arg(&input)
        .assert()
        .failure()
        .stderr(contains("report path must differ from input"));
}

#[test]
fn stdout_and_report_conflict() {
    let temp = TempDir::new().expect("tempdir");
    let input = write_records(temp.path(), "run.bin", &[0], &[]);
    let report = temp.path().join("report.json");

    cmd()
        .args(["packets", "inspect"])
        .arg(&input)
        .arg("--stdout")
        .arg("-o")
        .arg(report)
        .assert()
        .failure();
}

#[test]
fn pretty_and_compact_conflict() {
    let temp = TempDir::new().expect("tempdir");
    let input = write_records(temp.path(), "run.bin", &[0], &[]);

    cmd()
        .args(["packets", "inspect"])
        .arg(&input)
        .args(["--stdout", "--pretty", "--compact"])
        .assert()
        .failure();
}

#[test]
fn simulate_calibration_to_stdout() {
    let assert = cmd()
        .args(["calibrate", "simulate", "--stdout", "--groups", "2"])
        .args(["--core-offsets", "0,1.2,-0.8,0.4"])
        .args(["--core-gains", "0,0.7,0,-0.42"])
        .assert()
        .success();
    let result = stdout_json(&assert);

    assert_eq!(result["slot"], 0);
    assert_eq!(result["gains"][0].as_f64(), Some(0.0));
    assert_eq!(result["offsets"].as_array().map(Vec::len), Some(4));
    assert_eq!(result["offset_outcome"]["state"], "converged");
    assert_eq!(result["gain_outcome"]["state"], "converged");
}

#[test]
fn simulate_reads_config_file_and_flags_override() {
    let temp = TempDir::new().expect("tempdir");
    let config = temp.path().join("calibration.json");
    fs::write(
        &config,
        r#"{
            "slot": 1,
            "offset": { "max_iterations": 5, "tolerance": 0.01 },
            "gain": { "max_iterations": 5, "tolerance": 0.01 },
            "phase": { "max_iterations": 0, "tolerance": 1.0 },
            "groups": 1
        }"#,
    )
    .expect("write config");
    let out = temp.path().join("result.json");

    cmd()
        .args(["calibrate", "simulate", "--config"])
        .arg(&config)
        .args(["--slot", "0", "-o"])
        .arg(&out)
        .assert()
        .success();

    let value: Value =
        serde_json::from_str(&fs::read_to_string(&out).expect("result")).expect("valid json");
    assert_eq!(value["slot"], 0);
}

#[test]
fn simulate_rejects_bad_core_list_and_zero_groups() {
    cmd()
        .args(["calibrate", "simulate", "--stdout", "--core-offsets", "1,2"])
        .assert()
        .failure()
        .stderr(contains("--core-offsets takes 4 values").and(contains("hint:")));
    cmd()
        .args(["calibrate", "simulate", "--stdout", "--groups", "0"])
        .assert()
        .failure()
        .stderr(contains("invalid calibration config"));
}

fn free_udp_port() -> u16 {
    let socket = UdpSocket::bind("127.0.0.1:0").expect("bind free port");
    socket.local_addr().expect("local addr").port()
}

#[test]
fn capture_writes_valid_packets_and_counts_rejects() {
    let temp = TempDir::new().expect("tempdir");
    let output = temp.path().join("run.bin");
    let port = free_udp_port();

    let stop = Arc::new(AtomicBool::new(false));
    let sender = {
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            let socket = UdpSocket::bind("127.0.0.1:0").expect("bind sender");
            let valid = record(1_700_000_000, 0);
            for _ in 0..400 {
                if stop.load(Ordering::Relaxed) {
                    break;
                }
                let _ = socket.send_to(&valid, ("127.0.0.1", port));
                let _ = socket.send_to(&[1, 2, 3], ("127.0.0.1", port));
                thread::sleep(Duration::from_millis(25));
            }
        })
    };

    let assert = cmd()
        .args([
            "packets",
            "capture",
            "--bind",
            &format!("127.0.0.1:{port}"),
            "--count",
            "2",
            "--timeout-ms",
            "5000",
            "-o",
        ])
        .arg(&output)
        .assert();
    stop.store(true, Ordering::Relaxed);
    sender.join().expect("sender thread");

    assert
        .success()
        .stderr(contains("1 packets captured (1 rejected)"));
    let written = fs::read(&output).expect("read output");
    assert_eq!(written.len(), PACKET_LEN);
    assert_eq!(written, record(1_700_000_000, 0));
}

#[test]
fn capture_stops_early_on_timeout() {
    let temp = TempDir::new().expect("tempdir");
    let output = temp.path().join("quiet.bin");
    let port = free_udp_port();

    cmd()
        .args([
            "packets",
            "capture",
            "--bind",
            &format!("127.0.0.1:{port}"),
            "--count",
            "3",
            "--timeout-ms",
            "200",
            "-o",
        ])
        .arg(&output)
        .assert()
        .success()
        .stderr(contains("0 packets captured (0 rejected)"));
    assert_eq!(fs::metadata(&output).expect("output exists").len(), 0);
}

#[test]
fn capture_rejects_zero_count() {
    let temp = TempDir::new().expect("tempdir");
    let output = temp.path().join("none.bin");

    cmd()
        .args(["packets", "capture", "--count", "0", "-o"])
        .arg(&output)
        .assert()
        .code(2)
        .stderr(contains("--count must be at least 1"));
    assert!(!output.exists());
}
