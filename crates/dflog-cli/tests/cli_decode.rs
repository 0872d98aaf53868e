//! End-to-end tests that spawn the compiled `dflog` binary against a
//! synthesized DataFlash log, per SPEC_FULL.md §2.1's "ambient stack" test
//! tooling note.

use std::io::Write;
use std::process::Command;

const SYNC0: u8 = 0xA3;
const SYNC1: u8 = 0x95;
const FMT_TYPE_ID: u8 = 0x80;
const GPS_TYPE_ID: u8 = 1;

fn push_ascii_fixed(buf: &mut Vec<u8>, s: &str, width: usize) {
    let bytes = s.as_bytes();
    buf.extend_from_slice(&bytes[..bytes.len().min(width)]);
    for _ in bytes.len().min(width)..width {
        buf.push(0);
    }
}

/// A FMT frame describing a single `TimeUS:u64` message named `GPS`.
fn gps_fmt_frame() -> Vec<u8> {
    let mut frame = vec![SYNC0, SYNC1, FMT_TYPE_ID];
    frame.push(GPS_TYPE_ID);
    frame.push(3 + 8); // frame_length: header + one u64
    push_ascii_fixed(&mut frame, "GPS", 4);
    push_ascii_fixed(&mut frame, "Q", 16);
    push_ascii_fixed(&mut frame, "TimeUS", 64);
    frame
}

fn gps_frame(time_us: u64) -> Vec<u8> {
    let mut frame = vec![SYNC0, SYNC1, GPS_TYPE_ID];
    frame.extend_from_slice(&time_us.to_le_bytes());
    frame
}

fn write_synthetic_log(dir: &std::path::Path) -> std::path::PathBuf {
    let mut bytes = gps_fmt_frame();
    bytes.extend(gps_frame(100));
    bytes.extend(gps_frame(50));

    let path = dir.join("log.bin");
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(&bytes).unwrap();
    path
}

fn dflog_cmd() -> Command {
    Command::new(env!("CARGO_BIN_EXE_dflog"))
}

#[test]
fn decode_prints_records_in_time_order() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = write_synthetic_log(dir.path());

    let output = dflog_cmd()
        .args(["decode", log_path.to_str().unwrap(), "--num-workers", "1"])
        .output()
        .expect("dflog binary should run");

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8(output.stdout).unwrap();
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("TimeUS=50"));
    assert!(lines[1].contains("TimeUS=100"));
}

#[test]
fn decode_json_format_emits_one_object_per_line() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = write_synthetic_log(dir.path());

    let output = dflog_cmd()
        .args(["decode", log_path.to_str().unwrap(), "--format", "json", "--num-workers", "2"])
        .output()
        .expect("dflog binary should run");

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 2);
    for line in &lines {
        let parsed: serde_json::Value = serde_json::from_str(line).unwrap();
        assert_eq!(parsed["message_type"], "GPS");
    }
}

#[test]
fn decode_rejects_nonexistent_file() {
    let output = dflog_cmd().args(["decode", "/nonexistent/path/to/log.bin"]).output().unwrap();
    assert!(!output.status.success());
}

#[test]
fn schemas_reports_frame_count() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = write_synthetic_log(dir.path());

    let output = dflog_cmd().args(["schemas", log_path.to_str().unwrap()]).output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("3 frame(s)"));
}
