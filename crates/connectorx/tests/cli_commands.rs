#![cfg(feature = "cli")]

use std::io::Write;
use std::process::{Command, Output};

fn connectorx(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_connectorx"))
        .args(["--log-level", "error"])
        .args(args)
        .output()
        .expect("connectorx should run")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn config_file(json: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(json.as_bytes()).expect("write config");
    file
}

const STRIP_CONFIG: &str = r#"{
    "channels": [{
        "key": "CH1", "id": "main", "length": 4,
        "zones": [{"id": "zone1", "type": "strip", "length": 4}]
    }]
}"#;

#[test]
fn id_prints_json() {
    let output = connectorx(&["--format", "json", "id", "Blink", "zone1"]);
    assert!(output.status.success());

    let ids: serde_json::Value = serde_json::from_str(&stdout(&output)).expect("json output");
    let ids = ids.as_array().expect("array");
    assert_eq!(ids.len(), 2);
    assert_eq!(ids[0]["name"], "Blink");
    assert!(ids[0]["id"].is_u64());
    assert!(ids[0]["hex"].as_str().unwrap().starts_with("0x"));
}

#[test]
fn frame_output_decodes_back() {
    let framed = connectorx(&[
        "--format",
        "pretty",
        "frame",
        "set-color",
        "--zone",
        "zone1",
        "--color",
        "102030",
    ]);
    assert!(framed.status.success());
    let hex = stdout(&framed).trim().to_string();
    assert!(hex.ends_with("00"), "frames end with the delimiter: {hex}");

    let decoded = connectorx(&["--format", "json", "decode", &hex]);
    assert!(decoded.status.success());
    let report: serde_json::Value = serde_json::from_str(&stdout(&decoded)).expect("json");
    assert_eq!(report["transmissions"][0]["kind"], "Command");
    assert!(report["transmissions"][0]["decoded"]
        .as_str()
        .unwrap()
        .contains("SetColor"));
    assert_eq!(report["dropped"].as_array().unwrap().len(), 0);
}

#[test]
fn decode_rejects_bad_hex() {
    let output = connectorx(&["decode", "abc"]);
    assert_eq!(output.status.code(), Some(60));
}

#[test]
fn simulate_prints_each_flush() {
    let config = config_file(STRIP_CONFIG);
    let output = connectorx(&[
        "--format",
        "json",
        "simulate",
        "--config",
        config.path().to_str().unwrap(),
        "--zone",
        "zone1",
        "--animation",
        "Blink",
        "--delay",
        "100",
        "--color",
        "ff0000",
        "--duration",
        "250",
    ]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let flushes: Vec<serde_json::Value> = stdout(&output)
        .lines()
        .map(|line| serde_json::from_str(line).expect("json line"))
        .collect();
    assert!(flushes.len() >= 2);
    assert_eq!(flushes[0]["t_ms"], 100);
    assert_eq!(flushes[1]["t_ms"], 200);
    assert_eq!(flushes[0]["pixels"].as_array().unwrap().len(), 4);
    assert_ne!(flushes[0]["pixels"], flushes[1]["pixels"]);
}

#[test]
fn simulate_unknown_zone_is_usage_error() {
    let config = config_file(STRIP_CONFIG);
    let output = connectorx(&[
        "simulate",
        "--config",
        config.path().to_str().unwrap(),
        "--zone",
        "nope",
        "--animation",
        "Blink",
    ]);
    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn invalid_config_exits_with_config_code() {
    let config = config_file(r#"{"channels": [{"key": "CH1", "id": "", "length": 1}]}"#);
    let output = connectorx(&[
        "run",
        "--config",
        config.path().to_str().unwrap(),
        "--port",
        "/dev/connectorx-test-missing",
    ]);
    assert_eq!(output.status.code(), Some(40));
}

#[test]
fn missing_serial_port_is_transport_error() {
    let config = config_file(STRIP_CONFIG);
    let output = connectorx(&[
        "run",
        "--config",
        config.path().to_str().unwrap(),
        "--port",
        "/dev/connectorx-test-missing",
    ]);
    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn version_prints_package_version() {
    let output = connectorx(&["version"]);
    assert!(output.status.success());
    assert_eq!(
        stdout(&output).trim(),
        format!("connectorx {}", env!("CARGO_PKG_VERSION"))
    );
}
