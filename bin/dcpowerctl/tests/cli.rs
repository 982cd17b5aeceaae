//! ---
//! dcp_section: "05-networking-external-interfaces"
//! dcp_subsection: "binary"
//! dcp_type: "source"
//! dcp_scope: "code"
//! dcp_description: "Command line front end for power string studies."
//! dcp_version: "v0.0.0-prealpha"
//! dcp_owner: "tbd"
//! ---
use std::fs;
use std::path::Path;

use assert_cmd::Command;
use tempfile::tempdir;

const CONSUMERS: &str = r#"[
  {"id": "A", "category": "it-row", "load_kw": 100.0, "capacity_kw": 120.0},
  {"id": "B", "category": "crah", "load_kw": 80.0, "capacity_kw": 100.0},
  {"id": "C", "category": "pump", "load_kw": 60.0, "capacity_kw": 75.0},
  {"id": "D", "category": "chiller", "load_kw": 40.0, "capacity_kw": 50.0}
]"#;

fn dcpowerctl(cwd: &Path) -> Command {
    let mut cmd = Command::cargo_bin("dcpowerctl").unwrap();
    cmd.current_dir(cwd).env_remove("DCPOWER_CONFIG");
    cmd
}

fn stdout_of(cmd: &mut Command) -> String {
    let output = cmd.assert().success().get_output().stdout.clone();
    String::from_utf8(output).unwrap()
}

#[test]
fn balance_renders_string_tables() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("consumers.json"), CONSUMERS).unwrap();

    let stdout = stdout_of(dcpowerctl(dir.path()).args([
        "balance",
        "--consumers",
        "consumers.json",
        "--strings",
        "2+0",
    ]));
    assert!(stdout.contains("S1 [live] load 140.0 kW"));
    assert!(stdout.contains("S2 [live] load 140.0 kW"));
    assert!(stdout.contains("S1 failure"));
    assert!(stdout.contains("S2 failure"));
}

#[test]
fn balance_json_honours_named_failure() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("consumers.json"), CONSUMERS).unwrap();

    let stdout = stdout_of(dcpowerctl(dir.path()).args([
        "balance",
        "--consumers",
        "consumers.json",
        "--strings",
        "2+1",
        "--fail",
        "2",
        "--format",
        "json",
    ]));
    let study: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let impacts = study["impacts"].as_array().unwrap();
    assert_eq!(impacts.len(), 1);
    assert_eq!(impacts[0]["failed"], 2);
    assert_eq!(impacts[0]["displaced"][0]["outcome"]["reason"], "secondary_feed");
}

#[test]
fn malformed_redundancy_fails_the_command() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("consumers.json"), CONSUMERS).unwrap();

    let output = dcpowerctl(dir.path())
        .args(["balance", "--consumers", "consumers.json", "--strings", "+2"])
        .assert()
        .failure()
        .get_output()
        .stderr
        .clone();
    assert!(String::from_utf8_lossy(&output).contains("invalid redundancy"));
}

#[test]
fn plan_exports_reports_from_config_file() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("dcpower.toml"),
        r#"
[report]
output_dir = "out"

[plant]
it_load_kw = 200.0
whitespaces = 1
string_redundancy = "2+1"
"#,
    )
    .unwrap();

    let stdout = stdout_of(dcpowerctl(dir.path()).args(["plan", "--export"]));
    assert!(stdout.contains("Cooling chain"));
    assert!(stdout.contains("Power strings 2+1"));
    assert!(dir.path().join("out/power_strings.json").exists());
    assert!(dir.path().join("out/plant_sizing.json").exists());
}
