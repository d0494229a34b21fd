use std::fs;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::tempdir;

fn valid_alarm_json() -> &'static str {
    r#"
{
  "version": 1,
  "alarms": [
    {
      "id": 1,
      "time": "07:30",
      "label": "Wake up",
      "sound": "chime",
      "repeat": true
    },
    {
      "id": 2,
      "time": "21:00",
      "label": "Wind down"
    }
  ]
}
"#
}

#[test]
fn check_succeeds_with_valid_files() {
    let dir = tempdir().expect("tempdir");
    let alarms = dir.path().join("alarms.json");
    fs::write(&alarms, valid_alarm_json()).expect("write json");
    let settings = dir.path().join("clock_settings.json");
    fs::write(&settings, r#"{"theme": "dark", "time_format": 12}"#).expect("write settings");

    let mut cmd = cargo_bin_cmd!("deskclock");
    cmd.arg("--check")
        .arg("--settings")
        .arg(settings)
        .arg("--alarms")
        .arg(alarms)
        .assert()
        .success()
        .stdout(predicate::str::contains("settings: loaded from"))
        .stdout(predicate::str::contains("loaded 2 alarm(s)"));
}

#[test]
fn check_reports_defaults_for_corrupt_settings() {
    let dir = tempdir().expect("tempdir");
    let settings = dir.path().join("clock_settings.json");
    fs::write(&settings, "{ not json").expect("write invalid settings");

    let mut cmd = cargo_bin_cmd!("deskclock");
    cmd.arg("--check")
        .arg("--settings")
        .arg(settings)
        .arg("--alarms")
        .arg(dir.path().join("alarms.json"))
        .assert()
        .success()
        .stdout(predicate::str::contains("settings: using defaults"))
        .stdout(predicate::str::contains("loaded 0 alarm(s)"));
}

#[test]
fn malformed_alarm_file_fails_with_clear_error() {
    let dir = tempdir().expect("tempdir");
    let alarms = dir.path().join("alarms.json");
    fs::write(&alarms, "{ not-valid-json ").expect("write invalid json");

    let mut cmd = cargo_bin_cmd!("deskclock");
    cmd.arg("--check")
        .arg("--settings")
        .arg(dir.path().join("clock_settings.json"))
        .arg("--alarms")
        .arg(alarms)
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid JSON"));
}

#[test]
fn duplicate_alarm_ids_fail() {
    let dir = tempdir().expect("tempdir");
    let alarms = dir.path().join("alarms.json");
    fs::write(
        &alarms,
        r#"{"version": 1, "alarms": [
            { "id": 3, "time": "07:30" },
            { "id": 3, "time": "08:00" }
        ]}"#,
    )
    .expect("write json");

    let mut cmd = cargo_bin_cmd!("deskclock");
    cmd.arg("--check")
        .arg("--settings")
        .arg(dir.path().join("clock_settings.json"))
        .arg("--alarms")
        .arg(alarms)
        .assert()
        .failure()
        .stderr(predicate::str::contains("duplicate alarm id"));
}

#[test]
fn missing_alarm_file_is_an_empty_set() {
    let dir = tempdir().expect("tempdir");

    let mut cmd = cargo_bin_cmd!("deskclock");
    cmd.arg("--check")
        .arg("--settings")
        .arg(dir.path().join("clock_settings.json"))
        .arg("--alarms")
        .arg(dir.path().join("alarms.json"))
        .assert()
        .success()
        .stdout(predicate::str::contains("loaded 0 alarm(s)"));
}
