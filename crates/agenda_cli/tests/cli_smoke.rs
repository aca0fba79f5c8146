use std::path::PathBuf;
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_path(file_name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("agenda-{nanos}-{file_name}"))
}

#[test]
fn cli_smoke_help() {
    let exe = env!("CARGO_BIN_EXE_agenda");
    let output = Command::new(exe)
        .arg("--help")
        .output()
        .expect("failed to run agenda --help");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("agenda"));
    assert!(stdout.contains("ring"));
}

#[test]
fn unknown_subcommand_is_invalid_input() {
    let exe = env!("CARGO_BIN_EXE_agenda");
    let output = Command::new(exe)
        .arg("snooze")
        .output()
        .expect("failed to run agenda snooze");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.starts_with("ERROR: invalid_input - "));
}

#[test]
fn malformed_override_is_rejected() {
    let exe = env!("CARGO_BIN_EXE_agenda");
    let config_path = temp_path("smoke-config.json");
    let snapshot_path = temp_path("smoke-snapshot.json");

    let output = Command::new(exe)
        .args(["--config-override", "colour=red", "check"])
        .env("AGENDA_CONFIG_PATH", &config_path)
        .env("AGENDA_SNAPSHOT_PATH", &snapshot_path)
        .output()
        .expect("failed to run agenda check");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unknown config field 'colour'"));
}

#[test]
fn broken_config_falls_back_with_warning() {
    let exe = env!("CARGO_BIN_EXE_agenda");
    let config_path = temp_path("smoke-broken-config.json");
    let snapshot_path = temp_path("smoke-empty-snapshot.json");
    std::fs::write(&config_path, "{ not json").unwrap();

    let output = Command::new(exe)
        .args(["--config-override", "utc_offset=+00:00", "check"])
        .env("AGENDA_CONFIG_PATH", &config_path)
        .env("AGENDA_SNAPSHOT_PATH", &snapshot_path)
        .output()
        .expect("failed to run agenda check");

    std::fs::remove_file(&config_path).ok();
    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("WARN: using default config"));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("0 task(s) and 0 alarm(s) valid"));
}
