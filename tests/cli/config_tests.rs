use super::common::{base_cmd, config_file};
use predicates::prelude::*;

#[test]
fn show_config_prints_file_contents() {
    let file = config_file(
        "base_path: file:///srv/app/\ninit: php index.php\nbreakpoints:\n  - index.php 12\n",
    );
    base_cmd()
        .args(["show-config", "--config"])
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("base_path: file:///srv/app/"))
        .stdout(predicate::str::contains("init: php index.php"))
        .stdout(predicate::str::contains("- index.php 12"))
        .stdout(predicate::str::contains("listen: 127.0.0.1:9003"));
}

#[test]
fn command_line_overrides_win() {
    let file = config_file("listen: 127.0.0.1:9000\naccept_timeout_secs: 2\n");
    base_cmd()
        .args(["show-config", "--listen", "0.0.0.0:9100", "--accept-timeout", "9", "--config"])
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("listen: 0.0.0.0:9100"))
        .stdout(predicate::str::contains("accept_timeout_secs: 9"));
}

#[test]
fn missing_config_file_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    base_cmd()
        .current_dir(dir.path())
        .arg("show-config")
        .assert()
        .success()
        .stdout(predicate::str::contains("base_path: ''"))
        .stdout(predicate::str::contains("accept_timeout_secs: 5"));
}

#[test]
fn unknown_key_is_rejected() {
    let file = config_file("base_path: /x/\nbreakpiontz: []\n");
    base_cmd()
        .args(["show-config", "--config"])
        .arg(file.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration error"))
        .stderr(predicate::str::contains("breakpiontz"));
}

#[test]
fn log_file_receives_logs() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("debug.log");
    let file = config_file("breakpoints: []\n");
    base_cmd()
        .args(["-v", "show-config", "--log-file"])
        .arg(&log)
        .arg("--config")
        .arg(file.path())
        .assert()
        .success()
        .stderr(predicate::str::is_empty());

    let logged = std::fs::read_to_string(&log).unwrap();
    assert!(logged.contains("loaded config"), "{logged}");
}
