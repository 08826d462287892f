use super::common::{base_cmd, config_file};
use predicates::prelude::*;

#[test]
fn help_then_quit() {
    let file = config_file("");
    base_cmd()
        .args(["interactive", "--no-history", "--config"])
        .arg(file.path())
        .write_stdin("help\nquit\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("step into / over / out"));
}

#[test]
fn commands_without_a_session_report_errors() {
    let file = config_file("");
    base_cmd()
        .args(["interactive", "--no-history", "--config"])
        .arg(file.path())
        .write_stdin("bl\ne $x\n")
        .assert()
        .success()
        .stderr(predicate::str::contains("phpdebug is not started"));
}

#[test]
fn start_times_out_without_an_engine() {
    let file = config_file("listen: 127.0.0.1:0\naccept_timeout_secs: 1\n");
    base_cmd()
        .args(["interactive", "--no-history", "--config"])
        .arg(file.path())
        .write_stdin("start\nquit\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("waiting on 127.0.0.1:"))
        .stderr(predicate::str::contains("Timed out after 1s"));
}
