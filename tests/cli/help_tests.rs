use super::common::base_cmd;
use predicates::prelude::*;

#[test]
fn top_level_help_lists_subcommands() {
    base_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("interactive"))
        .stdout(predicate::str::contains("show-config"))
        .stdout(predicate::str::contains("--log-file"));
}

#[test]
fn interactive_help_shows_overrides() {
    base_cmd()
        .args(["interactive", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--listen"))
        .stdout(predicate::str::contains("--accept-timeout"))
        .stdout(predicate::str::contains("--no-history"));
}

#[test]
fn missing_subcommand_is_a_usage_error() {
    base_cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn quiet_and_verbose_conflict() {
    base_cmd()
        .args(["-q", "-v", "show-config"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}
