use assert_cmd::Command;
use std::io::Write;
use tempfile::NamedTempFile;

pub fn base_cmd() -> Command {
    let mut cmd = Command::cargo_bin("dbgp-debug").expect("binary built");
    cmd.env_remove("RUST_LOG").env_remove("DBGP_DEBUG_LOG");
    cmd
}

pub fn config_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp config");
    file.write_all(contents.as_bytes()).expect("write config");
    file
}
