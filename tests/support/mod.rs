//! Stand-in agent CLIs for tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use agent_cli_sdk::AdapterConfig;

/// Write an executable `sh` script named `name` into `dir`.
#[cfg(unix)]
pub fn fake_cli(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write script");
    let mut perms = std::fs::metadata(&path).expect("stat script").permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).expect("chmod script");
    path
}

/// A script that prints `lines` to stdout, one per line, and exits `code`.
#[cfg(unix)]
pub fn printing_cli(dir: &Path, lines: &[&str], code: i32) -> PathBuf {
    let mut body = String::from("cat <<'EOF'\n");
    for line in lines {
        body.push_str(line);
        body.push('\n');
    }
    body.push_str("EOF\n");
    body.push_str(&format!("exit {code}"));
    fake_cli(dir, "agent", &body)
}

pub fn config_for(path: &Path) -> AdapterConfig {
    AdapterConfig {
        cli_path: Some(path.display().to_string()),
        ..AdapterConfig::default()
    }
}

pub fn args(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}
