#![allow(deprecated)] // TODO: cargo_bin → cargo_bin_cmd! migration

use assert_cmd::Command;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub struct TestProject {
    pub root: TempDir,
}

impl TestProject {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        Self { root }
    }

    pub fn path(&self) -> PathBuf {
        self.root.path().to_path_buf()
    }

    #[allow(dead_code)]
    pub fn write_config(&self, content: &str) {
        let dir = self.root.path().join(".steadystate");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("config.yaml"), content).unwrap();
    }

    #[allow(dead_code)]
    pub fn state_file(&self) -> PathBuf {
        self.root.path().join(".steadystate").join("state.json")
    }

    /// `steady` running inside the project, isolated from the caller's env
    pub fn steady(&self) -> Command {
        steady_in(self.root.path())
    }

    /// Run a command that must succeed
    #[allow(dead_code)]
    pub fn run(&self, args: &[&str]) {
        self.steady().args(args).assert().success();
    }
}

pub fn steady_in(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("steady").unwrap();
    cmd.current_dir(dir)
        .env_remove("STEADYSTATE_CONFIG")
        .env_remove("STEADYSTATE_DIR")
        .env_remove("RUST_LOG")
        .env("NO_COLOR", "1");
    cmd
}
