#![allow(dead_code)]

use assert_cmd::Command;
use std::path::PathBuf;
use tempfile::TempDir;

/// Test harness for running CLI commands against a temporary database
pub struct CliTestHarness {
    temp_dir: TempDir,
    db_path: PathBuf,
    env: Vec<(String, String)>,
}

impl CliTestHarness {
    pub fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let db_path = temp_dir.path().join("test.db");

        Self {
            temp_dir,
            db_path,
            env: Vec::new(),
        }
    }

    /// Adds an environment variable to every command this harness runs.
    pub fn with_env(mut self, key: &str, value: &str) -> Self {
        self.env.push((key.to_string(), value.to_string()));
        self
    }

    /// A command isolated from the user's config file and environment
    pub fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("cadence").expect("Failed to find cadence binary");

        cmd.current_dir(self.temp_dir.path())
            .env_remove("CADENCE_LOG")
            .env("CADENCE_DATABASE_PATH", &self.db_path)
            .env("CADENCE_TIMEZONE", "UTC");
        for (key, value) in &self.env {
            cmd.env(key, value);
        }

        cmd
    }

    pub fn run_success(&self, args: &[&str]) -> assert_cmd::assert::Assert {
        self.command().args(args).assert().success()
    }

    pub fn run_failure(&self, args: &[&str]) -> assert_cmd::assert::Assert {
        self.command().args(args).assert().failure()
    }

    /// Runs `add` and returns the full ID of the created occurrence.
    pub fn add(&self, args: &[&str]) -> String {
        let mut full_args = vec!["add"];
        full_args.extend_from_slice(args);
        let output = self.run_success(&full_args).get_output().stdout.clone();
        extract_id(&String::from_utf8_lossy(&output), "ID: ")
            .expect("add should print the new ID")
    }

    /// Runs `done` and returns the ID of the spawned occurrence, if any.
    pub fn done(&self, args: &[&str]) -> Option<String> {
        let mut full_args = vec!["done"];
        full_args.extend_from_slice(args);
        let output = self.run_success(&full_args).get_output().stdout.clone();
        extract_id(&String::from_utf8_lossy(&output), "Next ID: ")
    }
}

/// Finds the line starting with `label` and returns the rest of it.
pub fn extract_id(output: &str, label: &str) -> Option<String> {
    output
        .lines()
        .find_map(|line| line.trim().strip_prefix(label))
        .map(|id| id.trim().to_string())
}

/// Utility functions for test assertions
pub mod assertions {
    use predicates::prelude::*;

    pub fn has_occurrence_table_headers() -> impl Predicate<str> {
        predicate::str::contains("ID")
            .and(predicate::str::contains("Title"))
            .and(predicate::str::contains("Status"))
    }

    pub fn created_successfully() -> impl Predicate<str> {
        predicate::str::contains("✓").and(predicate::str::contains("Created"))
    }

    pub fn has_error() -> impl Predicate<str> {
        predicate::str::contains("Error")
    }
}
