//! Test plan for the `tradepost-config` crate.
//!
//! These tests exercise the configuration loader across default handling,
//! file discovery, environment overrides, and endpoint resolution.

use std::fs;
use std::path::{Path, PathBuf};

use serial_test::serial;
use tempfile::TempDir;

use tradepost_config::{load, AppConfig, SocketEnvironment};

const ENV_VARS_TO_RESET: &[&str] = &[
    "TRADEPOST_CONFIG",
    "TRADEPOST__API__BASE_URL",
    "TRADEPOST__API__REQUEST_TIMEOUT_SECONDS",
    "TRADEPOST__REALTIME__ENVIRONMENT",
    "TRADEPOST__REALTIME__EMULATOR_ENDPOINT",
    "TRADEPOST__REALTIME__DEVICE_ENDPOINT",
    "TRADEPOST__REALTIME__PRODUCTION_ENDPOINT",
    "TRADEPOST__REALTIME__CONNECT_TIMEOUT_SECONDS",
    "TRADEPOST__REALTIME__MAX_RECONNECT_ATTEMPTS",
    "TRADEPOST__REALTIME__RECONNECT_BASE_DELAY_MS",
    "TRADEPOST__REALTIME__RECONNECT_MAX_DELAY_MS",
    "TRADEPOST__REALTIME__TOKEN_POLL_ATTEMPTS",
    "TRADEPOST__REALTIME__TOKEN_POLL_DELAY_MS",
];

struct TestContext {
    vars: Vec<(String, Option<String>)>,
    original_dir: Option<PathBuf>,
}

impl TestContext {
    fn new() -> Self {
        Self {
            vars: Vec::new(),
            original_dir: None,
        }
    }

    fn reset_environment(&mut self) {
        for key in ENV_VARS_TO_RESET {
            self.remove_var(key);
        }
    }

    fn set_var(&mut self, key: &str, value: impl AsRef<str>) {
        let previous = std::env::var(key).ok();
        std::env::set_var(key, value.as_ref());
        self.vars.push((key.to_string(), previous));
    }

    fn remove_var(&mut self, key: &str) {
        let previous = std::env::var(key).ok();
        std::env::remove_var(key);
        self.vars.push((key.to_string(), previous));
    }

    fn set_current_dir(&mut self, dir: &Path) {
        if self.original_dir.is_none() {
            self.original_dir =
                Some(std::env::current_dir().expect("failed to capture current directory"));
        }
        std::env::set_current_dir(dir).expect("failed to set current directory");
    }
}

impl Drop for TestContext {
    fn drop(&mut self) {
        if let Some(original) = self.original_dir.take() {
            let _ = std::env::set_current_dir(original);
        }

        while let Some((key, value)) = self.vars.pop() {
            match value {
                Some(val) => std::env::set_var(&key, val),
                None => std::env::remove_var(&key),
            }
        }
    }
}

fn write_config_file(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("failed to create config directories");
    }
    fs::write(path, contents).expect("failed to write config file");
}

#[test]
#[serial]
fn load_uses_default_values_when_no_files_found() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.reset_environment();
    ctx.set_current_dir(temp_dir.path());

    let config = load().expect("configuration load should succeed without files");
    let defaults = AppConfig::default();

    assert_eq!(config.api.base_url, defaults.api.base_url);
    assert_eq!(
        config.api.request_timeout_seconds,
        defaults.api.request_timeout_seconds
    );
    assert_eq!(config.realtime.environment, SocketEnvironment::Production);
    assert_eq!(
        config.realtime.connect_timeout_seconds,
        defaults.realtime.connect_timeout_seconds
    );
    assert_eq!(
        config.realtime.max_reconnect_attempts,
        defaults.realtime.max_reconnect_attempts
    );
    assert_eq!(config.realtime.endpoint(), defaults.realtime.production_endpoint);
}

#[test]
#[serial]
fn load_picks_first_available_file_in_search_order() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.reset_environment();
    ctx.set_current_dir(temp_dir.path());

    write_config_file(
        temp_dir.path(),
        "tradepost.toml",
        r#"
        [realtime]
        connect_timeout_seconds = 20
        "#,
    );
    write_config_file(
        temp_dir.path(),
        "config/tradepost.toml",
        r#"
        [realtime]
        connect_timeout_seconds = 25
        "#,
    );

    let config = load().expect("configuration load should pick the first file");
    assert_eq!(config.realtime.connect_timeout_seconds, 20);
}

#[test]
#[serial]
fn load_merges_partial_file_with_defaults() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.reset_environment();
    ctx.set_current_dir(temp_dir.path());

    write_config_file(
        temp_dir.path(),
        "tradepost.toml",
        r#"
        [realtime]
        environment = "emulator"
        max_reconnect_attempts = 3
        "#,
    );

    let config = load().expect("configuration load should succeed");
    let defaults = AppConfig::default();

    assert_eq!(config.realtime.environment, SocketEnvironment::Emulator);
    assert_eq!(config.realtime.max_reconnect_attempts, 3);
    assert_eq!(config.realtime.endpoint(), defaults.realtime.emulator_endpoint);
    assert_eq!(config.api.base_url, defaults.api.base_url);
}

#[test]
#[serial]
fn load_applies_environment_overrides() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.reset_environment();
    ctx.set_current_dir(temp_dir.path());

    ctx.set_var("TRADEPOST__REALTIME__ENVIRONMENT", "device");
    ctx.set_var(
        "TRADEPOST__REALTIME__DEVICE_ENDPOINT",
        "ws://10.1.2.3:4000/realtime",
    );
    ctx.set_var("TRADEPOST__API__BASE_URL", "https://staging.tradepost.app/v1");

    let config = load().expect("configuration load should succeed");

    assert_eq!(config.realtime.environment, SocketEnvironment::Device);
    assert_eq!(config.realtime.endpoint(), "ws://10.1.2.3:4000/realtime");
    assert_eq!(config.api.base_url, "https://staging.tradepost.app/v1");
}

#[test]
#[serial]
fn load_prefers_explicit_config_path() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.reset_environment();
    ctx.set_current_dir(temp_dir.path());

    write_config_file(
        temp_dir.path(),
        "tradepost.toml",
        r#"
        [realtime]
        reconnect_base_delay_ms = 100
        "#,
    );
    write_config_file(
        temp_dir.path(),
        "explicit.toml",
        r#"
        [realtime]
        reconnect_base_delay_ms = 250
        "#,
    );

    ctx.set_var(
        "TRADEPOST_CONFIG",
        temp_dir.path().join("explicit.toml").to_string_lossy(),
    );

    let config = load().expect("configuration load should use the explicit path");
    assert_eq!(config.realtime.reconnect_base_delay_ms, 250);
}
