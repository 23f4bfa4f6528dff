use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

const DEFAULT_CONFIG_FILES: &[&str] = &[
    "tradepost.toml",
    "config/tradepost.toml",
    "crates/config/tradepost.toml",
    "../tradepost.toml",
    "../config/tradepost.toml",
    "../crates/config/tradepost.toml",
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub realtime: RealtimeConfig,
}

/// Base settings for REST calls made at the edges of the realtime core
/// (push-token registration and similar one-shot boundary calls).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    #[serde(default = "ApiConfig::default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl ApiConfig {
    const fn default_request_timeout() -> u64 {
        30
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.tradepost.app/v1".to_string(),
            request_timeout_seconds: Self::default_request_timeout(),
        }
    }
}

/// Which socket endpoint the client should dial.
///
/// Mobile debugging needs three distinct addresses: the Android emulator
/// reaches the host machine through its loopback alias, a physical device
/// needs the host's LAN address, and production uses the public endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SocketEnvironment {
    Emulator,
    Device,
    Production,
}

/// Tuning knobs for the realtime connection layer.
///
/// ```
/// use tradepost_config::RealtimeConfig;
///
/// let realtime = RealtimeConfig::default();
/// assert_eq!(realtime.connect_timeout_seconds, 15);
/// assert_eq!(realtime.max_reconnect_attempts, 10);
/// assert!(realtime.endpoint().starts_with("ws"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    #[serde(default = "RealtimeConfig::default_environment")]
    pub environment: SocketEnvironment,
    #[serde(default = "RealtimeConfig::default_emulator_endpoint")]
    pub emulator_endpoint: String,
    #[serde(default = "RealtimeConfig::default_device_endpoint")]
    pub device_endpoint: String,
    #[serde(default = "RealtimeConfig::default_production_endpoint")]
    pub production_endpoint: String,
    /// Hard deadline for a single connect attempt.
    #[serde(default = "RealtimeConfig::default_connect_timeout")]
    pub connect_timeout_seconds: u64,
    /// Cap on automatic reconnection attempts before the connection is
    /// considered failed and left to an explicit user retry.
    #[serde(default = "RealtimeConfig::default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
    #[serde(default = "RealtimeConfig::default_reconnect_base_delay")]
    pub reconnect_base_delay_ms: u64,
    #[serde(default = "RealtimeConfig::default_reconnect_max_delay")]
    pub reconnect_max_delay_ms: u64,
    /// How many times the token source is polled per connect attempt before
    /// the attempt fails; tolerates secure-storage races during app startup.
    #[serde(default = "RealtimeConfig::default_token_poll_attempts")]
    pub token_poll_attempts: u32,
    #[serde(default = "RealtimeConfig::default_token_poll_delay")]
    pub token_poll_delay_ms: u64,
}

impl RealtimeConfig {
    const fn default_environment() -> SocketEnvironment {
        SocketEnvironment::Production
    }

    fn default_emulator_endpoint() -> String {
        "ws://10.0.2.2:4000/realtime".to_string()
    }

    fn default_device_endpoint() -> String {
        "ws://192.168.1.100:4000/realtime".to_string()
    }

    fn default_production_endpoint() -> String {
        "wss://realtime.tradepost.app/socket".to_string()
    }

    const fn default_connect_timeout() -> u64 {
        15
    }

    const fn default_max_reconnect_attempts() -> u32 {
        10
    }

    const fn default_reconnect_base_delay() -> u64 {
        500
    }

    const fn default_reconnect_max_delay() -> u64 {
        10_000
    }

    const fn default_token_poll_attempts() -> u32 {
        5
    }

    const fn default_token_poll_delay() -> u64 {
        500
    }

    /// Resolve the socket endpoint for the configured environment.
    pub fn endpoint(&self) -> &str {
        match self.environment {
            SocketEnvironment::Emulator => &self.emulator_endpoint,
            SocketEnvironment::Device => &self.device_endpoint,
            SocketEnvironment::Production => &self.production_endpoint,
        }
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            environment: Self::default_environment(),
            emulator_endpoint: Self::default_emulator_endpoint(),
            device_endpoint: Self::default_device_endpoint(),
            production_endpoint: Self::default_production_endpoint(),
            connect_timeout_seconds: Self::default_connect_timeout(),
            max_reconnect_attempts: Self::default_max_reconnect_attempts(),
            reconnect_base_delay_ms: Self::default_reconnect_base_delay(),
            reconnect_max_delay_ms: Self::default_reconnect_max_delay(),
            token_poll_attempts: Self::default_token_poll_attempts(),
            token_poll_delay_ms: Self::default_token_poll_delay(),
        }
    }
}

/// Load the application configuration by combining defaults, files, and environment overrides.
///
/// ```
/// use tradepost_config::load;
///
/// std::env::remove_var("TRADEPOST_CONFIG");
///
/// let config = load().expect("configuration should load with defaults");
/// assert!(!config.api.base_url.is_empty());
/// ```
pub fn load() -> anyhow::Result<AppConfig> {
    let defaults = AppConfig::default();

    let mut builder = config::Config::builder();
    builder = builder
        .set_default("api.base_url", defaults.api.base_url.clone())
        .unwrap()
        .set_default(
            "api.request_timeout_seconds",
            i64::try_from(defaults.api.request_timeout_seconds).unwrap_or(i64::MAX),
        )
        .unwrap()
        .set_default("realtime.environment", "production")
        .unwrap()
        .set_default(
            "realtime.emulator_endpoint",
            defaults.realtime.emulator_endpoint.clone(),
        )
        .unwrap()
        .set_default(
            "realtime.device_endpoint",
            defaults.realtime.device_endpoint.clone(),
        )
        .unwrap()
        .set_default(
            "realtime.production_endpoint",
            defaults.realtime.production_endpoint.clone(),
        )
        .unwrap()
        .set_default(
            "realtime.connect_timeout_seconds",
            i64::try_from(defaults.realtime.connect_timeout_seconds).unwrap_or(i64::MAX),
        )
        .unwrap()
        .set_default(
            "realtime.max_reconnect_attempts",
            i64::from(defaults.realtime.max_reconnect_attempts),
        )
        .unwrap()
        .set_default(
            "realtime.reconnect_base_delay_ms",
            i64::try_from(defaults.realtime.reconnect_base_delay_ms).unwrap_or(i64::MAX),
        )
        .unwrap()
        .set_default(
            "realtime.reconnect_max_delay_ms",
            i64::try_from(defaults.realtime.reconnect_max_delay_ms).unwrap_or(i64::MAX),
        )
        .unwrap()
        .set_default(
            "realtime.token_poll_attempts",
            i64::from(defaults.realtime.token_poll_attempts),
        )
        .unwrap()
        .set_default(
            "realtime.token_poll_delay_ms",
            i64::try_from(defaults.realtime.token_poll_delay_ms).unwrap_or(i64::MAX),
        )
        .unwrap();

    let environment_overrides = config::Environment::with_prefix("TRADEPOST").separator("__");

    let mut config_file_attached = false;

    if let Ok(path) = std::env::var("TRADEPOST_CONFIG") {
        builder = builder.add_source(config::File::from(PathBuf::from(&path)));
        config_file_attached = true;
        debug!(path, "loading configuration via TRADEPOST_CONFIG");
    } else if let Ok(cwd) = std::env::current_dir() {
        let fallback = DEFAULT_CONFIG_FILES
            .iter()
            .map(|candidate| cwd.join(candidate))
            .find(|path| path.exists());

        if let Some(path) = fallback {
            debug!(path = %path.display(), "loading configuration file");
            builder = builder.add_source(config::File::from(path));
            config_file_attached = true;
        }
    }

    if !config_file_attached {
        debug!("no configuration file found, relying on defaults and environment overrides");
    }

    builder = builder.add_source(environment_overrides);

    let cfg = builder.build().context("unable to build configuration")?;

    let config = cfg
        .try_deserialize::<AppConfig>()
        .context("invalid configuration")?;

    debug!(?config, "loaded client configuration");
    Ok(config)
}
