use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub progression: ProgressionConfig,
    #[serde(default)]
    pub import: ImportConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Connection to a remote Mahakrama server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Server root, without the `/api/mahakrama` prefix
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Environment variable holding the bearer token
    #[serde(default = "default_token_env")]
    pub token_env: String,
    /// Per-request timeout in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    format!("http://localhost:{}", crate::rest::DEFAULT_PORT)
}

fn default_token_env() -> String {
    "MAHAKRAMA_API_TOKEN".to_string()
}

fn default_timeout() -> u64 {
    30
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token_env: default_token_env(),
            timeout_secs: default_timeout(),
        }
    }
}

/// Reference REST server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    /// Bearer token required on `/api/mahakrama` routes. Unset = open.
    #[serde(default)]
    pub auth_token: Option<String>,
}

fn default_port() -> u16 {
    crate::rest::DEFAULT_PORT
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            auth_token: None,
        }
    }
}

/// Who may start a new progression
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartPolicy {
    /// Refuse only while a step is current
    #[default]
    SingleCurrent,
    /// Refuse once the person has any history at all
    SingleTrack,
}

/// Transition rules shared by the engine and the server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressionConfig {
    /// Completions within this many calendar days need confirmation (default: 30)
    #[serde(default = "default_fast_completion_days")]
    pub fast_completion_days: i64,
    #[serde(default)]
    pub start_policy: StartPolicy,
    /// Start the next step by sequence the day after a completion
    #[serde(default)]
    pub auto_advance: bool,
}

fn default_fast_completion_days() -> i64 {
    30
}

impl Default for ProgressionConfig {
    fn default() -> Self {
        Self {
            fast_completion_days: default_fast_completion_days(),
            start_policy: StartPolicy::default(),
            auto_advance: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Records shown by `import --preview` (default: 5)
    #[serde(default = "default_preview_rows")]
    pub preview_rows: usize,
}

fn default_preview_rows() -> usize {
    5
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            preview_rows: default_preview_rows(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether `serve` logs to a file instead of stderr
    #[serde(default)]
    pub to_file: bool,

    /// Directory for log files
    #[serde(default = "default_log_dir")]
    pub dir: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_dir() -> String {
    ".mahakrama/logs".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            to_file: false,
            dir: default_log_dir(),
        }
    }
}

impl Config {
    /// Project-local config file
    pub fn local_config_path() -> PathBuf {
        PathBuf::from(".mahakrama/config.toml")
    }

    pub fn load(config_path: Option<&str>) -> Result<Self> {
        // Start with embedded defaults so the tool works without config files
        let defaults = Config::default();
        let defaults_json =
            serde_json::to_string(&defaults).context("Failed to serialize default config")?;

        let mut builder = config::Config::builder().add_source(config::File::from_str(
            &defaults_json,
            config::FileFormat::Json,
        ));

        let local_config = Self::local_config_path();
        if local_config.exists() {
            builder = builder.add_source(config::File::from(local_config));
        }

        // User config in ~/.config/mahakrama/ (optional global overrides)
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("mahakrama").join("config.toml");
            if user_config.exists() {
                builder = builder.add_source(config::File::from(user_config));
            }
        }

        // Explicit config file (CLI override)
        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path));
        }

        // Environment variables with MAHAKRAMA__ prefix, e.g. MAHAKRAMA__SERVER__PORT
        builder = builder.add_source(
            config::Environment::with_prefix("MAHAKRAMA")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to load configuration")?;
        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Save config to `.mahakrama/config.toml`
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::local_config_path())
    }

    pub fn save_to(&self, config_path: &std::path::Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let toml_str =
            toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        std::fs::write(config_path, toml_str).context("Failed to write config file")?;

        Ok(())
    }

    /// Get absolute path to the logs directory
    pub fn logs_path(&self) -> PathBuf {
        let path = PathBuf::from(&self.logging.dir);
        if path.is_absolute() {
            path
        } else {
            std::env::current_dir().unwrap_or_default().join(path)
        }
    }
}
