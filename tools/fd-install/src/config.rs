//! Check tool configuration.
//!
//! Selects the backend under test, the ring settings for the in-process
//! engine, and logging output.

use serde::Deserialize;
use std::path::Path;

/// Configuration loaded from a TOML file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Backend under test: "emulated" (in-process table) or "uring" (kernel)
    #[serde(default)]
    pub engine: Engine,

    /// Ring settings for the emulated engine
    #[serde(default)]
    pub ring: io_direct::Config,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    /// In-process fixed file table
    #[default]
    Emulated,
    /// The kernel's fixed file table via io_uring (Linux 6.8+)
    Uring,
}

impl Engine {
    pub fn as_str(&self) -> &'static str {
        match self {
            Engine::Emulated => "emulated",
            Engine::Uring => "uring",
        }
    }
}

impl std::str::FromStr for Engine {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "emulated" => Ok(Engine::Emulated),
            "uring" | "io_uring" => Ok(Engine::Uring),
            _ => Err(format!(
                "invalid engine: '{s}' (expected 'emulated' or 'uring')"
            )),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format
    #[serde(default)]
    pub format: LogFormat,

    /// Include timestamps
    #[serde(default = "default_true")]
    pub timestamps: bool,

    /// Include thread names
    #[serde(default)]
    pub thread_names: bool,

    /// Include module target
    #[serde(default)]
    pub target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            timestamps: true,
            thread_names: false,
            target: false,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Multi-line human-readable output
    Pretty,
    /// Single-line human-readable output
    #[default]
    Compact,
    /// Newline-delimited JSON
    Json,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

/// Default configuration, printed by `--print-config`.
pub const DEFAULT_CONFIG: &str = r#"# fd-install configuration

# Backend under test: "emulated" or "uring"
engine = "emulated"

[ring]
# Submission queue entries
sq_entries = 64
# Worker threads executing submitted operations
workers = 1
# Maximum slots in a registered file table
max_files = 1048576

[logging]
# Log level: "error", "warn", "info", "debug", "trace"
# Can be overridden with RUST_LOG environment variable
level = "info"
# Log format: "pretty", "compact", or "json"
format = "compact"
# Include timestamps
timestamps = true
# Include thread names
thread_names = false
# Include module target
target = false
"#;

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse and validate configuration from TOML text.
    pub fn parse(contents: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        self.ring
            .validate()
            .map_err(|_| "ring: sq_entries, workers and max_files must be nonzero")?;

        match self.logging.level.to_lowercase().as_str() {
            "error" | "warn" | "info" | "debug" | "trace" => {}
            other => return Err(format!("invalid log level: '{other}'").into()),
        }

        Ok(())
    }
}
