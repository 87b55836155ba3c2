//! Common command-line arguments for all ColdWatch services
//!
//! Service binaries define their own `clap` parser and convert into
//! [`ServiceArgs`] for the shared bootstrap helpers.

#[cfg(feature = "cli")]
use clap::Parser;

/// Common service startup arguments
#[derive(Debug, Clone)]
#[cfg_attr(feature = "cli", derive(Parser))]
#[cfg_attr(feature = "cli", clap(author, version, about))]
pub struct ServiceArgs {
    /// Log level (trace, debug, info, warn, error)
    #[cfg_attr(feature = "cli", clap(short = 'l', long, default_value = "info"))]
    pub log_level: String,

    /// Optional bind address override (e.g., 0.0.0.0:5060)
    #[cfg_attr(feature = "cli", clap(short = 'b', long, env = "BIND_ADDRESS"))]
    pub bind_address: Option<String>,

    /// Disable colored output (useful for log files)
    #[cfg_attr(feature = "cli", clap(long))]
    pub no_color: bool,

    /// Only validate configuration without starting service
    #[cfg_attr(feature = "cli", clap(long))]
    pub validate: bool,

    /// Configuration file path override
    #[cfg_attr(feature = "cli", clap(short = 'c', long, env = "CONFIG_PATH"))]
    pub config_path: Option<String>,
}

impl Default for ServiceArgs {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            bind_address: None,
            no_color: false,
            validate: false,
            config_path: None,
        }
    }
}

impl ServiceArgs {
    /// Parse log level string to tracing::Level
    pub fn parse_log_level(&self) -> tracing::Level {
        match self.log_level.to_lowercase().as_str() {
            "trace" => tracing::Level::TRACE,
            "debug" => tracing::Level::DEBUG,
            "warn" | "warning" => tracing::Level::WARN,
            "error" => tracing::Level::ERROR,
            _ => tracing::Level::INFO,
        }
    }

    /// Configuration file path with fallback to the given default
    pub fn get_config_path(&self, default_path: &str) -> String {
        if let Some(path) = &self.config_path {
            return path.clone();
        }
        default_path.to_string()
    }
}
