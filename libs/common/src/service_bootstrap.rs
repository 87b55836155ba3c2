//! Unified service bootstrap utilities
//!
//! Startup banner, logging initialization and development environment setup.

use crate::bootstrap_args::ServiceArgs;
use crate::logging::{self, LogConfig};
use errors::{config_error, ColdwatchResult};
use tracing::info;

/// Service metadata for startup
pub struct ServiceInfo {
    /// Service name (e.g., "alarmsrv")
    pub name: String,
    /// Service version from Cargo.toml
    pub version: String,
    /// Service description
    pub description: String,
    /// Default listening port
    pub default_port: u16,
}

impl ServiceInfo {
    /// Create new service info
    pub fn new(name: impl Into<String>, description: impl Into<String>, default_port: u16) -> Self {
        Self {
            name: name.into(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            description: description.into(),
            default_port,
        }
    }
}

/// Print unified startup banner for any service
pub fn print_startup_banner(service: &ServiceInfo) {
    let banner = r#"
  ██████╗ ██████╗ ██╗     ██████╗ ██╗    ██╗ █████╗ ████████╗ ██████╗██╗  ██╗
 ██╔════╝██╔═══██╗██║     ██╔══██╗██║    ██║██╔══██╗╚══██╔══╝██╔════╝██║  ██║
 ██║     ██║   ██║██║     ██║  ██║██║ █╗ ██║███████║   ██║   ██║     ███████║
 ██║     ██║   ██║██║     ██║  ██║██║███╗██║██╔══██║   ██║   ██║     ██╔══██║
 ╚██████╗╚██████╔╝███████╗██████╔╝╚███╔███╔╝██║  ██║   ██║   ╚██████╗██║  ██║
  ╚═════╝ ╚═════╝ ╚══════╝╚═════╝  ╚══╝╚══╝ ╚═╝  ╚═╝   ╚═╝    ╚═════╝╚═╝  ╚═╝
    "#;

    info!("{}", banner);
    info!("");
    info!(" {} v{}", service.name.to_uppercase(), service.version);
    info!(" {}", service.description);
    info!(" Default Port: {}", service.default_port);
    info!("");
}

/// Initialize logging for a service
///
/// Log root directory priority:
/// 1. COLDWATCH_LOG_DIR environment variable
/// 2. `config_log_dir` (from the service configuration)
/// 3. Default "logs"
pub fn init_logging(
    service: &ServiceInfo,
    args: &ServiceArgs,
    config_log_dir: Option<&str>,
) -> ColdwatchResult<()> {
    logging::init_log_root(config_log_dir);

    let log_dir = logging::get_log_root().join(&service.name);

    let log_config = LogConfig {
        service_name: service.name.clone(),
        log_dir,
        console_level: args.parse_log_level(),
        no_color: args.no_color,
    };

    logging::init_with_config(log_config)
        .map_err(|e| config_error!("Failed to init logging: {}", e))
}

/// Load environment variables in development mode
///
/// In debug builds, reads .env file and sets variables that are not already set.
/// In release builds, this is a no-op.
pub fn load_development_env() {
    #[cfg(debug_assertions)]
    {
        if let Ok(content) = std::fs::read_to_string(".env") {
            for line in content.lines() {
                let trimmed = line.trim();
                if trimmed.starts_with('#') || trimmed.is_empty() {
                    continue;
                }

                if let Some((key, value)) = trimmed.split_once('=') {
                    let key = key.trim();
                    if std::env::var(key).is_err() {
                        std::env::set_var(key, value.trim());
                    }
                }
            }
        }
    }
}
