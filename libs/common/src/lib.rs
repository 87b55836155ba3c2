//! ColdWatch basic library
//!
//! Provides basic functions shared by all services, including:
//! - logging functions
//! - startup banner and bootstrap helpers
//! - common command-line arguments
//! - graceful shutdown signal handling

pub mod bootstrap_args;
pub mod logging;
pub mod service_bootstrap;
pub mod shutdown;

// Re-export common dependencies
pub use tokio;

// Re-export CLI dependencies when cli feature is enabled
#[cfg(feature = "cli")]
pub use clap;

// Re-export clap derive macros separately for proper macro resolution
#[cfg(feature = "cli")]
pub use clap::Parser;
