//! Configuration module.
//!
//! Supports JSON configuration files, environment variable overrides, and
//! sensible compiled-in defaults.
//!
//! # Module Structure
//!
//! - [`types`]: Root `Config` struct
//! - [`server`]: Session/matchmaking and publisher behavior
//! - [`logging`]: Logging configuration
//! - [`loader`]: Configuration loading functions
//! - [`defaults`]: Default value functions

pub mod defaults;
pub mod loader;
pub mod logging;
pub mod server;
pub mod types;

pub use loader::load;

pub use logging::{LogFormat, LogLevel, LoggingConfig};

pub use server::{PublisherSection, ServerSection};

pub use types::Config;
