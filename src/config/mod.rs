//! Configuration module
//!
//! - types.rs: Configuration sections and their defaults
//! - io.rs: Layered loading (defaults < TOML file < environment)
//! - validation.rs: Configuration validation
//! - paths.rs: Configuration file paths

mod io;
mod paths;
mod types;
mod validation;

pub use types::{
    BackfillConfig, Config, DatabaseConfig, GatewayConfig, GenerationConfig, GoogleConfig,
    LogConfig, LogFormat, RetrievalConfig,
};

pub use io::{apply_env_overrides, load_config, load_config_from_path};
pub use paths::{config_dir, config_path};
pub use validation::{validate_config, ConfigValidationResult, ValidationIssue};
