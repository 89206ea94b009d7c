//! dapmux-config: layered TOML configuration for dapmux.

pub mod config;
pub mod error;
pub mod load;
pub mod merge;
pub mod paths;
pub mod validate;

pub use config::{
    AdapterConfig, AdaptersConfig, CapabilityOverrides, Config, HitConditionMode, LogConfig,
    LogLevel, SessionConfig,
};
pub use error::ConfigError;
pub use load::{load_config, load_from_str};
pub use paths::DefaultPaths;
