mod config;

pub use config::{Config, ConfigBuilder, ConfigWrapper, DEFAULT_CONFIG_PATH};
