//! Configuration management for kv-bulk.
//!
//! This crate provides types and loaders for managing remote KV connection
//! configuration from environment variables, config-file profiles and
//! explicit overrides.

#![cfg_attr(not(test), warn(clippy::unwrap_used))]

pub mod constants;
pub mod loader;
pub mod types;

pub use loader::{ConfigError, ConfigLoader, default_config_path, env_var_or_none};
pub use types::{
    AccountConfig, ApiConfig, AuthConfig, AuthStrategy, Config, ConfigFile, ProfileConfig,
};
