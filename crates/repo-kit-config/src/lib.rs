//! Configuration and file management for repo-kit
//!
//! This crate provides:
//! - File path utilities for config, cache and OAuth store directories
//! - Configuration file loading (TOML)
//! - Application configuration (AppConfig) with environment overrides
//! - Persistence of the last signed-in account

pub mod app_config;
pub mod config_file;
pub mod last_signed_in;
pub mod paths;

pub use app_config::AppConfig;
pub use config_file::load_config_file;
pub use last_signed_in::LastSignedIn;
