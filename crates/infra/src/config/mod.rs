//! Configuration loading
//!
//! Loads [`erpsync_domain::EngineConfig`] from environment variables or
//! JSON/TOML files.

pub mod loader;

pub use loader::{load, load_from_env, load_from_file, probe_config_paths};
