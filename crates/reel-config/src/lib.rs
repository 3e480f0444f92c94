//! # Reel Config
//!
//! Layered configuration for the Reel GPU job scheduler: TOML files under
//! `config/`, then `REEL_`-prefixed environment variables.

pub mod app_config;
pub mod loader;

pub use app_config::*;
pub use loader::*;
