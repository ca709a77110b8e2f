//! Front-end configuration management
//!
//! This crate provides configuration loading and parsing for the DSP front end:
//! - TOML configuration file parsing
//! - Chain configuration structures
//! - Runtime control registers shared between the host side and the chains

pub mod frontend_config;
pub mod toml_config;

pub use frontend_config::*;
pub use toml_config::*;
