//! Configuration module for Forum-Harvest
//!
//! This module handles loading, parsing, and validating the TOML
//! configuration file and reading login credentials from the environment.
//!
//! # Example
//!
//! ```no_run
//! use forum_harvest::config::load_config_or_default;
//! use std::path::Path;
//!
//! let (config, _hash) = load_config_or_default(Path::new("config.toml")).unwrap();
//! println!("Harvesting {}", config.forum.base_url);
//! ```

mod credentials;
mod parser;
mod types;
mod validation;

pub use credentials::{Credentials, PASSWORD_VAR, USERNAME_VAR};
pub use types::{Config, CrawlerConfig, FilterConfig, ForumConfig, OutputConfig};

pub use parser::{
    compute_config_hash, load_config, load_config_or_default, load_config_with_hash, parse_config,
};
