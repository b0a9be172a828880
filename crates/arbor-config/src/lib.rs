//! # Arbor Configuration
//!
//! Typed configuration for the Arbor server, loaded from a TOML file with
//! environment overrides applied on top.
//!
//! ```rust,no_run
//! use arbor_config::ArborConfig;
//! use std::path::Path;
//!
//! let config = ArborConfig::load(Some(Path::new("arbor.toml"))).unwrap();
//! println!("listening on {}", config.server.socket_addr());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod components;
mod loader;

pub use components::*;
pub use loader::*;
