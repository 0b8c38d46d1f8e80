//! CLI command implementations.
//!
//! - [`load`] - Load images through the dispatcher
//! - [`config`] - Configuration management (show, path, init)

pub mod config;
pub mod load;
