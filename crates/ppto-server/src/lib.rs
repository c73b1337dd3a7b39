//! Server configuration for the `ppto-server` binary.

pub mod settings;

pub use settings::{ClassesConfig, ServerConfig};
