//! Layerforge Core - Foundational Types
//!
//! Error taxonomy and configuration shared by the layered build runtime
//! and the command-line front end.

pub mod config;
pub mod error;

// Re-export commonly used types
pub use config::{FsVersion, WhiteoutSpec, WorkflowConfig, DEFAULT_BUILDER};
pub use error::{BuildError, Result};

/// Layerforge version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
