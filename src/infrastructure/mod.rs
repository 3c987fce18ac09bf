//! Infrastructure layer module
//!
//! Cross-cutting concerns shared by every other layer:
//! - Configuration management
//! - Logging infrastructure

pub mod config;
pub mod logging;
