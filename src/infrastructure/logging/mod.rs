//! Logging infrastructure
//!
//! Structured logging using tracing and tracing-subscriber:
//! - Console output (pretty or JSON) on stderr
//! - Rolling JSON log files
//! - Secret scrubbing for text leaving the process

pub mod logger;
pub mod secret_scrubbing;

pub use logger::LoggerImpl;
pub use secret_scrubbing::{scrub, SecretScrubber};
