//! CLI command implementations.

pub mod branch;
pub mod classify;
pub mod config;
pub mod run;
