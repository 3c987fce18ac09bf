//! Domain layer for the fixloop repair system
//!
//! This module contains core models, errors and the ports external
//! collaborators are plugged into.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult};
