//! CSV Mirror Library
//!
//! A Rust library for keeping a small set of reference CSV datasets mirrored
//! locally from a remote dataset host. Remote checks are limited by a
//! cooldown window, downloads are published atomically and the freshness
//! state survives restarts in a JSON metadata file.

pub mod app;
pub mod cli;
pub mod config;
pub mod constants;
pub mod errors;
pub mod prelude;

// Re-export commonly used types for convenience
pub use errors::{AppError, Result};
