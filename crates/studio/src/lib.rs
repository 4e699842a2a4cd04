//! Command-line presentation layer for scenecast.
//!
//! Loads configuration, gates on an API key, submits one prompt, reports
//! progress, and writes the resulting video to disk.

pub mod cli;
pub mod config;
pub mod session;
