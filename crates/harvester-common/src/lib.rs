//! Harvester Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared error handling and logging for the Harvester workspace.
//!
//! # Overview
//!
//! This crate provides functionality used across all Harvester workspace
//! members:
//!
//! - **Error Handling**: the workspace-wide error and result types
//! - **Logging**: tracing-based logging configuration and initialization

pub mod error;
pub mod logging;

// Re-export commonly used types
pub use error::{HarvesterError, Result};
