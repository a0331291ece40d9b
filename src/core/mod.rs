//! core
//!
//! Platform-neutral domain types and configuration.
//!
//! # Modules
//!
//! - [`types`] - Resources, auxiliary records and diff/commit summaries
//! - [`config`] - Configuration schema and loading

pub mod config;
pub mod types;
