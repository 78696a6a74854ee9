//! LAUNCHSCOUT: new-token discovery and alerting agent
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod alerts;
pub mod api;
pub mod config;
pub mod engine;
pub mod feeds;
pub mod types;
