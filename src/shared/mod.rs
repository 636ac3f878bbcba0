//! Shared infrastructure-free helpers: configuration.

pub mod config;
