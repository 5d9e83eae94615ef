//! Shared types for the tunelift client: backend wire format, configuration,
//! platform paths and persisted preferences.

pub mod api;
pub mod config;
pub mod platform;
pub mod prefs;
