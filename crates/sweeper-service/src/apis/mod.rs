//! Handlers behind the HTTP API.

pub mod error;
pub mod settings;
pub mod sweep;
