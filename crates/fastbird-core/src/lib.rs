//! Core types, config, errors, content catalog, and session model for Fast Bird.

pub mod config;
pub mod content;
pub mod error;
pub mod session;
pub mod store;

pub use error::{FastbirdError, Result};
