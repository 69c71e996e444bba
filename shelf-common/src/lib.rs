//! # Shelf Common Library
//!
//! Shared code for the shelf services:
//! - Error type and result alias
//! - Configuration loading (TOML bootstrap, ENV credentials)
//! - Event types (ShelfEvent enum) and the broadcast EventBus

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
