//! # IMGLINK Common Library
//!
//! Shared code for the IMGLINK back-office services including:
//! - Error types
//! - Event types (ScanEvent enum) and the EventBus
//! - Configuration loading and root folder resolution

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
