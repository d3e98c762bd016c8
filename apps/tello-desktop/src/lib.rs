//! # Tello Desktop Library
//!
//! This library exposes the console modules for testing and integration.
//!
//! The main binary uses these modules through the `main.rs` entry point.

pub mod cli;
pub mod config;
#[cfg(feature = "gui")]
pub mod console;
pub mod error;
pub mod input;
pub mod link;
pub mod monitor;
pub mod photos;
pub mod video;

pub use error::{Error, Result};

// Re-export tello_core for convenience
pub use tello_core;
