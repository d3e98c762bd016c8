//! # Error Types
//!
//! Everything that can stop the console, with conversions from the layers
//! underneath it.

use std::time::Duration;
use thiserror::Error;

/// Result alias for the application crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors from the tello-desktop application.
#[derive(Debug, Error)]
pub enum Error {
    /// Socket, process or terminal I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Protocol or mapping error from tello-core.
    #[error(transparent)]
    Core(#[from] tello_core::Error),

    /// JSON serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration rejected before start-up.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The external video player could not be started.
    #[error("video player '{program}' failed to start: {reason}")]
    Player { program: String, reason: String },

    /// SDL2 (window, font or input) failure.
    #[error("SDL error: {0}")]
    Sdl(String),

    /// The drone never answered the handshake.
    #[error("drone did not answer within {0:?}")]
    ConnectTimeout(Duration),
}
