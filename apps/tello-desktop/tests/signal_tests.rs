//! Integration tests for signal-driven shutdown.
//!
//! Kept in their own test binary: a SIGTERM sent here reaches every signal
//! listener in the process.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]
#![cfg(unix)]

use std::time::Duration;
use tello_desktop::cli::shutdown_on_signals;
use tokio::time;

#[tokio::test]
async fn test_sigterm_requests_shutdown() {
    let mut shutdown = shutdown_on_signals().unwrap();
    assert!(!*shutdown.borrow());

    let status = std::process::Command::new("kill")
        .args(["-TERM", &std::process::id().to_string()])
        .status()
        .unwrap();
    assert!(status.success());

    time::timeout(Duration::from_secs(3), shutdown.wait_for(|stop| *stop))
        .await
        .expect("SIGTERM did not request shutdown")
        .unwrap();
}
