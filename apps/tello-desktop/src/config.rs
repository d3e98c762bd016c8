//! # Configuration
//!
//! Runtime settings for the console, built from the command line and checked
//! before any socket or window is opened.

use crate::error::{Error, Result};
use crate::video::PlayerKind;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tello_core::protocol::{DEFAULT_CONTROL_PORT, DEFAULT_DRONE_ADDR, DEFAULT_VIDEO_PORT};
use tello_core::status::REDRAW_PERIOD;
use tello_core::{ControllerKind, VideoBitrate};

/// Font used by the console unless overridden.
pub const DEFAULT_FONT: &str = "assets/Inconsolata-Bold.ttf";

/// Interval between stick packets.
pub const STICK_PERIOD: Duration = Duration::from_millis(20);

/// Interval between video start requests once connected.
pub const VIDEO_KEEPALIVE: Duration = Duration::from_millis(500);

/// Interval between handshake attempts until the drone answers.
pub const CONNECT_RETRY: Duration = Duration::from_millis(500);

/// Complete runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub controller: ControllerKind,
    pub drone_addr: SocketAddr,
    /// Local control port; 0 picks any free port.
    pub control_port: u16,
    /// Local video port advertised in the handshake; 0 picks any free port.
    pub video_port: u16,
    pub player: PlayerKind,
    pub bitrate: VideoBitrate,
    pub font: PathBuf,
    /// Directory received pictures are saved to on exit.
    pub photo_dir: PathBuf,
    pub stick_period: Duration,
    pub video_keepalive: Duration,
    pub connect_retry: Duration,
    pub redraw_period: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            controller: ControllerKind::default(),
            drone_addr: SocketAddr::from(([192, 168, 10, 1], 8889)),
            control_port: DEFAULT_CONTROL_PORT,
            video_port: DEFAULT_VIDEO_PORT,
            player: PlayerKind::default(),
            bitrate: VideoBitrate::default(),
            font: PathBuf::from(DEFAULT_FONT),
            photo_dir: PathBuf::from("."),
            stick_period: STICK_PERIOD,
            video_keepalive: VIDEO_KEEPALIVE,
            connect_retry: CONNECT_RETRY,
            redraw_period: REDRAW_PERIOD,
        }
    }
}

impl Config {
    /// Parse a drone address, accepting `host:port` or a bare IP.
    pub fn parse_drone_addr(s: &str) -> Result<SocketAddr> {
        if let Ok(addr) = s.parse::<SocketAddr>() {
            return Ok(addr);
        }
        let port = DEFAULT_DRONE_ADDR
            .rsplit(':')
            .next()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(8889);
        s.parse::<std::net::IpAddr>()
            .map(|ip| SocketAddr::new(ip, port))
            .map_err(|_| Error::Config(format!("'{}' is not a drone address", s)))
    }

    /// Checks that only matter for the windowed console.
    pub fn validate_console(&self) -> Result<()> {
        if !self.font.is_file() {
            return Err(Error::Config(format!(
                "font file {} not found (use --font to point at a TTF file)",
                self.font.display()
            )));
        }
        self.validate_link()
    }

    /// Checks that matter whenever the link is started.
    pub fn validate_link(&self) -> Result<()> {
        if self.stick_period.is_zero() || self.video_keepalive.is_zero() || self.connect_retry.is_zero() {
            return Err(Error::Config("link periods must be non-zero".to_string()));
        }
        if self.control_port != 0 && self.control_port == self.video_port {
            return Err(Error::Config(format!(
                "control and video ports must differ (both {})",
                self.control_port
            )));
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_drone_firmware() {
        let config = Config::default();
        assert_eq!(config.drone_addr.to_string(), DEFAULT_DRONE_ADDR);
        assert_eq!(config.control_port, 8890);
        assert_eq!(config.video_port, 6038);
        assert_eq!(config.bitrate, VideoBitrate::Mbps1_5);
        assert!(config.validate_link().is_ok());
    }

    #[test]
    fn bare_ip_gets_default_port() {
        let addr = Config::parse_drone_addr("127.0.0.1").unwrap();
        assert_eq!(addr.port(), 8889);
        let addr = Config::parse_drone_addr("10.0.0.2:9000").unwrap();
        assert_eq!(addr.port(), 9000);
        assert!(Config::parse_drone_addr("tello").is_err());
    }

    #[test]
    fn clashing_ports_rejected() {
        let config = Config {
            control_port: 7000,
            video_port: 7000,
            ..Config::default()
        };
        assert!(matches!(config.validate_link(), Err(Error::Config(_))));
    }

    #[test]
    fn missing_font_rejected() {
        let config = Config {
            font: PathBuf::from("/nonexistent/font.ttf"),
            ..Config::default()
        };
        assert!(matches!(config.validate_console(), Err(Error::Config(_))));
    }
}
