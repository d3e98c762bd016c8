//! Integration tests for Tello Desktop CLI commands.
//!
//! Uses tempfile for the console font check and a loopback socket as the
//! drone for the monitor command.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use chrono::{TimeZone, Utc};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tello_core::protocol::msg;
use tello_core::status::CLOCK_FORMAT;
use tello_core::{ControllerKind, Packet, StatusScreen, Telemetry, VideoBitrate};
use tello_desktop::Error;
use tello_desktop::cli::{Cli, Commands, cmd_monitor, requested_help};
use tello_desktop::config::Config;
use tello_desktop::video::PlayerKind;
use tempfile::TempDir;
use tokio::net::UdpSocket;

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

fn parse(args: &[&str]) -> Cli {
    let mut argv = vec!["tello-desktop"];
    argv.extend_from_slice(args);
    Cli::try_parse_from(argv).unwrap()
}

/// Fake drone that answers every handshake and then reports a flight status.
async fn spawn_answering_drone() -> std::net::SocketAddr {
    let drone = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = drone.local_addr().unwrap();

    tokio::spawn(async move {
        let mut buf = vec![0u8; 2048];
        let mut status = vec![0u8; 24];
        status[12] = 66;
        let status = Packet::new(0x88, msg::FLIGHT_STATUS, status).encode();

        while let Ok((len, peer)) = drone.recv_from(&mut buf).await {
            if buf[..len].starts_with(b"conn_req:") {
                drone.send_to(b"conn_ack:\x00\x00", peer).await.unwrap();
                drone.send_to(&status, peer).await.unwrap();
            }
        }
    });

    addr
}

// =============================================================================
// ARGUMENT TESTS
// =============================================================================

#[test]
fn test_defaults() {
    let cli = parse(&[]);
    assert_eq!(cli.control, ControllerKind::Keyboard);
    assert_eq!(cli.player, PlayerKind::Mplayer);
    assert!(cli.command.is_none());

    let config = cli.config().unwrap();
    assert_eq!(config.drone_addr.to_string(), "192.168.10.1:8889");
    assert_eq!(config.control_port, 8890);
    assert_eq!(config.video_port, 6038);
    assert_eq!(config.bitrate, VideoBitrate::Mbps1_5);
}

#[test]
fn test_controller_names() {
    assert_eq!(parse(&["--control", "dualshock4"]).control, ControllerKind::DualShock4);
    assert_eq!(parse(&["--control", "tflightHotasX"]).control, ControllerKind::TFlightHotasX);
    assert!(Cli::try_parse_from(["tello-desktop", "--control", "xbox"]).is_err());
}

#[test]
fn test_monitor_subcommand() {
    let cli = parse(&["--player", "none", "monitor", "--period-ms", "250", "--count", "3"]);
    assert_eq!(cli.player, PlayerKind::None);
    assert_eq!(
        cli.command,
        Some(Commands::Monitor {
            period_ms: 250,
            count: Some(3),
            connect_timeout: 10,
        })
    );
}

#[test]
fn test_bare_drone_ip() {
    let config = parse(&["--drone", "10.0.0.7"]).config().unwrap();
    assert_eq!(config.drone_addr.to_string(), "10.0.0.7:8889");
}

#[test]
fn test_bad_bitrate_rejected() {
    let result = parse(&["--bitrate", "9"]).config();
    assert!(matches!(result, Err(Error::Core(tello_core::Error::InvalidBitrate(9)))));
}

#[test]
fn test_same_ports_rejected() {
    let result = parse(&["--control-port", "7000", "--video-port", "7000"]).config();
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_help_flags() {
    assert!(requested_help(&parse(&[])).is_none());
    assert!(requested_help(&parse(&["--keyhelp"])).unwrap().contains("<SPACE>"));
    assert!(requested_help(&parse(&["--joyhelp"])).is_some());
}

// =============================================================================
// CONSOLE CONFIG TESTS
// =============================================================================

#[test]
fn test_console_needs_font() {
    let temp = TempDir::new().unwrap();
    let font = temp.path().join("console.ttf");

    let missing = parse(&["--font", font.to_str().unwrap()]).config().unwrap();
    assert!(matches!(missing.validate_console(), Err(Error::Config(_))));

    std::fs::write(&font, b"not really a font").unwrap();
    let present = parse(&["--font", font.to_str().unwrap()]).config().unwrap();
    assert!(present.validate_console().is_ok());
}

#[test]
fn test_clock_line_names_zone() {
    let now = Utc.with_ymd_and_hms(2026, 10, 18, 10, 0, 0).unwrap();
    let clock = now.format(CLOCK_FORMAT).to_string();
    assert_eq!(clock, "Sun, 18 Oct 2026 10:00:00 UTC");

    let screen = StatusScreen::layout(&Telemetry::default(), &clock);
    assert_eq!(screen[1].text, clock);
}

#[test]
fn test_photo_dir_option() {
    assert_eq!(parse(&[]).config().unwrap().photo_dir, PathBuf::from("."));
    let config = parse(&["--photo-dir", "/tmp/flights"]).config().unwrap();
    assert_eq!(config.photo_dir, PathBuf::from("/tmp/flights"));
}

// =============================================================================
// MONITOR COMMAND TESTS
// =============================================================================

#[tokio::test]
async fn test_monitor_writes_count_lines() {
    let drone_addr = spawn_answering_drone().await;
    let config = Config {
        drone_addr,
        control_port: 0,
        video_port: 0,
        video_keepalive: Duration::from_millis(20),
        connect_retry: Duration::from_millis(20),
        ..Config::default()
    };

    let mut out = Vec::new();
    let written = cmd_monitor(
        &config,
        Duration::from_millis(20),
        Some(3),
        Duration::from_secs(3),
        &mut out,
    )
    .await
    .unwrap();
    assert_eq!(written, 3);

    let text = String::from_utf8(out).unwrap();
    let lines: Vec<serde_json::Value> = text.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
    assert_eq!(lines.len(), 3);
    assert!(lines.iter().all(|l| l["connected"] == true));
}

#[tokio::test]
async fn test_monitor_rejects_zero_period() {
    let result = cmd_monitor(
        &Config::default(),
        Duration::ZERO,
        Some(1),
        Duration::from_millis(10),
        &mut Vec::new(),
    )
    .await;
    assert!(matches!(result, Err(Error::Config(_))));
}

#[tokio::test]
async fn test_monitor_times_out_without_drone() {
    let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let config = Config {
        drone_addr: silent.local_addr().unwrap(),
        control_port: 0,
        video_port: 0,
        ..Config::default()
    };

    let result = cmd_monitor(
        &config,
        Duration::from_millis(10),
        Some(1),
        Duration::from_millis(100),
        &mut Vec::new(),
    )
    .await;
    assert!(matches!(result, Err(Error::ConnectTimeout(_))));
}
