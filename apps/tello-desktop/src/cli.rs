//! # CLI Module
//!
//! Command-line interface for Tello Desktop.
//!
//! ```text
//! tello-desktop [--control keyboard|dualshock4|tflightHotasX] [fly]
//! tello-desktop monitor [--period-ms 1000] [--count N]
//! tello-desktop --keyhelp | --joyhelp
//! ```

use crate::config::{Config, DEFAULT_FONT};
use crate::error::{Error, Result};
use crate::link::DroneLink;
use crate::monitor;
use crate::video::PlayerKind;
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tello_core::controls::{joy_help, key_help};
use tello_core::protocol::{DEFAULT_CONTROL_PORT, DEFAULT_DRONE_ADDR, DEFAULT_VIDEO_PORT};
use tello_core::{ControllerKind, VideoBitrate};
use tokio::runtime::Runtime;
use tokio::sync::watch;

// =============================================================================
// ARGUMENTS
// =============================================================================

/// Desktop operator console for the Tello quadcopter.
#[derive(Parser, Debug)]
#[command(name = "tello-desktop", version, about, long_about = None)]
pub struct Cli {
    /// Controller <keyboard|dualshock4|tflightHotasX>
    #[arg(long, default_value = "keyboard")]
    pub control: ControllerKind,

    /// Drone control address (host:port or bare IP)
    #[arg(long, default_value = DEFAULT_DRONE_ADDR)]
    pub drone: String,

    /// Local control port (0 = any)
    #[arg(long, default_value_t = DEFAULT_CONTROL_PORT)]
    pub control_port: u16,

    /// Local video port advertised to the drone (0 = any)
    #[arg(long, default_value_t = DEFAULT_VIDEO_PORT)]
    pub video_port: u16,

    /// External video player
    #[arg(long, value_enum, default_value_t = PlayerKind::Mplayer)]
    pub player: PlayerKind,

    /// Video bitrate: 0 = auto, 1..=5 = 1, 1.5, 2, 3, 4 Mbps
    #[arg(long, default_value_t = 2)]
    pub bitrate: u8,

    /// TTF font for the console window
    #[arg(long, default_value = DEFAULT_FONT)]
    pub font: PathBuf,

    /// Directory received pictures are saved to on exit
    #[arg(long, default_value = ".")]
    pub photo_dir: PathBuf,

    /// Print help for keyboard control mapping and exit
    #[arg(long)]
    pub keyhelp: bool,

    /// Print help for joystick control mapping and exit
    #[arg(long)]
    pub joyhelp: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Open the console window and fly (default)
    Fly,

    /// Print telemetry as JSON lines, without a window
    Monitor {
        /// Milliseconds between snapshots
        #[arg(long, default_value_t = 1000)]
        period_ms: u64,

        /// Stop after this many snapshots
        #[arg(long)]
        count: Option<u64>,

        /// Seconds to wait for the drone to answer
        #[arg(long, default_value_t = 10)]
        connect_timeout: u64,
    },
}

impl Cli {
    /// Build and check the runtime configuration.
    pub fn config(&self) -> Result<Config> {
        let config = Config {
            controller: self.control,
            drone_addr: Config::parse_drone_addr(&self.drone)?,
            control_port: self.control_port,
            video_port: self.video_port,
            player: self.player,
            bitrate: VideoBitrate::try_from(self.bitrate)?,
            font: self.font.clone(),
            photo_dir: self.photo_dir.clone(),
            ..Config::default()
        };
        config.validate_link()?;
        Ok(config)
    }
}

// =============================================================================
// COMMANDS
// =============================================================================

/// Help text requested by `--keyhelp` / `--joyhelp`, if any.
pub fn requested_help(cli: &Cli) -> Option<&'static str> {
    if cli.keyhelp {
        Some(key_help())
    } else if cli.joyhelp {
        Some(joy_help())
    } else {
        None
    }
}

/// Flip the returned receiver to `true` on Ctrl-C or, on Unix, SIGTERM.
///
/// The handlers are installed before this returns. Must run inside a runtime.
pub fn shutdown_on_signals() -> Result<watch::Receiver<bool>> {
    let (tx, rx) = watch::channel(false);

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut interrupt = signal(SignalKind::interrupt())?;
        let mut terminate = signal(SignalKind::terminate())?;
        tokio::spawn(async move {
            let name = tokio::select! {
                _ = interrupt.recv() => "interrupt",
                _ = terminate.recv() => "terminate",
            };
            tracing::info!("{} received, shutting down", name);
            let _ = tx.send(true);
        });
    }

    #[cfg(not(unix))]
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("interrupt received, shutting down");
                let _ = tx.send(true);
            }
            Err(e) => {
                tracing::warn!("cannot listen for Ctrl-C: {}", e);
                // Keep the sender alive so receivers do not see a closed channel.
                std::future::pending::<()>().await;
            }
        }
    });

    Ok(rx)
}

/// Fly with the console window until the operator quits.
#[cfg(feature = "gui")]
pub fn cmd_fly(runtime: &Runtime, config: &Config) -> Result<()> {
    use crate::console;
    use crate::photos;
    use crate::video::VideoPlayer;
    use chrono::Local;

    config.validate_console()?;
    tracing::info!("Setting up {} as controller", config.controller);

    let shutdown = {
        let _guard = runtime.enter();
        shutdown_on_signals()?
    };
    let mut link = runtime.block_on(DroneLink::start(config))?;

    let player = {
        let _guard = runtime.enter();
        match link.take_video() {
            Some(frames) => VideoPlayer::spawn(config.player, frames).unwrap_or_else(|e| {
                tracing::warn!("continuing without video: {}", e);
                None
            }),
            None => None,
        }
    };

    let started = Local::now();
    let drone = link.handle();
    let result = console::run(config, drone.clone(), shutdown);

    runtime.block_on(async {
        if let Some(player) = player {
            player.stop().await;
        }
        link.shutdown().await;
    });

    let pictures = drone.take_photos();
    if !pictures.is_empty() {
        let saved = photos::save_photos(&config.photo_dir, &photos::session_prefix(&started), &pictures)?;
        tracing::info!("{} pictures saved to {}", saved.len(), config.photo_dir.display());
    }

    result
}

/// Fly with the console window until the operator quits.
#[cfg(not(feature = "gui"))]
pub fn cmd_fly(_runtime: &Runtime, _config: &Config) -> Result<()> {
    Err(Error::Config(
        "this build has no console window (enable the `gui` feature) - try `monitor`".to_string(),
    ))
}

/// Connect and print telemetry snapshots to `out`.
///
/// Returns the number of snapshots written.
pub async fn cmd_monitor<W: Write>(
    config: &Config,
    period: Duration,
    count: Option<u64>,
    connect_timeout: Duration,
    out: &mut W,
) -> Result<u64> {
    if period.is_zero() {
        return Err(Error::Config("monitor period must be non-zero".to_string()));
    }

    let mut link = DroneLink::connect(config, connect_timeout).await?;
    // No player in monitor mode; dropping the receiver discards video.
    drop(link.take_video());

    let shutdown = shutdown_on_signals()?;
    let result = monitor::run(&link.handle(), period, count, out, shutdown).await;
    link.shutdown().await;
    result
}

/// Entry point behind `main`.
pub fn run(cli: Cli) -> Result<()> {
    if let Some(help) = requested_help(&cli) {
        print!("{}", help);
        return Ok(());
    }

    let config = cli.config()?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("tello-link")
        .build()?;

    match cli.command.clone().unwrap_or(Commands::Fly) {
        Commands::Fly => cmd_fly(&runtime, &config),
        Commands::Monitor {
            period_ms,
            count,
            connect_timeout,
        } => {
            let mut stdout = std::io::stdout().lock();
            runtime
                .block_on(cmd_monitor(
                    &config,
                    Duration::from_millis(period_ms),
                    count,
                    Duration::from_secs(connect_timeout),
                    &mut stdout,
                ))
                .map(|written| tracing::debug!("wrote {} snapshots", written))
        }
    }
}
