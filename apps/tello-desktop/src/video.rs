//! # Video
//!
//! The drone streams raw H.264. Decoding and display are left to an external
//! player reading the stream from its stdin.

use crate::error::{Error, Result};
use clap::ValueEnum;
use std::process::Stdio;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// External player choice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum PlayerKind {
    /// `-vo x11` keeps it working inside virtual machines; 60 fps plays smoother.
    #[default]
    Mplayer,
    Ffplay,
    /// Discard video.
    None,
}

impl PlayerKind {
    /// Program and arguments, or `None` when video is discarded.
    pub fn command_line(self) -> Option<(&'static str, &'static [&'static str])> {
        match self {
            Self::Mplayer => Some(("mplayer", &["-nosound", "-vo", "x11", "-fps", "60", "-"])),
            Self::Ffplay => Some(("ffplay", &["-framedrop", "-an", "-i", "pipe:0"])),
            Self::None => None,
        }
    }
}

/// Copy frames into `sink` in arrival order until the channel closes or a
/// write fails. Returns the number of frames written.
pub async fn pump_frames<W>(mut frames: mpsc::Receiver<Vec<u8>>, mut sink: W) -> u64
where
    W: AsyncWrite + Unpin,
{
    let mut written = 0u64;
    while let Some(frame) = frames.recv().await {
        if let Err(e) = sink.write_all(&frame).await {
            tracing::warn!("video player stopped accepting frames: {}", e);
            break;
        }
        written = written.saturating_add(1);
    }
    if let Err(e) = sink.flush().await {
        tracing::debug!("flushing video sink failed: {}", e);
    }
    written
}

/// A running external player fed by the link's video frames.
pub struct VideoPlayer {
    child: Child,
    pump: JoinHandle<u64>,
}

impl VideoPlayer {
    /// Start the player and the frame pump. Must run inside a tokio runtime.
    ///
    /// Returns `Ok(None)` for [`PlayerKind::None`]; the frames are then dropped.
    pub fn spawn(kind: PlayerKind, frames: mpsc::Receiver<Vec<u8>>) -> Result<Option<Self>> {
        let Some((program, args)) = kind.command_line() else {
            tracing::info!("video disabled");
            return Ok(None);
        };

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Player {
                program: program.to_string(),
                reason: e.to_string(),
            })?;

        let stdin = child.stdin.take().ok_or_else(|| Error::Player {
            program: program.to_string(),
            reason: "stdin was not piped".to_string(),
        })?;

        tracing::info!("started {} for video", program);
        let pump = tokio::spawn(pump_frames(frames, stdin));
        Ok(Some(Self { child, pump }))
    }

    /// Stop the pump and the player process.
    pub async fn stop(mut self) {
        self.pump.abort();
        match self.pump.await {
            Ok(frames) => tracing::debug!("video pump wrote {} frames", frames),
            Err(e) if e.is_cancelled() => {}
            Err(e) => tracing::warn!("video pump failed: {}", e),
        }
        if let Err(e) = self.child.kill().await {
            tracing::debug!("video player already gone: {}", e);
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
