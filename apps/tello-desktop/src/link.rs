//! # Drone Link
//!
//! Async plumbing between the console and the drone.
//!
//! ```text
//!   DroneHandle ──commands──►┌────────┐ control UDP ┌───────┐
//!   (any thread)  Movement ─►│ writer │────────────►│       │
//!                            └────────┘             │ drone │
//!   SharedTelemetry ◄────────┌──────────┐◄──────────│       │
//!   broadcast<DroneEvent> ◄──│ receiver │           │       │
//!                            └──────────┘           │       │
//!   mpsc<Vec<u8>> ◄─────────┌───────┐  video UDP    │       │
//!                           │ video │◄──────────────│       │
//!                           └───────┘               └───────┘
//! ```
//!
//! The writer owns all outbound traffic: one-shot commands as they arrive,
//! the stick packet every stick period, and the handshake or video keepalive
//! every keepalive period.

use crate::config::Config;
use crate::error::{Error, Result};
use chrono::{Local, Timelike};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tello_core::protocol::{self, Command, FlipDirection};
use tello_core::sticks::{ControlAxis, MoveDirection, Movement, StickState, StickTime};
use tello_core::{Action, DroneEvent, Photo, PhotoAssembler, SharedTelemetry, VideoBitrate};
use tokio::net::UdpSocket;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

/// Largest datagram the drone sends.
const MAX_DATAGRAM: usize = 2048;

/// Queued video frames before the receiver starts dropping.
const VIDEO_QUEUE: usize = 256;

/// Buffered drone events per subscriber.
const EVENT_QUEUE: usize = 64;

// =============================================================================
// HANDLE
// =============================================================================

/// Cheap, cloneable control surface for a running link.
///
/// Every method is synchronous so the console's event loop can call it
/// directly from the main thread.
#[derive(Clone)]
pub struct DroneHandle {
    commands: mpsc::UnboundedSender<Command>,
    movement: Arc<Mutex<Movement>>,
    bounce: Arc<AtomicBool>,
    telemetry: SharedTelemetry,
    events: broadcast::Sender<DroneEvent>,
    photos: Arc<Mutex<PhotoAssembler>>,
}

impl DroneHandle {
    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            tracing::warn!("link is down, dropped {:?}", command);
        }
    }

    fn with_movement<T>(&self, f: impl FnOnce(&mut Movement) -> T) -> T {
        let mut movement = self.movement.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut movement)
    }

    pub fn take_off(&self) {
        tracing::info!("Taking off");
        self.send(Command::TakeOff);
    }

    pub fn throw_take_off(&self) {
        tracing::info!("Throw take-off");
        self.send(Command::ThrowTakeOff);
    }

    pub fn land(&self) {
        tracing::info!("Landing");
        self.send(Command::Land);
    }

    pub fn palm_land(&self) {
        tracing::info!("Palm Landing");
        self.send(Command::PalmLand);
    }

    pub fn take_picture(&self) {
        tracing::info!("Taking picture");
        self.send(Command::TakePicture);
    }

    pub fn flip(&self, direction: FlipDirection) {
        tracing::info!("Flip {:?}", direction);
        self.send(Command::Flip(direction));
    }

    /// Toggle bounce mode. Returns the new state.
    pub fn bounce(&self) -> bool {
        let on = !self.bounce.fetch_xor(true, Ordering::SeqCst);
        tracing::info!("Bounce {}", if on { "start" } else { "stop" });
        self.send(Command::Bounce(on));
        on
    }

    /// Stop all movement.
    pub fn hover(&self) {
        tracing::info!("Stopping (Hover)");
        self.with_movement(Movement::hover);
    }

    pub fn set_sports_mode(&self, on: bool) {
        self.with_movement(|m| m.sports_mode = on);
    }

    /// Toggle sports (fast) mode. Returns the new state.
    pub fn toggle_sports_mode(&self) -> bool {
        let on = self.with_movement(|m| {
            m.sports_mode = !m.sports_mode;
            m.sports_mode
        });
        tracing::info!("Sports mode {}", if on { "on" } else { "off" });
        on
    }

    /// Drive one direction at `percent`, until hover or the opposite direction.
    pub fn move_direction(&self, direction: MoveDirection, percent: u8) {
        self.with_movement(|m| m.set(direction, percent));
        tracing::debug!("go {} set to {}", direction, percent);
    }

    /// Feed a raw joystick axis reading.
    pub fn apply_axis(&self, axis: ControlAxis, raw: i16) {
        let line = self.with_movement(|m| m.apply_axis(axis, raw));
        tracing::debug!("{}", line);
    }

    /// Carry out an operator action. Quit and help belong to the caller.
    pub fn apply_action(&self, action: Action) {
        match action {
            Action::TakeOff => self.take_off(),
            Action::ThrowTakeOff => self.throw_take_off(),
            Action::Land => self.land(),
            Action::PalmLand => self.palm_land(),
            Action::Hover => self.hover(),
            Action::Bounce => {
                self.bounce();
            }
            Action::Flip(direction) => self.flip(direction),
            Action::ToggleSportsMode => {
                self.toggle_sports_mode();
            }
            Action::TakePhoto => self.take_picture(),
            Action::Move(direction, percent) => self.move_direction(direction, percent),
            Action::Quit | Action::Help => {
                tracing::debug!("{:?} is not a drone action", action);
            }
        }
    }

    /// Current movement record.
    pub fn movement(&self) -> Movement {
        self.with_movement(|m| *m)
    }

    /// Shared telemetry fed by the receiver.
    pub fn telemetry(&self) -> SharedTelemetry {
        self.telemetry.clone()
    }

    /// Subscribe to drone events as they are decoded.
    pub fn subscribe(&self) -> broadcast::Receiver<DroneEvent> {
        self.events.subscribe()
    }

    /// Pictures received and not yet taken.
    pub fn photo_count(&self) -> usize {
        self.photos.lock().unwrap_or_else(PoisonError::into_inner).photos().len()
    }

    /// Hand over the received pictures.
    pub fn take_photos(&self) -> Vec<Photo> {
        self.photos.lock().unwrap_or_else(PoisonError::into_inner).take_photos()
    }

    /// Feed a file transfer event and queue the replies the drone expects.
    fn file_transfer(&self, event: &DroneEvent) {
        let replies = {
            let mut photos = self.photos.lock().unwrap_or_else(PoisonError::into_inner);
            match event {
                DroneEvent::FileSize(file) => {
                    tracing::debug!("receiving file {} ({} bytes)", file.file_id, file.size);
                    photos.announce(*file)
                }
                DroneEvent::FileChunk(chunk) => {
                    let before = photos.photos().len();
                    let replies = photos.chunk(chunk.clone());
                    if photos.photos().len() > before {
                        tracing::info!("Picture received ({} waiting to be saved)", photos.photos().len());
                    }
                    replies
                }
                _ => return,
            }
        };
        for reply in replies {
            self.send(reply);
        }
    }
}

// =============================================================================
// LINK
// =============================================================================

/// A running connection: the handle plus the tasks behind it.
pub struct DroneLink {
    handle: DroneHandle,
    frames: Option<mpsc::Receiver<Vec<u8>>>,
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
    video_addr: SocketAddr,
}

impl DroneLink {
    /// Bind the control and video sockets and start talking to the drone.
    ///
    /// Returns as soon as the tasks are running; the handshake is retried in
    /// the background until the drone answers.
    pub async fn start(config: &Config) -> Result<Self> {
        config.validate_link()?;

        let control = UdpSocket::bind(("0.0.0.0", config.control_port)).await?;
        control.connect(config.drone_addr).await?;
        let control = Arc::new(control);

        let video = UdpSocket::bind(("0.0.0.0", config.video_port)).await?;
        let video_addr = video.local_addr()?;

        tracing::info!(
            "control link {} -> {}, video on port {}",
            control.local_addr()?,
            config.drone_addr,
            video_addr.port()
        );

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (events_tx, _) = broadcast::channel(EVENT_QUEUE);
        let (frames_tx, frames_rx) = mpsc::channel(VIDEO_QUEUE);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = DroneHandle {
            commands: commands_tx,
            movement: Arc::new(Mutex::new(Movement::default())),
            bounce: Arc::new(AtomicBool::new(false)),
            telemetry: SharedTelemetry::new(),
            events: events_tx,
            photos: Arc::new(Mutex::new(PhotoAssembler::new())),
        };

        let writer = Writer {
            socket: Arc::clone(&control),
            handle: handle.clone(),
            video_port: video_addr.port(),
            bitrate: config.bitrate,
            stick_period: config.stick_period,
            keepalive_period: config.video_keepalive.min(config.connect_retry),
        };

        let tasks = vec![
            tokio::spawn(writer.run(commands_rx, shutdown_rx.clone())),
            tokio::spawn(receive_control(control, handle.clone(), shutdown_rx.clone())),
            tokio::spawn(receive_video(video, frames_tx, shutdown_rx)),
        ];

        Ok(Self {
            handle,
            frames: Some(frames_rx),
            shutdown: shutdown_tx,
            tasks,
            video_addr,
        })
    }

    /// Start the link and wait for the drone to answer the handshake.
    pub async fn connect(config: &Config, timeout: Duration) -> Result<Self> {
        let link = Self::start(config).await?;
        let mut events = link.handle.subscribe();

        let connected = time::timeout(timeout, async {
            loop {
                if link.handle.telemetry.is_connected() {
                    return true;
                }
                match events.recv().await {
                    Ok(DroneEvent::Connected) => return true,
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => return false,
                }
            }
        })
        .await;

        match connected {
            Ok(true) => Ok(link),
            _ => {
                link.shutdown().await;
                Err(Error::ConnectTimeout(timeout))
            }
        }
    }

    /// Control surface for this link.
    pub fn handle(&self) -> DroneHandle {
        self.handle.clone()
    }

    /// Take the video frame stream. Only the first call gets it.
    pub fn take_video(&mut self) -> Option<mpsc::Receiver<Vec<u8>>> {
        self.frames.take()
    }

    /// Local address the video socket is bound to.
    pub fn video_addr(&self) -> SocketAddr {
        self.video_addr
    }

    /// Centre the sticks, send a final stick packet and stop all tasks.
    pub async fn shutdown(self) {
        self.handle.with_movement(Movement::hover);
        if self.shutdown.send(true).is_err() {
            tracing::debug!("link tasks already stopped");
        }
        for task in self.tasks {
            if let Err(e) = task.await {
                tracing::warn!("link task failed: {}", e);
            }
        }
        tracing::info!("link closed");
    }
}

// =============================================================================
// TASKS
// =============================================================================

struct Writer {
    socket: Arc<UdpSocket>,
    handle: DroneHandle,
    video_port: u16,
    bitrate: VideoBitrate,
    stick_period: Duration,
    keepalive_period: Duration,
}

impl Writer {
    async fn send(&self, bytes: &[u8]) {
        if let Err(e) = self.socket.send(bytes).await {
            tracing::debug!("control send failed: {}", e);
        }
    }

    async fn send_sticks(&self) {
        let sticks = StickState::from(&self.handle.movement());
        let now = Local::now();
        let time = StickTime {
            hour: now.hour() as u8,
            minute: now.minute() as u8,
            second: now.second() as u8,
            millis: now.timestamp_subsec_millis().min(999) as u16,
        };
        self.send(&sticks.to_packet(time).encode()).await;
    }

    async fn run(self, mut commands: mpsc::UnboundedReceiver<Command>, mut shutdown: watch::Receiver<bool>) {
        let mut sequence: u16 = 0;
        let mut bitrate_sent = false;

        let mut sticks = time::interval(self.stick_period);
        sticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut keepalive = time::interval(self.keepalive_period);
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                Some(command) = commands.recv() => {
                    sequence = sequence.wrapping_add(1);
                    self.send(&command.to_packet(sequence).encode()).await;
                }
                _ = sticks.tick() => {
                    if self.handle.telemetry.is_connected() {
                        self.send_sticks().await;
                    }
                }
                _ = keepalive.tick() => {
                    if !self.handle.telemetry.is_connected() {
                        self.send(&protocol::connect_request(self.video_port)).await;
                    } else {
                        if !bitrate_sent {
                            sequence = sequence.wrapping_add(1);
                            self.send(&Command::SetVideoBitrate(self.bitrate).to_packet(sequence).encode()).await;
                            bitrate_sent = true;
                        }
                        sequence = sequence.wrapping_add(1);
                        self.send(&Command::StartVideo.to_packet(sequence).encode()).await;
                    }
                }
            }
        }

        if self.handle.telemetry.is_connected() {
            self.send_sticks().await;
        }
    }
}

async fn receive_control(socket: Arc<UdpSocket>, handle: DroneHandle, mut shutdown: watch::Receiver<bool>) {
    let mut buf = vec![0u8; MAX_DATAGRAM];
    loop {
        let len = tokio::select! {
            _ = shutdown.changed() => break,
            received = socket.recv(&mut buf) => match received {
                Ok(len) => len,
                Err(e) => {
                    // Connected UDP sockets report ICMP errors here; the drone may
                    // simply not be up yet.
                    tracing::debug!("control receive failed: {}", e);
                    continue;
                }
            },
        };

        match DroneEvent::decode(&buf[..len]) {
            Ok(event) => {
                if event == DroneEvent::Connected && !handle.telemetry.is_connected() {
                    tracing::info!("Connected");
                }
                handle.telemetry.apply(&event);
                handle.file_transfer(&event);
                // No subscribers is fine.
                let _ = handle.events.send(event);
            }
            Err(e) => tracing::debug!("ignoring datagram ({} bytes): {}", len, e),
        }
    }
}

/// Decides which video datagrams reach the player.
///
/// Once the queue overflows, everything up to the next sequence parameter
/// set is skipped, so the player never sees a stream with a hole in the
/// middle of a picture.
#[derive(Debug, Default)]
struct VideoGate {
    resyncing: bool,
    dropped: u64,
}

impl VideoGate {
    /// Whether `frame` should be queued.
    fn admit(&mut self, frame: &[u8]) -> bool {
        if self.resyncing && !protocol::starts_sequence(frame) {
            self.dropped = self.dropped.saturating_add(1);
            return false;
        }
        self.resyncing = false;
        true
    }

    /// The queue was full. Returns the frames dropped so far.
    fn overflowed(&mut self) -> u64 {
        self.resyncing = true;
        self.dropped = self.dropped.saturating_add(1);
        self.dropped
    }
}

async fn receive_video(socket: UdpSocket, frames: mpsc::Sender<Vec<u8>>, mut shutdown: watch::Receiver<bool>) {
    let mut buf = vec![0u8; MAX_DATAGRAM];
    let mut gate = VideoGate::default();
    loop {
        let len = tokio::select! {
            _ = shutdown.changed() => break,
            received = socket.recv(&mut buf) => match received {
                Ok(len) => len,
                Err(e) => {
                    tracing::debug!("video receive failed: {}", e);
                    continue;
                }
            },
        };

        let Some(frame) = protocol::video_payload(&buf[..len]) else {
            continue;
        };
        if !gate.admit(frame) {
            continue;
        }
        match frames.try_send(frame.to_vec()) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                let dropped = gate.overflowed();
                if dropped.is_power_of_two() {
                    tracing::warn!("video consumer is behind, {} frames dropped", dropped);
                }
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const SPS: &[u8] = &[0, 0, 0, 1, 0x67, 0x4d];
    const SLICE: &[u8] = &[0, 0, 0, 1, 0x41, 0x9a];
    const TAIL: &[u8] = &[0x12, 0x34];

    #[test]
    fn gate_passes_everything_until_overflow() {
        let mut gate = VideoGate::default();
        assert!(gate.admit(SLICE));
        assert!(gate.admit(TAIL));
        assert!(gate.admit(SPS));
    }

    #[test]
    fn gate_waits_for_sequence_after_overflow() {
        let mut gate = VideoGate::default();
        assert_eq!(gate.overflowed(), 1);

        assert!(!gate.admit(TAIL));
        assert!(!gate.admit(SLICE));
        assert!(gate.admit(SPS));
        assert!(gate.admit(TAIL));
        assert_eq!(gate.dropped, 3);
    }

    #[tokio::test]
    async fn full_queue_skips_to_next_sequence() {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let target = socket.local_addr().unwrap();
        let (frames_tx, mut frames_rx) = mpsc::channel(1);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(receive_video(socket, frames_tx, shutdown_rx));

        let camera = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let send = |payload: &'static [u8]| {
            let camera = &camera;
            async move {
                let mut datagram = vec![0, 0];
                datagram.extend_from_slice(payload);
                camera.send_to(&datagram, target).await.unwrap();
                // Let the receiver take it before the next one lands.
                time::sleep(Duration::from_millis(20)).await;
            }
        };

        // One slot: the SPS fills the queue and the next frame overflows it.
        send(SPS).await;
        send(TAIL).await;
        send(SLICE).await;
        assert_eq!(frames_rx.recv().await.unwrap(), SPS);

        // Room again, but the stream is only resumed at the next SPS.
        send(TAIL).await;
        send(SPS).await;
        assert_eq!(frames_rx.recv().await.unwrap(), SPS);
        send(TAIL).await;
        assert_eq!(frames_rx.recv().await.unwrap(), TAIL);

        shutdown_tx.send(true).unwrap();
        task.await.unwrap();
        assert!(frames_rx.try_recv().is_err());
    }
}
