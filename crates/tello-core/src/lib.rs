//! # Tello Core
//!
//! The logic half of Tello Desktop.
//!
//! This crate holds everything the operator console computes without touching
//! a socket, a window or a clock:
//! - [`protocol`]: framing, CRCs and message layouts of the Tello control link
//! - [`sticks`]: stick state and the raw-axis to movement scaling
//! - [`controls`]: keyboard and joystick control mapping
//! - [`telemetry`]: the shared telemetry record fed by drone events
//! - [`status`]: layout of the periodically redrawn status screen
//! - [`photo`]: reassembly of pictures sent back by the drone
//!
//! The binary (`apps/tello-desktop`) owns the I/O and drives these modules.

pub mod controls;
pub mod error;
pub mod photo;
pub mod protocol;
pub mod status;
pub mod sticks;
pub mod telemetry;

pub use controls::{Action, ControllerKind, FlipDirection, JoystickProfile, Key, MoveDirection};
pub use error::{Error, Result};
pub use photo::{Photo, PhotoAssembler};
pub use protocol::{Command, DroneEvent, FlightData, Packet, VideoBitrate, WifiData};
pub use status::{FontSize, StatusScreen, TextItem};
pub use sticks::{ControlAxis, Movement, StickState, StickTime};
pub use telemetry::{SharedTelemetry, Telemetry};
