//! # Telemetry
//!
//! The console's view of the drone, folded from asynchronous [`DroneEvent`]s.
//!
//! The link's receiver task writes through [`SharedTelemetry`] while the
//! console and the monitor read snapshots from it at their own pace.

use crate::protocol::{DroneEvent, FlightData, WifiData};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock};

/// Flight message shown before anything has happened.
pub const IDLE_MESSAGE: &str = "Idle";

/// Everything known about the drone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Telemetry {
    pub connected: bool,
    pub flight: Option<FlightData>,
    pub wifi: Option<WifiData>,
    pub light_strength: Option<u8>,
    /// Latest noteworthy flight event.
    pub message: String,
    /// Flight status reports received so far.
    pub flight_updates: u64,
}

impl Default for Telemetry {
    fn default() -> Self {
        Self {
            connected: false,
            flight: None,
            wifi: None,
            light_strength: None,
            message: IDLE_MESSAGE.to_string(),
            flight_updates: 0,
        }
    }
}

impl Telemetry {
    /// Fold one event into the record.
    pub fn apply(&mut self, event: &DroneEvent) {
        match event {
            DroneEvent::Connected => self.connected = true,
            DroneEvent::TakeOffAck | DroneEvent::ThrowTakeOffAck => {
                self.message = "Taking Off".to_string();
            }
            DroneEvent::LandAck | DroneEvent::PalmLandAck => {
                self.message = "Landing".to_string();
            }
            DroneEvent::FlightData(fd) => {
                self.flight = Some(*fd);
                self.flight_updates = self.flight_updates.saturating_add(1);
                if fd.battery_low {
                    self.message = "Battery Low".to_string();
                }
                // Checked second so it wins when both flags are up.
                if fd.battery_lower {
                    self.message = "Battery Lower".to_string();
                }
            }
            DroneEvent::Wifi(wifi) => self.wifi = Some(*wifi),
            DroneEvent::LightStrength(level) => self.light_strength = Some(*level),
            DroneEvent::BounceAck
            | DroneEvent::FlipAck
            | DroneEvent::VideoBitrateAck
            | DroneEvent::TakePictureAck
            | DroneEvent::FileSize(_)
            | DroneEvent::FileChunk(_)
            | DroneEvent::FileDoneAck
            | DroneEvent::Unknown(_) => {}
        }
    }

    /// Horizontal speed, if flight data has arrived.
    pub fn derived_speed(&self) -> Option<f64> {
        self.flight.as_ref().map(FlightData::derived_speed)
    }
}

/// Lock-guarded telemetry shared between the link and its readers.
///
/// A writer that panicked mid-update leaves a record that is still worth
/// displaying, so lock poisoning is ignored.
#[derive(Debug, Clone, Default)]
pub struct SharedTelemetry {
    inner: Arc<RwLock<Telemetry>>,
}

impl SharedTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one event into the shared record.
    pub fn apply(&self, event: &DroneEvent) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .apply(event);
    }

    /// Copy of the current record. The lock is held only while copying.
    pub fn snapshot(&self) -> Telemetry {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether the drone has answered the handshake.
    pub fn is_connected(&self) -> bool {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .connected
    }
}

// =============================================================================
// TESTS
// =============================================================================
