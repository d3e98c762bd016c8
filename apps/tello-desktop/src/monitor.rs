//! # Monitor
//!
//! Headless telemetry: one JSON object per line, written on a fixed period.
//! Useful on machines without a display and for piping into other tools.

use crate::error::Result;
use crate::link::DroneHandle;
use chrono::Local;
use serde::Serialize;
use std::io::Write;
use std::time::Duration;
use tello_core::Telemetry;
use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};

/// One line of monitor output.
#[derive(Debug, Serialize)]
pub struct Snapshot<'a> {
    pub timestamp: String,
    #[serde(flatten)]
    pub telemetry: &'a Telemetry,
    pub derived_speed: Option<f64>,
}

/// Write one snapshot line.
pub fn write_snapshot<W: Write>(out: &mut W, telemetry: &Telemetry) -> Result<()> {
    let snapshot = Snapshot {
        timestamp: Local::now().to_rfc3339(),
        telemetry,
        derived_speed: telemetry.derived_speed(),
    };
    serde_json::to_writer(&mut *out, &snapshot)?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}

/// Print snapshots every `period` until `count` lines are written or
/// `shutdown` flips to true. Returns the number of lines written.
pub async fn run<W: Write>(
    drone: &DroneHandle,
    period: Duration,
    count: Option<u64>,
    out: &mut W,
    mut shutdown: watch::Receiver<bool>,
) -> Result<u64> {
    let telemetry = drone.telemetry();
    let mut ticks = time::interval(period);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut written = 0u64;

    while count.is_none_or(|limit| written < limit) {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = ticks.tick() => {
                write_snapshot(out, &telemetry.snapshot())?;
                written += 1;
            }
        }
    }

    Ok(written)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tello_core::{DroneEvent, FlightData};

    #[test]
    fn snapshot_is_one_json_line() {
        let mut telemetry = Telemetry::default();
        telemetry.apply(&DroneEvent::FlightData(FlightData {
            north_speed: 6,
            east_speed: 8,
            battery_percentage: 55,
            ..FlightData::default()
        }));

        let mut out = Vec::new();
        write_snapshot(&mut out, &telemetry).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.ends_with('\n'));
        assert_eq!(text.lines().count(), 1);

        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["message"], "Idle");
        assert_eq!(value["derived_speed"], 10.0);
        assert_eq!(value["flight"]["battery_percentage"], 55);
        assert!(value["timestamp"].is_string());
    }
}
