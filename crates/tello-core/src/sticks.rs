//! # Sticks
//!
//! Movement is never sent as a one-shot command. The console keeps a
//! [`Movement`] record of how hard the operator is pushing in each direction,
//! and the link periodically encodes it as a [`StickState`] packet.

use crate::protocol::{Packet, msg, packet_type};
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// SCALING
// =============================================================================

/// Raw controller units per percent of movement.
pub const AXIS_DIVISOR: i32 = 328;

/// Stick centre on the wire.
pub const STICK_CENTRE: f32 = 1024.0;

/// Stick travel either side of centre on the wire.
pub const STICK_TRAVEL: f32 = 660.0;

/// Scale a raw signed 16-bit axis reading to a 0..=99 percentage.
pub fn scale_axis(raw: i16) -> u8 {
    (i32::from(raw).abs() / AXIS_DIVISOR) as u8
}

// =============================================================================
// MOVEMENT
// =============================================================================

/// A direction of travel or rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoveDirection {
    Left,
    Right,
    Forward,
    Back,
    Up,
    Down,
    Clockwise,
    CounterClockwise,
}

impl fmt::Display for MoveDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Left => "left",
            Self::Right => "right",
            Self::Forward => "forward",
            Self::Back => "back",
            Self::Up => "up",
            Self::Down => "down",
            Self::Clockwise => "clockwise",
            Self::CounterClockwise => "anticlockwise",
        };
        f.write_str(name)
    }
}

/// A bidirectional controller axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlAxis {
    /// Negative is left.
    LeftRight,
    /// Negative is forward.
    ForwardBack,
    /// Negative is up.
    UpDown,
    /// Negative is anticlockwise.
    Turn,
}

impl ControlAxis {
    /// Directions driven by (negative, positive) readings.
    pub fn directions(self) -> (MoveDirection, MoveDirection) {
        match self {
            Self::LeftRight => (MoveDirection::Left, MoveDirection::Right),
            Self::ForwardBack => (MoveDirection::Forward, MoveDirection::Back),
            Self::UpDown => (MoveDirection::Up, MoveDirection::Down),
            Self::Turn => (MoveDirection::CounterClockwise, MoveDirection::Clockwise),
        }
    }
}

/// Percentages the operator is currently commanding, one per direction.
///
/// At most one direction per axis is non-zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movement {
    pub go_left: u8,
    pub go_right: u8,
    pub go_fwd: u8,
    pub go_back: u8,
    pub go_up: u8,
    pub go_down: u8,
    pub clockwise: u8,
    pub anticlockwise: u8,
    /// Fast ("sports") mode flag carried in the stick packet.
    pub sports_mode: bool,
}

impl Movement {
    fn slot(&mut self, direction: MoveDirection) -> &mut u8 {
        match direction {
            MoveDirection::Left => &mut self.go_left,
            MoveDirection::Right => &mut self.go_right,
            MoveDirection::Forward => &mut self.go_fwd,
            MoveDirection::Back => &mut self.go_back,
            MoveDirection::Up => &mut self.go_up,
            MoveDirection::Down => &mut self.go_down,
            MoveDirection::Clockwise => &mut self.clockwise,
            MoveDirection::CounterClockwise => &mut self.anticlockwise,
        }
    }

    fn opposite(direction: MoveDirection) -> MoveDirection {
        match direction {
            MoveDirection::Left => MoveDirection::Right,
            MoveDirection::Right => MoveDirection::Left,
            MoveDirection::Forward => MoveDirection::Back,
            MoveDirection::Back => MoveDirection::Forward,
            MoveDirection::Up => MoveDirection::Down,
            MoveDirection::Down => MoveDirection::Up,
            MoveDirection::Clockwise => MoveDirection::CounterClockwise,
            MoveDirection::CounterClockwise => MoveDirection::Clockwise,
        }
    }

    /// Current percentage for a direction.
    pub fn get(&self, direction: MoveDirection) -> u8 {
        match direction {
            MoveDirection::Left => self.go_left,
            MoveDirection::Right => self.go_right,
            MoveDirection::Forward => self.go_fwd,
            MoveDirection::Back => self.go_back,
            MoveDirection::Up => self.go_up,
            MoveDirection::Down => self.go_down,
            MoveDirection::Clockwise => self.clockwise,
            MoveDirection::CounterClockwise => self.anticlockwise,
        }
    }

    /// Drive one direction, clearing its opposite. Percent is capped at 100.
    pub fn set(&mut self, direction: MoveDirection, percent: u8) {
        *self.slot(Self::opposite(direction)) = 0;
        *self.slot(direction) = percent.min(100);
    }

    /// Apply a raw reading from a controller axis.
    ///
    /// Returns a line describing the change for the caller to log.
    pub fn apply_axis(&mut self, axis: ControlAxis, raw: i16) -> String {
        let (negative, positive) = axis.directions();
        let percent = scale_axis(raw);

        match raw {
            r if r < 0 => {
                self.set(negative, percent);
                format!("go {} set to {} from raw data {}", negative, percent, raw)
            }
            r if r > 0 => {
                self.set(positive, percent);
                format!("go {} set to {} from raw data {}", positive, percent, raw)
            }
            _ => {
                self.set(negative, 0);
                self.set(positive, 0);
                format!("go {} & {} set to 0", negative, positive)
            }
        }
    }

    /// Stop all movement. Sports mode is left as it is.
    pub fn hover(&mut self) {
        *self = Self {
            sports_mode: self.sports_mode,
            ..Self::default()
        };
    }

    /// Whether any direction is being driven.
    pub fn is_moving(&self) -> bool {
        [
            self.go_left,
            self.go_right,
            self.go_fwd,
            self.go_back,
            self.go_up,
            self.go_down,
            self.clockwise,
            self.anticlockwise,
        ]
        .iter()
        .any(|p| *p > 0)
    }
}

// =============================================================================
// STICK STATE
// =============================================================================

/// Wall-clock time stamped into every stick packet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StickTime {
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub millis: u16,
}

/// Stick deflections in -1.0..=1.0, as sent to the drone.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StickState {
    /// Right stick horizontal: left/right.
    pub rx: f32,
    /// Right stick vertical: forward/backward.
    pub ry: f32,
    /// Left stick horizontal: rotation.
    pub lx: f32,
    /// Left stick vertical: up/down.
    pub ly: f32,
    pub fast: bool,
}

fn fraction(percent: u8) -> f32 {
    f32::from(percent.min(100)) / 100.0
}

impl StickState {
    pub fn left(&mut self, percent: u8) {
        self.rx = -fraction(percent);
    }

    pub fn right(&mut self, percent: u8) {
        self.rx = fraction(percent);
    }

    pub fn forward(&mut self, percent: u8) {
        self.ry = fraction(percent);
    }

    pub fn backward(&mut self, percent: u8) {
        self.ry = -fraction(percent);
    }

    pub fn up(&mut self, percent: u8) {
        self.ly = fraction(percent);
    }

    pub fn down(&mut self, percent: u8) {
        self.ly = -fraction(percent);
    }

    pub fn clockwise(&mut self, percent: u8) {
        self.lx = fraction(percent);
    }

    pub fn counter_clockwise(&mut self, percent: u8) {
        self.lx = -fraction(percent);
    }

    /// Centre every stick.
    pub fn hover(&mut self) {
        self.rx = 0.0;
        self.ry = 0.0;
        self.lx = 0.0;
        self.ly = 0.0;
    }

    /// Wire value (364..=1684) for one deflection.
    pub fn wire_value(deflection: f32) -> u16 {
        (STICK_TRAVEL * deflection.clamp(-1.0, 1.0) + STICK_CENTRE) as u16
    }

    /// Build the stick packet. Stick packets always carry sequence 0.
    pub fn to_packet(&self, time: StickTime) -> Packet {
        let axis = |v: f32| u64::from(Self::wire_value(v)) & 0x7ff;
        let packed = axis(self.rx)
            | (axis(self.ry) << 11)
            | (axis(self.ly) << 22)
            | (axis(self.lx) << 33)
            | (u64::from(self.fast) << 44);

        let mut payload = Vec::with_capacity(11);
        payload.extend_from_slice(&packed.to_le_bytes()[..6]);
        payload.push(time.hour);
        payload.push(time.minute);
        payload.push(time.second);
        payload.extend_from_slice(&time.millis.to_le_bytes());

        Packet::new(packet_type::DATA, msg::STICK, payload)
    }
}

impl From<&Movement> for StickState {
    fn from(movement: &Movement) -> Self {
        let mut sticks = Self {
            fast: movement.sports_mode,
            ..Self::default()
        };
        if movement.go_left > 0 {
            sticks.left(movement.go_left);
        } else {
            sticks.right(movement.go_right);
        }
        if movement.go_back > 0 {
            sticks.backward(movement.go_back);
        } else {
            sticks.forward(movement.go_fwd);
        }
        if movement.go_down > 0 {
            sticks.down(movement.go_down);
        } else {
            sticks.up(movement.go_up);
        }
        if movement.anticlockwise > 0 {
            sticks.counter_clockwise(movement.anticlockwise);
        } else {
            sticks.clockwise(movement.clockwise);
        }
        sticks
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn unpack(packet: &Packet) -> (u16, u16, u16, u16, bool) {
        let mut word = [0u8; 8];
        word[..6].copy_from_slice(&packet.payload[..6]);
        let packed = u64::from_le_bytes(word);
        (
            (packed & 0x7ff) as u16,
            ((packed >> 11) & 0x7ff) as u16,
            ((packed >> 22) & 0x7ff) as u16,
            ((packed >> 33) & 0x7ff) as u16,
            (packed >> 44) & 1 == 1,
        )
    }

    #[test]
    fn axis_scaling_matches_divisor() {
        assert_eq!(scale_axis(0), 0);
        assert_eq!(scale_axis(327), 0);
        assert_eq!(scale_axis(328), 1);
        assert_eq!(scale_axis(-656), 2);
        assert_eq!(scale_axis(i16::MAX), 99);
        assert_eq!(scale_axis(i16::MIN), 99);
    }

    #[test]
    fn apply_axis_drives_one_direction() {
        let mut movement = Movement::default();

        let line = movement.apply_axis(ControlAxis::LeftRight, -16400);
        assert_eq!(movement.go_left, 50);
        assert_eq!(movement.go_right, 0);
        assert_eq!(line, "go left set to 50 from raw data -16400");

        movement.apply_axis(ControlAxis::LeftRight, 3280);
        assert_eq!(movement.go_left, 0);
        assert_eq!(movement.go_right, 10);

        let line = movement.apply_axis(ControlAxis::LeftRight, 0);
        assert_eq!(movement.go_right, 0);
        assert_eq!(line, "go left & right set to 0");
    }

    #[test]
    fn axis_sign_conventions() {
        let mut movement = Movement::default();
        movement.apply_axis(ControlAxis::ForwardBack, -3280);
        movement.apply_axis(ControlAxis::UpDown, -6560);
        movement.apply_axis(ControlAxis::Turn, -9840);
        assert_eq!(movement.go_fwd, 10);
        assert_eq!(movement.go_up, 20);
        assert_eq!(movement.anticlockwise, 30);

        let sticks = StickState::from(&movement);
        assert!((sticks.ry - 0.1).abs() < 1e-6);
        assert!((sticks.ly - 0.2).abs() < 1e-6);
        assert!((sticks.lx + 0.3).abs() < 1e-6);
        assert!(sticks.rx.abs() < f32::EPSILON);
    }

    #[test]
    fn hover_keeps_sports_mode() {
        let mut movement = Movement {
            go_up: 40,
            clockwise: 30,
            sports_mode: true,
            ..Movement::default()
        };
        assert!(movement.is_moving());
        movement.hover();
        assert!(!movement.is_moving());
        assert!(movement.sports_mode);
    }

    #[test]
    fn set_caps_at_full_deflection() {
        let mut movement = Movement::default();
        movement.set(MoveDirection::Down, 250);
        assert_eq!(movement.get(MoveDirection::Down), 100);
    }

    #[test]
    fn centred_sticks_pack_to_1024() {
        let packet = StickState::default().to_packet(StickTime::default());
        assert_eq!(packet.message_id, msg::STICK);
        assert_eq!(packet.sequence, 0);
        assert_eq!(packet.payload.len(), 11);
        assert_eq!(unpack(&packet), (1024, 1024, 1024, 1024, false));
    }

    #[test]
    fn stick_packet_layout() {
        let mut sticks = StickState {
            fast: true,
            ..StickState::default()
        };
        sticks.right(100);
        sticks.backward(100);
        sticks.up(50);
        sticks.counter_clockwise(100);

        let time = StickTime {
            hour: 13,
            minute: 45,
            second: 7,
            millis: 0x0203,
        };
        let packet = sticks.to_packet(time);

        assert_eq!(unpack(&packet), (1684, 364, 1354, 364, true));
        assert_eq!(&packet.payload[6..], &[13, 45, 7, 0x03, 0x02]);
    }

    proptest! {
        #[test]
        fn scaled_axis_stays_below_full(raw in any::<i16>()) {
            prop_assert!(scale_axis(raw) <= 99);
        }

        #[test]
        fn wire_values_stay_in_range(d in -4.0f32..4.0) {
            let v = StickState::wire_value(d);
            prop_assert!((364..=1684).contains(&v));
        }

        #[test]
        fn axis_never_drives_both_ways(first in any::<i16>(), second in any::<i16>()) {
            let mut movement = Movement::default();
            movement.apply_axis(ControlAxis::Turn, first);
            movement.apply_axis(ControlAxis::Turn, second);
            prop_assert!(movement.clockwise == 0 || movement.anticlockwise == 0);
        }
    }
}
