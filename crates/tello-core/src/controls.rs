//! # Controls
//!
//! Maps operator input to [`Action`]s.
//!
//! Input arrives in backend-neutral form: keyboard events as [`Key`] and
//! joystick events as raw axis/button indices. The console translates its
//! windowing library's events into these before asking for an action.

use crate::error::Error;
use crate::sticks::ControlAxis;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use crate::protocol::FlipDirection;
pub use crate::sticks::MoveDirection;

/// Percent applied by a single movement key press.
pub const KEY_MOVE_INCR: u8 = 15;

/// Percent applied by a single turn key press.
pub const KEY_TURN_INCR: u8 = KEY_MOVE_INCR * 2;

// =============================================================================
// ACTIONS
// =============================================================================

/// Something the operator asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    TakeOff,
    ThrowTakeOff,
    Land,
    PalmLand,
    /// Stop all movement.
    Hover,
    /// Toggle bounce mode.
    Bounce,
    Flip(FlipDirection),
    ToggleSportsMode,
    TakePhoto,
    Move(MoveDirection, u8),
    Quit,
    Help,
}

// =============================================================================
// CONTROLLER KIND
// =============================================================================

/// The input device driving the drone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControllerKind {
    #[default]
    Keyboard,
    DualShock4,
    TFlightHotasX,
}

impl ControllerKind {
    /// Joystick mapping, or `None` for the keyboard.
    pub fn profile(self) -> Option<&'static JoystickProfile> {
        match self {
            Self::Keyboard => None,
            Self::DualShock4 => Some(&DUALSHOCK4),
            Self::TFlightHotasX => Some(&TFLIGHT_HOTAS_X),
        }
    }

    /// Printable mapping for this controller.
    pub fn help(self) -> &'static str {
        match self {
            Self::Keyboard => key_help(),
            Self::DualShock4 | Self::TFlightHotasX => joy_help(),
        }
    }
}

impl fmt::Display for ControllerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Keyboard => "keyboard",
            Self::DualShock4 => "dualshock4",
            Self::TFlightHotasX => "tflightHotasX",
        };
        f.write_str(name)
    }
}

impl FromStr for ControllerKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "keyboard" => Ok(Self::Keyboard),
            "dualshock4" => Ok(Self::DualShock4),
            "tflighthotasx" => Ok(Self::TFlightHotasX),
            _ => Err(Error::UnknownController(s.to_string())),
        }
    }
}

// =============================================================================
// KEYBOARD
// =============================================================================

/// A key press, independent of the windowing library.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    ArrowLeft,
    ArrowRight,
    ArrowUp,
    ArrowDown,
    Space,
    Escape,
    Char(char),
}

/// Action bound to a key, if any.
pub fn key_action(key: Key) -> Option<Action> {
    let action = match key {
        Key::ArrowLeft => Action::Move(MoveDirection::Left, KEY_MOVE_INCR),
        Key::ArrowRight => Action::Move(MoveDirection::Right, KEY_MOVE_INCR),
        Key::ArrowUp => Action::Move(MoveDirection::Forward, KEY_MOVE_INCR),
        Key::ArrowDown => Action::Move(MoveDirection::Back, KEY_MOVE_INCR),
        Key::Space => Action::Hover,
        Key::Escape => Action::Quit,
        Key::Char(c) => match c.to_ascii_lowercase() {
            'w' => Action::Move(MoveDirection::Up, KEY_MOVE_INCR),
            's' => Action::Move(MoveDirection::Down, KEY_MOVE_INCR),
            'a' => Action::Move(MoveDirection::CounterClockwise, KEY_TURN_INCR),
            'd' => Action::Move(MoveDirection::Clockwise, KEY_TURN_INCR),
            't' => Action::TakeOff,
            'o' => Action::ThrowTakeOff,
            'l' => Action::Land,
            'p' => Action::PalmLand,
            'b' => Action::Bounce,
            'f' => Action::TakePhoto,
            '1' => Action::Flip(FlipDirection::Forward),
            '2' => Action::Flip(FlipDirection::Back),
            '3' => Action::Flip(FlipDirection::Left),
            '4' => Action::Flip(FlipDirection::Right),
            'm' => Action::ToggleSportsMode,
            'q' => Action::Quit,
            'h' => Action::Help,
            _ => return None,
        },
    };
    Some(action)
}

/// Keyboard mapping help text.
pub fn key_help() -> &'static str {
    "Tello Desktop Keyboard Control Mapping

<Cursor Keys> Move Left/Right/Forward/Backward
W|A|S|D       W: Up, S: Down, A: Turn Left, D: Turn Right
<SPACE>       Hover (stop all movement)
T             Takeoff
O             Throw Takeoff
L             Land
P             Palm Land
F             Take Picture (Foto)
B             Bounce (on/off)
1|2|3|4       Flip Forwards/Backwards/Left/Right
M             Mode - Toggle Sports(Fast) Mode
Q             Quit
H             Print Help
"
}

// =============================================================================
// JOYSTICK
// =============================================================================

/// Axis and button indices for one joystick model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoystickProfile {
    pub name: &'static str,
    pub axes: [(u8, ControlAxis); 4],
    pub buttons: [(u8, Action); 6],
}

impl JoystickProfile {
    /// Control axis bound to a raw axis index.
    pub fn axis(&self, index: u8) -> Option<ControlAxis> {
        self.axes
            .iter()
            .find(|(i, _)| *i == index)
            .map(|(_, axis)| *axis)
    }

    /// Action bound to a raw button index.
    pub fn button(&self, index: u8) -> Option<Action> {
        self.buttons
            .iter()
            .find(|(i, _)| *i == index)
            .map(|(_, action)| *action)
    }
}

/// Sony DualShock 4.
pub static DUALSHOCK4: JoystickProfile = JoystickProfile {
    name: "DualShock4",
    axes: [
        (0, ControlAxis::Turn),
        (1, ControlAxis::UpDown),
        (3, ControlAxis::LeftRight),
        (4, ControlAxis::ForwardBack),
    ],
    buttons: [
        (0, Action::Land),     // X
        (1, Action::Hover),    // Circle
        (2, Action::TakeOff),   // Triangle
        (3, Action::TakePhoto), // Square
        (4, Action::Bounce),    // L1
        (6, Action::PalmLand),  // L2
    ],
};

/// Thrustmaster T-Flight HOTAS X.
pub static TFLIGHT_HOTAS_X: JoystickProfile = JoystickProfile {
    name: "T-Flight HOTAS-X",
    axes: [
        (0, ControlAxis::LeftRight),
        (1, ControlAxis::ForwardBack),
        (2, ControlAxis::UpDown),
        (4, ControlAxis::Turn),
    ],
    buttons: [
        (5, Action::Land),
        (6, Action::Hover),
        (7, Action::TakeOff),
        (1, Action::Bounce),
        (3, Action::PalmLand),
        (0, Action::TakePhoto),
    ],
};

/// Joystick mapping help text.
pub fn joy_help() -> &'static str {
    "Tello Desktop Joystick Control Mapping

Right Stick  Forward/Backward/Left/Right
Left Stick   Up/Down/Turn
Triangle     Takeoff
X            Land
Circle       Hover (stop all movement)
Square       Take Photo
L1           Bounce (on/off)
L2           Palm Land
"
}

// =============================================================================
// TESTS
// =============================================================================
