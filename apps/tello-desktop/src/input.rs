//! # Input Dispatch
//!
//! Turns keyboard and joystick events into link calls. The console feeds
//! events in here after translating them out of SDL's types.

use crate::link::DroneHandle;
use tello_core::controls::{self, Action, ControllerKind, JoystickProfile, Key};

/// Whether the console should keep running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Translate an SDL key name (`SDL_GetKeyName`) into a [`Key`].
pub fn key_from_name(name: &str) -> Option<Key> {
    match name {
        "Left" => Some(Key::ArrowLeft),
        "Right" => Some(Key::ArrowRight),
        "Up" => Some(Key::ArrowUp),
        "Down" => Some(Key::ArrowDown),
        "Space" => Some(Key::Space),
        "Escape" => Some(Key::Escape),
        _ => {
            let mut chars = name.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Some(Key::Char(c)),
                _ => None,
            }
        }
    }
}

/// Routes operator input to a drone.
pub struct InputDispatcher {
    drone: DroneHandle,
    controller: ControllerKind,
    profile: Option<&'static JoystickProfile>,
}

impl InputDispatcher {
    pub fn new(drone: DroneHandle, controller: ControllerKind) -> Self {
        Self {
            drone,
            controller,
            profile: controller.profile(),
        }
    }

    /// Forget the joystick profile, e.g. when no joystick is plugged in.
    pub fn keyboard_only(&mut self) {
        self.profile = None;
    }

    /// Carry out one action.
    pub fn dispatch(&self, action: Action) -> Flow {
        match action {
            Action::Quit => Flow::Quit,
            Action::Help => {
                print!("{}", self.controller.help());
                Flow::Continue
            }
            other => {
                self.drone.apply_action(other);
                Flow::Continue
            }
        }
    }

    /// A key went down. Auto-repeat should be filtered by the caller.
    pub fn key_down(&self, key: Key) -> Flow {
        match controls::key_action(key) {
            Some(action) => self.dispatch(action),
            None => Flow::Continue,
        }
    }

    /// A joystick axis moved.
    pub fn joy_axis(&self, index: u8, value: i16) {
        if let Some(axis) = self.profile.and_then(|p| p.axis(index)) {
            self.drone.apply_axis(axis, value);
        }
    }

    /// A joystick button went down.
    pub fn joy_button(&self, index: u8) -> Flow {
        match self.profile.and_then(|p| p.button(index)) {
            Some(action) => self.dispatch(action),
            None => Flow::Continue,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sdl_key_names() {
        assert_eq!(key_from_name("Left"), Some(Key::ArrowLeft));
        assert_eq!(key_from_name("Space"), Some(Key::Space));
        assert_eq!(key_from_name("W"), Some(Key::Char('W')));
        assert_eq!(key_from_name("1"), Some(Key::Char('1')));
        assert_eq!(key_from_name("Left Shift"), None);
        assert_eq!(key_from_name(""), None);
    }
}
