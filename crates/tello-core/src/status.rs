//! # Status Screen
//!
//! Layout of the telemetry window. The console renders whatever
//! [`StatusScreen::layout`] returns; nothing here knows about fonts or
//! surfaces beyond their nominal size.

use crate::telemetry::Telemetry;
use std::time::Duration;

pub const WINDOW_TITLE: &str = "Tello Desktop";
pub const WINDOW_WIDTH: u32 = 800;
pub const WINDOW_HEIGHT: u32 = 600;

/// strftime layout of the clock line (RFC 1123 with the zone name).
pub const CLOCK_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %Z";

/// How often the window is redrawn.
pub const REDRAW_PERIOD: Duration = Duration::from_millis(333);

/// Text colour (RGB).
pub const TEXT_COLOUR: (u8, u8, u8) = (255, 128, 64);

const SPLASH: &str = "Hello, Tello!";
const NO_DATA: &str = "No flight data available";

/// Nominal font sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FontSize {
    Big,
    Medium,
}

impl FontSize {
    /// Point size.
    pub fn points(self) -> u16 {
        match self {
            Self::Big => 32,
            Self::Medium => 24,
        }
    }
}

/// A string to draw at a position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextItem {
    pub text: String,
    pub font: FontSize,
    pub x: i32,
    pub y: i32,
}

impl TextItem {
    fn new(text: impl Into<String>, font: FontSize, x: i32, y: i32) -> Self {
        Self {
            text: text.into(),
            font,
            x,
            y,
        }
    }
}

fn yes_no(b: bool) -> char {
    if b { 'Y' } else { 'N' }
}

/// Builds the text items for each redraw.
pub struct StatusScreen;

impl StatusScreen {
    /// Items shown before the first redraw.
    pub fn splash() -> Vec<TextItem> {
        vec![TextItem::new(SPLASH, FontSize::Big, 200, 200)]
    }

    /// Items for one redraw of `telemetry` at wall-clock `clock`.
    pub fn layout(telemetry: &Telemetry, clock: &str) -> Vec<TextItem> {
        let mut items = vec![
            TextItem::new(WINDOW_TITLE, FontSize::Big, 155, 5),
            TextItem::new(clock, FontSize::Medium, 150, 50),
        ];

        match &telemetry.flight {
            None => items.push(TextItem::new(NO_DATA, FontSize::Big, 100, 200)),
            Some(fd) => {
                let height = f32::from(fd.height) / 10.0;
                items.extend([
                    TextItem::new(format!("Height: {:.1}m", height), FontSize::Big, 220, 100),
                    TextItem::new(
                        format!("Ground Speed:  {} m/s", fd.ground_speed),
                        FontSize::Medium,
                        200,
                        140,
                    ),
                    TextItem::new(
                        format!("Speeds - Fwd: {} m/s", fd.north_speed),
                        FontSize::Medium,
                        20,
                        180,
                    ),
                    TextItem::new(format!("Side: {} m/s", fd.east_speed), FontSize::Medium, 290, 180),
                    TextItem::new(
                        format!("Derived: {:.1} m/s", fd.derived_speed()),
                        FontSize::Medium,
                        460,
                        180,
                    ),
                    TextItem::new(
                        format!(
                            "Hover: {}, Open: {}, Sky: {}, Ground: {}",
                            yes_no(fd.drone_hover),
                            yes_no(fd.em_open),
                            yes_no(fd.em_sky),
                            yes_no(fd.em_ground)
                        ),
                        FontSize::Medium,
                        20,
                        240,
                    ),
                    TextItem::new(
                        format!("Battery: {}%", fd.battery_percentage),
                        FontSize::Medium,
                        20,
                        500,
                    ),
                    TextItem::new(
                        format!("Remaining Flight Time: {}s", fd.drone_fly_time_left),
                        FontSize::Medium,
                        300,
                        500,
                    ),
                ]);
                if !telemetry.message.is_empty() {
                    items.push(TextItem::new(&telemetry.message, FontSize::Medium, 20, 550));
                }
            }
        }

        let wifi = telemetry.wifi.unwrap_or_default();
        items.push(TextItem::new(
            format!(
                "WiFi - Strength: {} Interference: {}",
                wifi.strength, wifi.interference
            ),
            FontSize::Medium,
            20,
            460,
        ));

        items
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{FlightData, WifiData};

    fn texts(items: &[TextItem]) -> Vec<&str> {
        items.iter().map(|i| i.text.as_str()).collect()
    }

    #[test]
    fn no_flight_data_screen() {
        let items = StatusScreen::layout(&Telemetry::default(), "Sun, 18 Oct 2026 10:00:00 UTC");
        let texts = texts(&items);
        assert_eq!(
            texts,
            vec![
                "Tello Desktop",
                "Sun, 18 Oct 2026 10:00:00 UTC",
                "No flight data available",
                "WiFi - Strength: 0 Interference: 0",
            ]
        );
        assert_eq!(items[2].font, FontSize::Big);
        assert_eq!((items[2].x, items[2].y), (100, 200));
    }

    #[test]
    fn flight_data_screen() {
        let telemetry = Telemetry {
            connected: true,
            flight: Some(FlightData {
                height: 37,
                ground_speed: 2,
                north_speed: 3,
                east_speed: -4,
                drone_hover: true,
                em_sky: true,
                battery_percentage: 64,
                drone_fly_time_left: 300,
                ..FlightData::default()
            }),
            wifi: Some(WifiData {
                strength: 90,
                interference: 1,
            }),
            message: "Taking Off".to_string(),
            ..Telemetry::default()
        };

        let items = StatusScreen::layout(&telemetry, "now");
        let texts = texts(&items);

        assert!(texts.contains(&"Height: 3.7m"));
        assert!(texts.contains(&"Ground Speed:  2 m/s"));
        assert!(texts.contains(&"Speeds - Fwd: 3 m/s"));
        assert!(texts.contains(&"Side: -4 m/s"));
        assert!(texts.contains(&"Derived: 5.0 m/s"));
        assert!(texts.contains(&"Hover: Y, Open: N, Sky: Y, Ground: N"));
        assert!(texts.contains(&"Battery: 64%"));
        assert!(texts.contains(&"Remaining Flight Time: 300s"));
        assert!(texts.contains(&"Taking Off"));
        assert!(texts.contains(&"WiFi - Strength: 90 Interference: 1"));
        assert!(!texts.contains(&"No flight data available"));
    }

    #[test]
    fn empty_message_is_not_drawn() {
        let telemetry = Telemetry {
            flight: Some(FlightData::default()),
            message: String::new(),
            ..Telemetry::default()
        };
        let items = StatusScreen::layout(&telemetry, "now");
        assert!(items.iter().all(|i| i.y != 550));
    }

    #[test]
    fn items_fit_the_window() {
        let telemetry = Telemetry {
            flight: Some(FlightData::default()),
            ..Telemetry::default()
        };
        for item in StatusScreen::layout(&telemetry, "now")
            .iter()
            .chain(StatusScreen::splash().iter())
        {
            assert!(item.x >= 0 && (item.x as u32) < WINDOW_WIDTH);
            assert!(item.y >= 0 && (item.y as u32) < WINDOW_HEIGHT);
        }
    }
}
