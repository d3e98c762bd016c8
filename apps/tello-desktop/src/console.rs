//! # Console
//!
//! The SDL2 window: status text redrawn on a fixed period, keyboard and
//! joystick events routed to the drone. Runs on the main thread.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::input::{self, Flow, InputDispatcher};
use crate::link::DroneHandle;
use chrono::Local;
use sdl2::event::Event;
use sdl2::joystick::Joystick;
use sdl2::pixels::Color;
use sdl2::rect::Rect;
use sdl2::ttf::Font;
use sdl2::video::Window;
use sdl2::EventPump;
use std::time::Instant;
use tello_core::status::{self, FontSize, StatusScreen, TextItem};
use tokio::sync::watch;

fn sdl_err(e: impl std::fmt::Display) -> Error {
    Error::Sdl(e.to_string())
}

struct Fonts<'ttf> {
    big: Font<'ttf, 'static>,
    medium: Font<'ttf, 'static>,
}

impl<'ttf> Fonts<'ttf> {
    fn get(&self, size: FontSize) -> &Font<'ttf, 'static> {
        match size {
            FontSize::Big => &self.big,
            FontSize::Medium => &self.medium,
        }
    }
}

fn draw(window: &Window, pump: &EventPump, fonts: &Fonts<'_>, items: &[TextItem]) -> Result<()> {
    let (r, g, b) = status::TEXT_COLOUR;
    let colour = Color::RGB(r, g, b);

    let mut surface = window.surface(pump).map_err(sdl_err)?;
    surface.fill_rect(None, Color::RGB(0, 0, 0)).map_err(sdl_err)?;

    for item in items {
        let text = fonts
            .get(item.font)
            .render(&item.text)
            .solid(colour)
            .map_err(sdl_err)?;
        let dest = Rect::new(item.x, item.y, text.width(), text.height());
        text.blit(None, &mut surface, dest).map_err(sdl_err)?;
    }

    surface.update_window().map_err(sdl_err)
}

fn open_joystick(config: &Config, sdl: &sdl2::Sdl) -> Result<Option<Joystick>> {
    if config.controller.profile().is_none() {
        return Ok(None);
    }

    let subsystem = sdl.joystick().map_err(sdl_err)?;
    let count = subsystem.num_joysticks().map_err(sdl_err)?;
    tracing::info!("Number of joysticks detected: {}", count);
    if count == 0 {
        return Ok(None);
    }

    match subsystem.open(0) {
        Ok(joystick) => {
            tracing::info!("Connected to joystick: {}", joystick.name());
            Ok(Some(joystick))
        }
        Err(e) => {
            tracing::warn!("Error opening joystick: {}", e);
            Ok(None)
        }
    }
}

/// Run the console until the operator quits or `shutdown` flips to true.
pub fn run(
    config: &Config,
    drone: DroneHandle,
    shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let sdl = sdl2::init().map_err(sdl_err)?;
    let video = sdl.video().map_err(sdl_err)?;
    let ttf = sdl2::ttf::init().map_err(sdl_err)?;

    let fonts = Fonts {
        big: ttf
            .load_font(&config.font, FontSize::Big.points())
            .map_err(|e| Error::Sdl(format!("failed to open font {}: {}", config.font.display(), e)))?,
        medium: ttf
            .load_font(&config.font, FontSize::Medium.points())
            .map_err(sdl_err)?,
    };

    let window = video
        .window(status::WINDOW_TITLE, status::WINDOW_WIDTH, status::WINDOW_HEIGHT)
        .position_centered()
        .build()
        .map_err(sdl_err)?;
    let mut pump = sdl.event_pump().map_err(sdl_err)?;

    draw(&window, &pump, &fonts, &StatusScreen::splash())?;

    let telemetry = drone.telemetry();
    let mut dispatcher = InputDispatcher::new(drone, config.controller);
    // Dropping the joystick stops its events, so it lives as long as the loop.
    let _joystick = match open_joystick(config, &sdl)? {
        Some(joystick) => Some(joystick),
        None => {
            if config.controller.profile().is_some() {
                tracing::warn!("no joystick available for {}, using the keyboard", config.controller);
                dispatcher.keyboard_only();
            }
            None
        }
    };

    let mut next_redraw = Instant::now() + config.redraw_period;

    loop {
        if *shutdown.borrow() {
            tracing::info!("shutdown requested");
            break;
        }

        let now = Instant::now();
        if now >= next_redraw {
            let clock = Local::now().format(status::CLOCK_FORMAT).to_string();
            draw(&window, &pump, &fonts, &StatusScreen::layout(&telemetry.snapshot(), &clock))?;
            next_redraw = now + config.redraw_period;
        }

        let wait = next_redraw.saturating_duration_since(Instant::now());
        let Some(event) = pump.wait_event_timeout(wait.as_millis().max(1) as u32) else {
            continue;
        };

        let flow = match event {
            Event::Quit { .. } => {
                tracing::info!("Window Quit event");
                Flow::Quit
            }
            Event::KeyDown {
                keycode: Some(keycode),
                repeat: false,
                ..
            } => match input::key_from_name(&keycode.name()) {
                Some(key) => dispatcher.key_down(key),
                None => Flow::Continue,
            },
            Event::JoyAxisMotion { axis_idx, value, .. } => {
                dispatcher.joy_axis(axis_idx, value);
                Flow::Continue
            }
            Event::JoyButtonDown { button_idx, .. } => dispatcher.joy_button(button_idx),
            _ => Flow::Continue,
        };

        if flow == Flow::Quit {
            break;
        }
    }

    Ok(())
}
