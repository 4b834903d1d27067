//! Decoded joystick actions

use chrono::{DateTime, Local};
use evdev::{EventType, InputEvent, KeyCode};
use serde::{Deserialize, Serialize};
use std::time::UNIX_EPOCH;

/// Direction the stick was pushed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
    /// Stick pressed straight down (reported as Enter)
    Middle,
    /// Any key code the stick is not expected to send
    Unknown(u16),
}

impl Direction {
    pub fn from_key(key: KeyCode) -> Self {
        match key {
            KeyCode::KEY_UP => Direction::Up,
            KeyCode::KEY_DOWN => Direction::Down,
            KeyCode::KEY_LEFT => Direction::Left,
            KeyCode::KEY_RIGHT => Direction::Right,
            KeyCode::KEY_ENTER => Direction::Middle,
            other => Direction::Unknown(other.code()),
        }
    }

    /// Numeric code used across the C boundary
    pub fn code(self) -> i8 {
        match self {
            Direction::Unknown(_) => 0,
            Direction::Up => 1,
            Direction::Right => 2,
            Direction::Down => 3,
            Direction::Left => 4,
            Direction::Middle => 5,
        }
    }
}

/// What happened to the key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    Release,
    Press,
    /// Auto-repeat while the stick is held
    Hold,
    /// Raw value outside 0..=2, left for the caller to ignore
    Other(i32),
}

impl Action {
    pub fn from_value(value: i32) -> Self {
        match value {
            0 => Action::Release,
            1 => Action::Press,
            2 => Action::Hold,
            other => Action::Other(other),
        }
    }

    pub fn value(self) -> i32 {
        match self {
            Action::Release => 0,
            Action::Press => 1,
            Action::Hold => 2,
            Action::Other(v) => v,
        }
    }
}

/// One joystick action with the kernel timestamp in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StickEvent {
    pub timestamp: f64,
    pub direction: Direction,
    pub action: Action,
}

impl StickEvent {
    /// Decodes a key event. Returns `None` for every other event class.
    pub fn from_input(event: &InputEvent) -> Option<Self> {
        if event.event_type() != EventType::KEY {
            return None;
        }

        let timestamp = match event.timestamp().duration_since(UNIX_EPOCH) {
            Ok(d) => d.as_secs() as f64 + f64::from(d.subsec_micros()) / 1_000_000.0,
            Err(before) => {
                let d = before.duration();
                -(d.as_secs() as f64 + f64::from(d.subsec_micros()) / 1_000_000.0)
            }
        };

        Some(Self {
            timestamp,
            direction: Direction::from_key(KeyCode(event.code())),
            action: Action::from_value(event.value()),
        })
    }

    /// Timestamp as local wall-clock time
    pub fn local_time(&self) -> Option<DateTime<Local>> {
        let seconds = self.timestamp.floor();
        let nanos = ((self.timestamp - seconds) * 1_000_000_000.0).round() as u32;
        DateTime::from_timestamp(seconds as i64, nanos.min(999_999_999))
            .map(|utc| utc.with_timezone(&Local))
    }
}
