//! Sense HAT hardware access
//!
//! Two independent pieces:
//!
//! - [`stick`] finds the joystick in the kernel's input registry, opens it
//!   (optionally grabbing it) and decodes key events into directional actions.
//! - [`imu`] wraps an external sensor-fusion backend with retrying reads and
//!   unit conversions.
//!
//! [`ffi`] exposes the joystick through a flat C interface.

pub mod config;
pub mod ffi;
pub mod imu;
pub mod stick;

pub use config::SenseConfig;
pub use stick::{Action, Direction, StickError, StickEvent, StickSession};
