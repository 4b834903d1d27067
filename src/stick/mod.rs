//! Sense HAT joystick subsystem
//!
//! The joystick is exposed by the kernel as a small keyboard. Reading it
//! takes three steps:
//!
//! 1. [`locator`] - find `/dev/input/event<N>` by device name
//! 2. [`session`] - open the node, optionally grab it, decode key events
//!    read through an [`InputSource`]
//! 3. [`watcher`] - optional background delivery over a channel
//!
//! ```text
//! /sys/class/input ──► Locator ──► Session ──► StickEvent
//!                                     └──► Watcher ──► mpsc::Receiver<StickEvent>
//! ```

pub mod error;
pub mod event;
pub mod locator;
pub mod session;
pub mod source;
pub mod watcher;

pub use error::StickError;
pub use event::{Action, Direction, StickEvent};
pub use locator::{is_attached, locate, find_sense_stick, DeviceLocator, SENSE_STICK_NAME};
pub use session::{KeyEventReader, SessionOptions, SessionState, StickSession};
pub use source::InputSource;
pub use watcher::{StickWatcher, WatcherError, WatcherHandle};
