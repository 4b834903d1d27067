//! Joystick device session
//!
//! A [`StickSession`] owns the open device node and, when requested, the
//! exclusive grab on it. Opening never returns an error directly: a session
//! that could not be opened is still handed back in the
//! [`SessionState::Failed`] state so callers can log or hold on to it, and
//! the failure surfaces on the first [`StickSession::decode_next`].
//!
//! ```text
//! open() ──► OpenedExclusive ─┐
//!        ├─► OpenedShared ────┼─► close() ──► Closed
//!        └─► Failed ──────────┘
//! ```
//!
//! Release is tied to ownership: dropping the session releases the grab and
//! closes the node, so no exit path can leave the device grabbed.

use evdev::{Device, InputEvent};
use std::collections::VecDeque;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::error::StickError;
use super::event::StickEvent;
use super::source::InputSource;

/// Pause before opening the node. A grab released by a previous session can
/// leave the kernel replaying key-down events for a moment ("stuck key");
/// waiting this long has been enough to avoid it in practice.
pub const DEFAULT_OPEN_DELAY: Duration = Duration::from_millis(75);

/// How a session should be opened
#[derive(Clone, Debug)]
pub struct SessionOptions {
    /// Grab the device so no other listener receives its events
    pub exclusive: bool,
    pub open_delay: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            exclusive: true,
            open_delay: DEFAULT_OPEN_DELAY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    OpenedExclusive,
    OpenedShared,
    Failed,
    Closed,
}

/// Pulls events from a source and keeps only key events
pub struct KeyEventReader {
    source: Box<dyn InputSource>,
    pending: VecDeque<InputEvent>,
}

impl fmt::Debug for KeyEventReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyEventReader")
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}

impl KeyEventReader {
    pub fn new(source: Box<dyn InputSource>) -> Self {
        Self {
            source,
            pending: VecDeque::new(),
        }
    }

    fn next_pending(&mut self) -> Option<StickEvent> {
        while let Some(raw) = self.pending.pop_front() {
            match StickEvent::from_input(&raw) {
                Some(event) => return Some(event),
                None => debug!("Discarding non-key event: {:?}", raw),
            }
        }
        None
    }

    /// Blocks until the next key event arrives. Synchronization markers and
    /// every other event class are dropped. A failed read is returned as is.
    pub fn next_event(&mut self) -> io::Result<StickEvent> {
        loop {
            if let Some(event) = self.next_pending() {
                return Ok(event);
            }
            let batch = self.source.fetch_batch()?;
            self.pending.extend(batch);
        }
    }

    /// Like [`KeyEventReader::next_event`] but gives up after `timeout`
    /// without input. A batch holding only non-key events also yields `None`.
    pub fn poll_event(&mut self, timeout: Duration) -> io::Result<Option<StickEvent>> {
        if let Some(event) = self.next_pending() {
            return Ok(Some(event));
        }
        if !self.source.wait_readable(timeout)? {
            return Ok(None);
        }
        let batch = self.source.fetch_batch()?;
        self.pending.extend(batch);
        Ok(self.next_pending())
    }
}

/// Open joystick device
#[derive(Debug)]
pub struct StickSession {
    path: PathBuf,
    reader: Option<KeyEventReader>,
    grabbed: bool,
    state: SessionState,
    failure: Option<String>,
}

impl StickSession {
    /// Opens `path` with the default delay
    pub fn open(path: impl AsRef<Path>, exclusive: bool) -> Self {
        Self::open_with(
            path,
            &SessionOptions {
                exclusive,
                ..SessionOptions::default()
            },
        )
    }

    pub fn open_with(path: impl AsRef<Path>, options: &SessionOptions) -> Self {
        let path = path.as_ref().to_path_buf();
        info!(
            "Opening {} (exclusive: {})",
            path.display(),
            options.exclusive
        );

        if !options.open_delay.is_zero() {
            std::thread::sleep(options.open_delay);
        }

        match Device::open(&path) {
            Ok(device) => {
                debug!("Opened {:?} at {}", device.name(), path.display());
                Self::from_source(path, Box::new(device), options.exclusive)
            }
            Err(e) => {
                error!("Failed to open {}: {}", path.display(), e);
                Self {
                    path,
                    reader: None,
                    grabbed: false,
                    state: SessionState::Failed,
                    failure: Some(format!("open failed: {}", e)),
                }
            }
        }
    }

    /// Wraps an already opened source, grabbing it if `exclusive`
    pub fn from_source(
        path: impl Into<PathBuf>,
        source: Box<dyn InputSource>,
        exclusive: bool,
    ) -> Self {
        let mut session = Self {
            path: path.into(),
            reader: Some(KeyEventReader::new(source)),
            grabbed: false,
            state: SessionState::OpenedShared,
            failure: None,
        };

        if exclusive {
            let grab = match session.reader.as_mut() {
                Some(reader) => reader.source.grab(),
                None => Err(io::Error::from(io::ErrorKind::NotConnected)),
            };
            match grab {
                Ok(()) => {
                    session.grabbed = true;
                    session.state = SessionState::OpenedExclusive;
                }
                Err(e) => {
                    // The node stays tracked so close() still releases it.
                    error!("Failed to grab {}: {}", session.path.display(), e);
                    session.state = SessionState::Failed;
                    session.failure = Some(format!("exclusive grab failed: {}", e));
                }
            }
        }

        debug!("Session on {} is {:?}", session.path.display(), session.state);
        session
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_failed(&self) -> bool {
        self.state == SessionState::Failed
    }

    /// True while the exclusive grab is held
    pub fn is_exclusive(&self) -> bool {
        self.grabbed
    }

    /// True while the device node is open
    pub fn holds_resource(&self) -> bool {
        self.reader.is_some()
    }

    /// Why the session failed, if it did
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    fn usable_reader(&mut self) -> Result<&mut KeyEventReader, StickError> {
        match self.state {
            SessionState::Failed => Err(StickError::SessionFailed(
                self.failure.clone().unwrap_or_default(),
            )),
            SessionState::Closed => Err(StickError::Closed),
            SessionState::OpenedExclusive | SessionState::OpenedShared => {
                self.reader.as_mut().ok_or(StickError::Closed)
            }
        }
    }

    /// Blocks until the next joystick action.
    ///
    /// Only valid on an opened session. Read errors, including the device
    /// going away, are returned immediately and never retried here.
    pub fn decode_next(&mut self) -> Result<StickEvent, StickError> {
        let context = format!("Failed to read {}", self.path.display());
        let event = self
            .usable_reader()?
            .next_event()
            .map_err(|e| StickError::io(context, e))?;

        debug!(
            "Stick event: {:?} {:?} at {:.6}",
            event.direction, event.action, event.timestamp
        );
        Ok(event)
    }

    /// Waits at most `timeout` for the next joystick action
    pub fn poll_next(&mut self, timeout: Duration) -> Result<Option<StickEvent>, StickError> {
        let context = format!("Failed to read {}", self.path.display());
        self.usable_reader()?
            .poll_event(timeout)
            .map_err(|e| StickError::io(context, e))
    }

    /// Blocking iterator over decoded events. Ends after the first error.
    pub fn events(&mut self) -> StickEvents<'_> {
        StickEvents {
            session: self,
            done: false,
        }
    }

    /// Releases the grab if held, then closes the node. Safe to call on a
    /// failed or already closed session.
    pub fn close(&mut self) {
        if self.state == SessionState::Closed {
            debug!("{} already closed", self.path.display());
            return;
        }

        if let Some(mut reader) = self.reader.take() {
            if self.grabbed {
                if let Err(e) = reader.source.ungrab() {
                    warn!("Failed to release grab on {}: {}", self.path.display(), e);
                }
            }
            drop(reader);
            info!("Closed {}", self.path.display());
        }
        self.grabbed = false;
        self.state = SessionState::Closed;
    }
}

impl Drop for StickSession {
    fn drop(&mut self) {
        self.close();
    }
}

/// Iterator returned by [`StickSession::events`]
pub struct StickEvents<'a> {
    session: &'a mut StickSession,
    done: bool,
}

impl Iterator for StickEvents<'_> {
    type Item = Result<StickEvent, StickError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let next = self.session.decode_next();
        if next.is_err() {
            self.done = true;
        }
        Some(next)
    }
}

impl std::iter::FusedIterator for StickEvents<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stick::event::{Action, Direction};
    use crate::stick::source::testing::{key, syn, ScriptedSource};
    use evdev::KeyCode;

    fn no_delay(exclusive: bool) -> SessionOptions {
        SessionOptions {
            exclusive,
            open_delay: Duration::ZERO,
        }
    }

    #[test]
    fn skips_sync_and_decodes_key() {
        let (source, log) = ScriptedSource::new();
        log.push(vec![syn(10, 400_000), key(KeyCode::KEY_UP, 1, 10, 500_000)]);
        let mut reader = KeyEventReader::new(Box::new(source));

        let event = reader.next_event().unwrap();
        assert_eq!(event.direction, Direction::Up);
        assert_eq!(event.action, Action::Press);
        assert_eq!(event.timestamp, 10.5);

        // Script exhausted: exactly one event came out of it.
        assert!(reader.next_event().is_err());
    }

    #[test]
    fn read_failure_propagates() {
        let (source, log) = ScriptedSource::new();
        log.push(vec![syn(1, 0)]);
        log.push_error(libc::ENODEV);
        let mut reader = KeyEventReader::new(Box::new(source));

        let err = reader.next_event().unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::ENODEV));
    }

    #[test]
    fn poll_returns_none_when_idle() {
        let (source, log) = ScriptedSource::new();
        let mut reader = KeyEventReader::new(Box::new(source));

        assert!(reader.poll_event(Duration::from_millis(1)).unwrap().is_none());

        log.push(vec![syn(2, 0)]);
        assert!(reader.poll_event(Duration::from_millis(1)).unwrap().is_none());

        log.push(vec![key(KeyCode::KEY_DOWN, 0, 2, 10)]);
        let event = reader.poll_event(Duration::from_millis(1)).unwrap().unwrap();
        assert_eq!(event.direction, Direction::Down);
    }

    #[test]
    fn nonexistent_path_yields_failed_session() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = StickSession::open_with(dir.path().join("event99"), &no_delay(false));

        assert!(session.is_failed());
        assert!(!session.holds_resource());
        assert!(!session.is_exclusive());
        assert!(session.failure().unwrap().contains("open failed"));
        assert!(matches!(
            session.decode_next(),
            Err(StickError::SessionFailed(_))
        ));

        session.close();
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[test]
    fn busy_device_fails_but_closes_cleanly() {
        let (source, log) = ScriptedSource::busy(libc::EBUSY);
        let mut session = StickSession::from_source("/dev/input/event0", Box::new(source), true);

        assert!(session.is_failed());
        assert!(session.holds_resource());
        assert!(!session.is_exclusive());
        assert!(session.failure().unwrap().contains("grab"));

        session.close();
        assert!(!session.holds_resource());
        assert!(log.is_dropped());
        // The grab never succeeded, so it is never released.
        assert_eq!(log.ungrabs(), 0);
    }

    #[test]
    fn exclusive_session_releases_grab_once() {
        let (source, log) = ScriptedSource::new();
        let mut session = StickSession::from_source("/dev/input/event0", Box::new(source), true);
        assert_eq!(session.state(), SessionState::OpenedExclusive);
        assert!(session.is_exclusive());

        session.close();
        session.close();
        drop(session);

        assert_eq!(log.ungrabs(), 1);
        assert!(log.is_dropped());
    }

    #[test]
    fn shared_session_decodes_until_read_fails() {
        let (source, log) = ScriptedSource::new();
        log.push(vec![syn(3, 0), key(KeyCode::KEY_ENTER, 2, 3, 250_000)]);
        log.push_error(libc::ENODEV);
        let mut session = StickSession::from_source("/dev/input/event1", Box::new(source), false);
        assert_eq!(session.state(), SessionState::OpenedShared);

        let event = session.decode_next().unwrap();
        assert_eq!(event.direction, Direction::Middle);
        assert_eq!(event.action, Action::Hold);
        assert_eq!(event.timestamp, 3.25);

        assert!(matches!(session.decode_next(), Err(StickError::Io { .. })));
    }

    #[test]
    fn events_iterator_stops_after_error() {
        let (source, log) = ScriptedSource::new();
        log.push(vec![
            key(KeyCode::KEY_UP, 1, 1, 0),
            syn(1, 0),
            key(KeyCode::KEY_UP, 0, 1, 100_000),
        ]);
        let mut session = StickSession::from_source("/dev/input/event1", Box::new(source), false);

        let results: Vec<_> = session.events().collect();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().action, Action::Press);
        assert_eq!(results[1].as_ref().unwrap().action, Action::Release);
        assert!(results[2].is_err());
    }

    #[test]
    fn close_is_idempotent() {
        let (source, _log) = ScriptedSource::new();
        let mut session = StickSession::from_source("/dev/input/event1", Box::new(source), false);

        session.close();
        session.close();
        assert_eq!(session.state(), SessionState::Closed);
        assert!(matches!(session.decode_next(), Err(StickError::Closed)));
    }
}
