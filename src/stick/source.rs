//! Where raw input events come from
//!
//! A session reads through [`InputSource`] so the decoder does not care
//! whether events come from a real evdev node or from a test script.

use evdev::{Device, InputEvent};
use std::io;
use std::os::unix::io::AsRawFd;
use std::time::Duration;

pub trait InputSource: Send {
    /// Blocks until the device delivers at least one event
    fn fetch_batch(&mut self) -> io::Result<Vec<InputEvent>>;

    /// Waits up to `timeout` for events; `false` when none arrived
    fn wait_readable(&mut self, timeout: Duration) -> io::Result<bool>;

    /// Takes the device away from every other reader
    fn grab(&mut self) -> io::Result<()>;

    fn ungrab(&mut self) -> io::Result<()>;
}

impl InputSource for Device {
    fn fetch_batch(&mut self) -> io::Result<Vec<InputEvent>> {
        Ok(self.fetch_events()?.collect())
    }

    fn wait_readable(&mut self, timeout: Duration) -> io::Result<bool> {
        let mut fds = libc::pollfd {
            fd: self.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        };
        let timeout_ms = libc::c_int::try_from(timeout.as_millis()).unwrap_or(libc::c_int::MAX);

        // SAFETY: fds points at one valid pollfd for the duration of the call.
        let rc = unsafe { libc::poll(&mut fds, 1, timeout_ms) };
        match rc {
            -1 => {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    Ok(false)
                } else {
                    Err(err)
                }
            }
            0 => Ok(false),
            // POLLERR/POLLHUP also count: the following read reports them.
            _ => Ok(true),
        }
    }

    fn grab(&mut self) -> io::Result<()> {
        Device::grab(self)
    }

    fn ungrab(&mut self) -> io::Result<()> {
        Device::ungrab(self)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use evdev::{EventType, KeyCode};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    /// Builds an event with a kernel timestamp
    pub(crate) fn input(kind: EventType, code: u16, value: i32, sec: i64, usec: i64) -> InputEvent {
        InputEvent::from(libc::input_event {
            time: libc::timeval {
                tv_sec: sec as libc::time_t,
                tv_usec: usec as libc::suseconds_t,
            },
            type_: kind.0,
            code,
            value,
        })
    }

    pub(crate) fn key(code: KeyCode, value: i32, sec: i64, usec: i64) -> InputEvent {
        input(EventType::KEY, code.code(), value, sec, usec)
    }

    pub(crate) fn syn(sec: i64, usec: i64) -> InputEvent {
        input(EventType::SYNCHRONIZATION, 0, 0, sec, usec)
    }

    /// What happened to a [`ScriptedSource`], visible after it moved away
    #[derive(Default)]
    pub(crate) struct SourceLog {
        pub grabs: AtomicU32,
        pub ungrabs: AtomicU32,
        pub dropped: AtomicBool,
        pending: Mutex<VecDeque<io::Result<Vec<InputEvent>>>>,
    }

    impl SourceLog {
        /// Queues a batch for the next fetch
        pub(crate) fn push(&self, batch: Vec<InputEvent>) {
            self.pending.lock().unwrap().push_back(Ok(batch));
        }

        /// Queues a read failure, like a device being unplugged
        pub(crate) fn push_error(&self, errno: i32) {
            self.pending
                .lock()
                .unwrap()
                .push_back(Err(io::Error::from_raw_os_error(errno)));
        }

        pub(crate) fn is_dropped(&self) -> bool {
            self.dropped.load(Ordering::SeqCst)
        }

        pub(crate) fn ungrabs(&self) -> u32 {
            self.ungrabs.load(Ordering::SeqCst)
        }
    }

    /// Replays queued batches. An empty queue looks idle to
    /// `wait_readable` and like a vanished device to `fetch_batch`.
    pub(crate) struct ScriptedSource {
        log: Arc<SourceLog>,
        grab_error: Option<i32>,
    }

    impl ScriptedSource {
        pub(crate) fn new() -> (Self, Arc<SourceLog>) {
            let log = Arc::new(SourceLog::default());
            (
                Self {
                    log: log.clone(),
                    grab_error: None,
                },
                log,
            )
        }

        /// A source whose grab fails with `errno`, e.g. EBUSY when another
        /// reader already holds the device
        pub(crate) fn busy(errno: i32) -> (Self, Arc<SourceLog>) {
            let (mut source, log) = Self::new();
            source.grab_error = Some(errno);
            (source, log)
        }
    }

    impl InputSource for ScriptedSource {
        fn fetch_batch(&mut self) -> io::Result<Vec<InputEvent>> {
            self.log
                .pending
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(io::Error::from_raw_os_error(libc::ENODEV)))
        }

        fn wait_readable(&mut self, timeout: Duration) -> io::Result<bool> {
            if !self.log.pending.lock().unwrap().is_empty() {
                return Ok(true);
            }
            std::thread::sleep(timeout);
            Ok(!self.log.pending.lock().unwrap().is_empty())
        }

        fn grab(&mut self) -> io::Result<()> {
            if let Some(errno) = self.grab_error {
                return Err(io::Error::from_raw_os_error(errno));
            }
            self.log.grabs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn ungrab(&mut self) -> io::Result<()> {
            self.log.ungrabs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    impl Drop for ScriptedSource {
        fn drop(&mut self) {
            self.log.dropped.store(true, Ordering::SeqCst);
        }
    }
}
