//! C calling convention for the joystick
//!
//! Results are written into caller-owned memory; the only allocation that
//! crosses the boundary is the session itself, which is released with
//! [`sense_stick_close`].

use std::ffi::{c_char, c_int, CStr, OsStr};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::ptr;
use tracing::warn;

use crate::stick::{DeviceLocator, StickError, StickEvent, StickSession};

pub const SENSE_OK: c_int = 0;
pub const SENSE_NOT_FOUND: c_int = -1;
pub const SENSE_IO_ERROR: c_int = -2;
pub const SENSE_INVALID_ARGUMENT: c_int = -3;

/// Joystick event as seen from C
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SenseStickEvent {
    pub timestamp: f64,
    /// 1 up, 2 right, 3 down, 4 left, 5 middle, 0 unknown
    pub dir: i8,
    /// 0 release, 1 press, 2 hold; anything else is the raw value
    pub action: i8,
}

impl From<StickEvent> for SenseStickEvent {
    fn from(event: StickEvent) -> Self {
        Self {
            timestamp: event.timestamp,
            dir: event.direction.code(),
            action: event.action.value() as i8,
        }
    }
}

fn status(err: &StickError) -> c_int {
    match err {
        StickError::NotFound(_) => SENSE_NOT_FOUND,
        StickError::Io { .. } | StickError::SessionFailed(_) => SENSE_IO_ERROR,
        StickError::InvalidArgument(_) | StickError::Closed => SENSE_INVALID_ARGUMENT,
    }
}

/// Writes `path` NUL-terminated into `buf`
unsafe fn write_path(path: &Path, buf: *mut c_char, len: usize) -> Result<(), StickError> {
    let bytes = path.as_os_str().as_bytes();
    if bytes.len() + 1 > len {
        return Err(StickError::InvalidArgument(format!(
            "buffer of {} bytes cannot hold {}",
            len,
            path.display()
        )));
    }
    ptr::copy_nonoverlapping(bytes.as_ptr().cast::<c_char>(), buf, bytes.len());
    *buf.add(bytes.len()) = 0;
    Ok(())
}

pub(crate) unsafe fn find_into(locator: &DeviceLocator, buf: *mut c_char, len: usize) -> c_int {
    if buf.is_null() {
        return SENSE_INVALID_ARGUMENT;
    }
    match locator
        .find_sense_stick()
        .and_then(|path| write_path(&path, buf, len))
    {
        Ok(()) => SENSE_OK,
        Err(e) => {
            if !matches!(e, StickError::NotFound(_)) {
                warn!("sense_stick_find: {}", e);
            }
            status(&e)
        }
    }
}

/// Finds the joystick device node and writes its path into `buf`.
///
/// # Safety
/// `buf` must be null or valid for writes of `len` bytes.
#[no_mangle]
pub unsafe extern "C" fn sense_stick_find(buf: *mut c_char, len: usize) -> c_int {
    find_into(&DeviceLocator::default(), buf, len)
}

/// Opens the device at `path`. Returns null only for a null `path`;
/// otherwise check [`sense_stick_failed`] before reading.
///
/// # Safety
/// `path` must be null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn sense_stick_open(path: *const c_char, exclusive: bool) -> *mut StickSession {
    if path.is_null() {
        return ptr::null_mut();
    }
    let path = Path::new(OsStr::from_bytes(CStr::from_ptr(path).to_bytes()));
    Box::into_raw(Box::new(StickSession::open(path, exclusive)))
}

/// True when the session is unusable. A null handle counts as failed.
///
/// # Safety
/// `handle` must be null or a live pointer from [`sense_stick_open`].
#[no_mangle]
pub unsafe extern "C" fn sense_stick_failed(handle: *const StickSession) -> bool {
    handle.as_ref().map_or(true, StickSession::is_failed)
}

/// Blocks until the next joystick event and writes it into `out`.
///
/// # Safety
/// `handle` must be null or a live pointer from [`sense_stick_open`];
/// `out` must be null or valid for writes.
#[no_mangle]
pub unsafe extern "C" fn sense_stick_read(
    handle: *mut StickSession,
    out: *mut SenseStickEvent,
) -> c_int {
    let (Some(session), false) = (handle.as_mut(), out.is_null()) else {
        return SENSE_INVALID_ARGUMENT;
    };
    match session.decode_next() {
        Ok(event) => {
            out.write(event.into());
            SENSE_OK
        }
        Err(e) => {
            warn!("sense_stick_read: {}", e);
            status(&e)
        }
    }
}

/// Releases the grab, closes the node and frees the session. Null is a no-op.
///
/// # Safety
/// `handle` must be null or a pointer from [`sense_stick_open`] that has not
/// been closed yet.
#[no_mangle]
pub unsafe extern "C" fn sense_stick_close(handle: *mut StickSession) {
    if !handle.is_null() {
        drop(Box::from_raw(handle));
    }
}
