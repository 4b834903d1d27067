//! RTIMULib settings file resolution
//!
//! RTIMULib takes a settings path without the `.ini` suffix. The system-wide
//! file must exist; the first time a user runs on the board it is copied into
//! their home so calibration changes persist per user. If the copy cannot be
//! made the global file is used directly and changes will not persist.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::error::ImuError;

pub const GLOBAL_SETTINGS: &str = "/etc/RTIMULib";
pub const LOCAL_SETTINGS: &str = ".config/sense_hat/RTIMULib";

const INI_SUFFIX: &str = ".ini";

fn with_ini(base: &Path) -> PathBuf {
    let mut path = base.as_os_str().to_owned();
    path.push(INI_SUFFIX);
    PathBuf::from(path)
}

/// Returns the settings base path RTIMULib should be initialized with
pub fn resolve_settings(global: &Path, local: &Path, home: &Path) -> Result<PathBuf, ImuError> {
    let global_ini = with_ini(global);
    if !global_ini.is_file() {
        return Err(ImuError::Settings(io::Error::new(
            io::ErrorKind::NotFound,
            format!(
                "Cannot find RTIMU global settings file @ {}",
                global_ini.display()
            ),
        )));
    }

    let local_base = home.join(local);
    let local_ini = with_ini(&local_base);
    if local_ini.is_file() {
        debug!("Using user settings {}", local_ini.display());
        return Ok(local_base);
    }

    match copy_settings(&global_ini, &local_ini) {
        Ok(()) => {
            info!(
                "Copied {} to {}",
                global_ini.display(),
                local_ini.display()
            );
            Ok(local_base)
        }
        Err(e) => {
            warn!(
                "Cannot copy settings to {}, changes won't persist: {}",
                local_ini.display(),
                e
            );
            Ok(global.to_path_buf())
        }
    }
}

fn copy_settings(from: &Path, to: &Path) -> io::Result<()> {
    if let Some(dir) = to.parent() {
        fs::create_dir_all(dir)?;
    }
    fs::copy(from, to)?;
    Ok(())
}

/// Home directory of the current user
pub fn home_dir() -> PathBuf {
    if let Some(home) = dirs::home_dir() {
        return home;
    }

    // SAFETY: getuid has no preconditions and cannot fail.
    if unsafe { libc::getuid() } == 0 {
        warn!("Could not determine home directory, assuming /root");
        return PathBuf::from("/root");
    }

    let user = std::env::var("USER").unwrap_or_default();
    warn!("Could not determine home directory, assuming /home/{}", user);
    PathBuf::from("/home").join(user)
}
