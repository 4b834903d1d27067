//! Joystick discovery
//!
//! The kernel exposes every input device under `/sys/class/input`. Event
//! devices show up as `event<N>` entries whose `device/name` file holds the
//! human-readable device name followed by a newline. The matching device node
//! lives at `/dev/input/event<N>`.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::error::StickError;

/// Name the Sense HAT driver registers for its joystick
pub const SENSE_STICK_NAME: &str = "Raspberry Pi Sense HAT Joystick";

pub const DEFAULT_REGISTRY_DIR: &str = "/sys/class/input";
pub const DEFAULT_DEVICE_DIR: &str = "/dev/input";

const EVENT_PREFIX: &str = "event";

/// Scans an input registry for a device by name
#[derive(Clone, Debug)]
pub struct DeviceLocator {
    registry_dir: PathBuf,
    device_dir: PathBuf,
}

impl Default for DeviceLocator {
    fn default() -> Self {
        Self::new(DEFAULT_REGISTRY_DIR, DEFAULT_DEVICE_DIR)
    }
}

impl DeviceLocator {
    pub fn new(registry_dir: impl Into<PathBuf>, device_dir: impl Into<PathBuf>) -> Self {
        Self {
            registry_dir: registry_dir.into(),
            device_dir: device_dir.into(),
        }
    }

    pub fn registry_dir(&self) -> &Path {
        &self.registry_dir
    }

    /// Returns the device node of the first registry entry named `target`.
    ///
    /// Entries are visited in directory order. An entry whose name file
    /// cannot be read is skipped; only failing to open the registry itself
    /// aborts the scan.
    pub fn locate(&self, target: &str) -> Result<PathBuf, StickError> {
        debug!(
            "Scanning {} for input device {:?}",
            self.registry_dir.display(),
            target
        );

        let entries = fs::read_dir(&self.registry_dir).map_err(|e| {
            StickError::io(
                format!("Failed to open {}", self.registry_dir.display()),
                e,
            )
        })?;

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable registry entry: {}", e);
                    continue;
                }
            };

            let file_name = entry.file_name();
            let Some(id) = file_name.to_str() else {
                continue;
            };
            if !id.starts_with(EVENT_PREFIX) {
                continue;
            }

            let name_path = self.registry_dir.join(id).join("device").join("name");
            let name = match fs::read_to_string(&name_path) {
                Ok(name) => name,
                Err(e) => {
                    debug!("Skipping {}: {}", name_path.display(), e);
                    continue;
                }
            };

            let name = name.strip_suffix('\n').unwrap_or(&name);
            debug!("Candidate {} is {:?}", id, name);

            if name == target {
                let node = self.device_dir.join(id);
                info!("Found {:?} at {}", target, node.display());
                return Ok(node);
            }
        }

        debug!("No input device named {:?}", target);
        Err(StickError::NotFound(target.to_string()))
    }

    /// Locates the Sense HAT joystick
    pub fn find_sense_stick(&self) -> Result<PathBuf, StickError> {
        self.locate(SENSE_STICK_NAME)
    }
}

/// Locates `target` in the default registry
pub fn locate(target: &str) -> Result<PathBuf, StickError> {
    DeviceLocator::default().locate(target)
}

/// Locates the Sense HAT joystick in the default registry
pub fn find_sense_stick() -> Result<PathBuf, StickError> {
    DeviceLocator::default().find_sense_stick()
}

/// True when a Sense HAT joystick is registered with the kernel
pub fn is_attached() -> bool {
    find_sense_stick().is_ok()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tempfile::TempDir;

    /// Builds `<root>/event<N>/device/name` entries
    pub(crate) fn fake_registry(entries: &[(&str, Option<&str>)]) -> TempDir {
        let root = tempfile::tempdir().unwrap();
        for (id, name) in entries {
            let device = root.path().join(id).join("device");
            fs::create_dir_all(&device).unwrap();
            if let Some(name) = name {
                fs::write(device.join("name"), name).unwrap();
            }
        }
        root
    }

    #[test]
    fn finds_matching_entry() {
        let registry = fake_registry(&[
            ("event0", Some("gpio-keys\n")),
            ("event1", Some("Raspberry Pi Sense HAT Joystick\n")),
        ]);
        let locator = DeviceLocator::new(registry.path(), "/dev/input");

        let path = locator.find_sense_stick().unwrap();
        assert_eq!(path, PathBuf::from("/dev/input/event1"));
    }

    #[test]
    fn name_without_newline_also_matches() {
        let registry = fake_registry(&[("event3", Some(SENSE_STICK_NAME))]);
        let locator = DeviceLocator::new(registry.path(), "/dev/input");

        assert_eq!(
            locator.locate(SENSE_STICK_NAME).unwrap(),
            PathBuf::from("/dev/input/event3")
        );
    }

    #[test]
    fn comparison_is_exact() {
        let registry = fake_registry(&[
            ("event0", Some("Raspberry Pi Sense HAT Joystick 2\n")),
            ("event1", Some("raspberry pi sense hat joystick\n")),
        ]);
        let locator = DeviceLocator::new(registry.path(), "/dev/input");

        assert!(matches!(
            locator.find_sense_stick(),
            Err(StickError::NotFound(name)) if name == SENSE_STICK_NAME
        ));
    }

    #[test]
    fn ignores_entries_without_event_prefix() {
        let registry = fake_registry(&[
            ("input4", Some("Raspberry Pi Sense HAT Joystick\n")),
            ("mouse0", Some("Raspberry Pi Sense HAT Joystick\n")),
        ]);
        let locator = DeviceLocator::new(registry.path(), "/dev/input");

        assert!(matches!(
            locator.find_sense_stick(),
            Err(StickError::NotFound(_))
        ));
    }

    #[test]
    fn unreadable_candidate_is_skipped() {
        let registry = fake_registry(&[
            ("event0", None),
            ("event7", Some("Raspberry Pi Sense HAT Joystick\n")),
        ]);
        let locator = DeviceLocator::new(registry.path(), "/dev/input");

        assert_eq!(
            locator.find_sense_stick().unwrap(),
            PathBuf::from("/dev/input/event7")
        );
    }

    #[test]
    fn missing_registry_is_an_io_error() {
        let root = tempfile::tempdir().unwrap();
        let locator = DeviceLocator::new(root.path().join("nope"), "/dev/input");

        assert!(matches!(
            locator.find_sense_stick(),
            Err(StickError::Io { .. })
        ));
    }

    #[test]
    fn device_dir_is_configurable() {
        let registry = fake_registry(&[("event2", Some("Some Pad\n"))]);
        let locator = DeviceLocator::new(registry.path(), "/tmp/nodes");

        assert_eq!(
            locator.locate("Some Pad").unwrap(),
            PathBuf::from("/tmp/nodes/event2")
        );
    }
}
