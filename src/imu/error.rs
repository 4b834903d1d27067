use std::io;

/// Errors from the IMU boundary
#[derive(Debug, thiserror::Error)]
pub enum ImuError {
    /// The driver could not be brought up from its settings file
    #[error("Failed to initialize IMU: {0}")]
    Init(String),

    /// Every read attempt allowed by the retry policy failed
    #[error("IMU read failed after {attempts} attempts")]
    ReadFailed { attempts: u32 },

    /// The read succeeded but the requested field was flagged invalid
    #[error("{0} reading is not valid")]
    Invalid(&'static str),

    /// The RTIMULib settings file is missing or unusable
    #[error("Settings error: {0}")]
    Settings(#[from] io::Error),
}
