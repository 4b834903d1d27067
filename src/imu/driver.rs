//! Boundary to the sensor-fusion library
//!
//! The fusion library (RTIMULib on the Sense HAT) is an external collaborator.
//! This trait is the whole surface the crate relies on: a fallible blocking
//! read, a snapshot with per-field validity, a poll interval, and the two
//! environmental sensors.

use std::time::Duration;

/// Which inputs feed the fusion filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorSelection {
    pub compass: bool,
    pub gyro: bool,
    pub accel: bool,
}

impl SensorSelection {
    pub const ALL: Self = Self {
        compass: true,
        gyro: true,
        accel: true,
    };
    pub const COMPASS_ONLY: Self = Self {
        compass: true,
        gyro: false,
        accel: false,
    };
    pub const GYRO_ONLY: Self = Self {
        compass: false,
        gyro: true,
        accel: false,
    };
    pub const ACCEL_ONLY: Self = Self {
        compass: false,
        gyro: false,
        accel: true,
    };
}

impl Default for SensorSelection {
    fn default() -> Self {
        Self::ALL
    }
}

/// Snapshot of the last successful IMU read. `None` marks an invalid field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImuData {
    /// Driver timestamp in microseconds
    pub timestamp_us: u64,
    /// Acceleration in g
    pub accel: Option<[f64; 3]>,
    /// Angular rate in rad/s
    pub gyro: Option<[f64; 3]>,
    /// Magnetic field in uT
    pub compass: Option<[f64; 3]>,
    /// Fused pose as roll, pitch, yaw in radians
    pub fusion_pose: Option<[f64; 3]>,
    /// Fused pose quaternion as scalar, x, y, z
    pub fusion_q_pose: Option<[f64; 4]>,
}

/// Humidity or pressure reading with its temperature companion
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EnvironmentReading {
    pub value: Option<f64>,
    pub temperature: Option<f64>,
}

pub trait ImuDriver {
    fn set_sensors(&mut self, sensors: SensorSelection);

    /// One read attempt. `false` means no fresh sample was available.
    fn read(&mut self) -> bool;

    /// Data captured by the last successful [`ImuDriver::read`]
    fn data(&self) -> ImuData;

    /// Recommended pause between read attempts
    fn poll_interval(&self) -> Duration;

    /// Relative humidity (%) with temperature (°C)
    fn read_humidity(&mut self) -> EnvironmentReading;

    /// Pressure (hPa) with temperature (°C)
    fn read_pressure(&mut self) -> EnvironmentReading;
}
