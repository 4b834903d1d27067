//! Environmental and orientation measurements on top of an [`ImuDriver`]

use std::f64::consts::PI;
use std::path::Path;
use tracing::{debug, info};

use super::driver::{EnvironmentReading, ImuData, ImuDriver, SensorSelection};
use super::error::ImuError;
use super::retry::RetryPolicy;
use super::settings;
use crate::config::ImuConfig;

/// Measurement API for the Sense HAT sensors
#[derive(Debug)]
pub struct SenseMeasure<D> {
    driver: D,
    retry: RetryPolicy,
    sensors: Option<SensorSelection>,
}

impl<D: ImuDriver> SenseMeasure<D> {
    pub fn new(driver: D, retry: RetryPolicy) -> Self {
        Self {
            driver,
            retry,
            sensors: None,
        }
    }

    /// Resolves the settings file from `config` and hands its path to
    /// `connect`, which brings up the actual driver.
    pub fn open<F>(config: &ImuConfig, connect: F) -> Result<Self, ImuError>
    where
        F: FnOnce(&Path) -> Result<D, ImuError>,
    {
        let settings_path = settings::resolve_settings(
            &config.global_settings,
            &config.local_settings,
            &settings::home_dir(),
        )?;
        info!("Initializing IMU from {}", settings_path.display());

        let driver = connect(&settings_path)?;
        Ok(Self::new(driver, config.retry_policy()))
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn into_driver(self) -> D {
        self.driver
    }

    fn select(&mut self, sensors: SensorSelection) {
        if self.sensors != Some(sensors) {
            debug!("Fusion inputs: {:?}", sensors);
            self.driver.set_sensors(sensors);
            self.sensors = Some(sensors);
        }
    }

    /// Reads the IMU under the retry policy
    pub fn read(&mut self) -> Result<ImuData, ImuError> {
        let interval = self.driver.poll_interval();
        let driver = &mut self.driver;
        self.retry.run(interval, || driver.read())?;
        Ok(self.driver.data())
    }

    /// Temperature in °C from the humidity sensor
    pub fn temperature(&mut self) -> Result<f64, ImuError> {
        let reading = self.driver.read_humidity();
        environment(reading, "Temperature").map(|(_, t)| t)
    }

    /// Temperature in °C from the pressure sensor
    pub fn temperature_from_pressure(&mut self) -> Result<f64, ImuError> {
        let reading = self.driver.read_pressure();
        environment(reading, "Temperature").map(|(_, t)| t)
    }

    /// Relative humidity in %
    pub fn humidity(&mut self) -> Result<f64, ImuError> {
        let reading = self.driver.read_humidity();
        environment(reading, "Humidity").map(|(h, _)| h)
    }

    /// Pressure in hPa
    pub fn pressure(&mut self) -> Result<f64, ImuError> {
        let reading = self.driver.read_pressure();
        environment(reading, "Pressure").map(|(p, _)| p)
    }

    /// Fused roll, pitch, yaw in radians with the current inputs
    pub fn orientation_radians(&mut self) -> Result<[f64; 3], ImuError> {
        self.read()?.fusion_pose.ok_or(ImuError::Invalid("Fusion pose"))
    }

    /// Fused roll, pitch, yaw in degrees, each in [0, 360)
    pub fn orientation_degrees(&mut self) -> Result<[f64; 3], ImuError> {
        self.orientation_radians().map(|pose| pose.map(to_degrees))
    }

    pub fn orientation(&mut self) -> Result<[f64; 3], ImuError> {
        self.orientation_degrees()
    }

    /// Fused pose in degrees using only the given inputs
    pub fn fusion(&mut self, sensors: SensorSelection) -> Result<[f64; 3], ImuError> {
        self.select(sensors);
        self.orientation_degrees()
    }

    pub fn fusion_radians(&mut self, sensors: SensorSelection) -> Result<[f64; 3], ImuError> {
        self.select(sensors);
        self.orientation_radians()
    }

    /// Heading of north in degrees, from the compass alone
    pub fn compass(&mut self) -> Result<f64, ImuError> {
        self.fusion(SensorSelection::COMPASS_ONLY).map(|pose| pose[2])
    }

    /// Orientation in degrees from the gyroscope alone
    pub fn gyroscope(&mut self) -> Result<[f64; 3], ImuError> {
        self.fusion(SensorSelection::GYRO_ONLY)
    }

    /// Orientation in degrees from the accelerometer alone
    pub fn accelerometer(&mut self) -> Result<[f64; 3], ImuError> {
        self.fusion(SensorSelection::ACCEL_ONLY)
    }

    /// Raw acceleration in g
    pub fn accelerometer_raw(&mut self) -> Result<[f64; 3], ImuError> {
        self.select(SensorSelection::ACCEL_ONLY);
        self.read()?.accel.ok_or(ImuError::Invalid("Accelerometer"))
    }

    /// Raw angular rate in rad/s
    pub fn gyroscope_raw(&mut self) -> Result<[f64; 3], ImuError> {
        self.select(SensorSelection::GYRO_ONLY);
        self.read()?.gyro.ok_or(ImuError::Invalid("Gyroscope"))
    }

    /// Raw magnetic field in uT
    pub fn compass_raw(&mut self) -> Result<[f64; 3], ImuError> {
        self.select(SensorSelection::COMPASS_ONLY);
        self.read()?.compass.ok_or(ImuError::Invalid("Compass"))
    }

    /// Fused pose as a quaternion (scalar, x, y, z)
    pub fn quaternion(&mut self) -> Result<[f64; 4], ImuError> {
        self.read()?
            .fusion_q_pose
            .ok_or(ImuError::Invalid("Quaternion pose"))
    }

    /// Driver timestamp of a fresh sample, in microseconds
    pub fn timestamp(&mut self) -> Result<u64, ImuError> {
        Ok(self.read()?.timestamp_us)
    }
}

fn environment(reading: EnvironmentReading, what: &'static str) -> Result<(f64, f64), ImuError> {
    match (reading.value, reading.temperature) {
        (Some(value), Some(temperature)) => Ok((value, temperature)),
        _ => Err(ImuError::Invalid(what)),
    }
}

fn to_degrees(radians: f64) -> f64 {
    let degrees = radians / PI * 180.0;
    if degrees < 0.0 {
        degrees + 360.0
    } else {
        degrees
    }
}
