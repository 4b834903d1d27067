//! IMU collaborator boundary
//!
//! Sensor fusion, filtering and calibration stay inside the external fusion
//! library. This module only wraps it:
//!
//! - [`driver`] - the trait a fusion backend implements
//! - [`retry`] - bounded retry used for every IMU read
//! - [`settings`] - where the backend's settings file comes from
//! - [`measure`] - temperature, humidity, pressure and orientation helpers

pub mod driver;
pub mod error;
pub mod measure;
pub mod retry;
pub mod settings;

pub use driver::{EnvironmentReading, ImuData, ImuDriver, SensorSelection};
pub use error::ImuError;
pub use measure::SenseMeasure;
pub use retry::RetryPolicy;
