// src/device/mod.rs - Device adapter contract consumed by the motion controller
pub mod mock;
pub mod simulated;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub use mock::MockDevice;
pub use simulated::SimulatedDevice;

/// Any failure reported by the actuator or its transport.
///
/// Device errors are fatal to the run that observes them; nothing in the
/// motion loop retries.
#[derive(Debug, Clone, Error, PartialEq, Serialize)]
#[error("{cause}")]
pub struct DeviceError {
    pub cause: String,
}

impl DeviceError {
    pub fn new(cause: impl Into<String>) -> Self {
        Self { cause: cause.into() }
    }
}

/// A single axis of the manipulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    #[default]
    Z,
}

impl Axis {
    fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = match self {
            Axis::X => 'x',
            Axis::Y => 'y',
            Axis::Z => 'z',
        };
        write!(f, "{}", c)
    }
}

/// Actuator position in micrometers.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize, Serialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn from_array(coords: [f64; 3]) -> Self {
        Self::new(coords[0], coords[1], coords[2])
    }

    pub fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    pub fn axis(self, axis: Axis) -> f64 {
        self.to_array()[axis.index()]
    }

    /// Returns a copy of this position moved by `delta` along `axis`.
    pub fn offset(self, axis: Axis, delta: f64) -> Self {
        let mut coords = self.to_array();
        coords[axis.index()] += delta;
        Self::from_array(coords)
    }

    pub fn distance_to(self, other: Position) -> f64 {
        let (dx, dy, dz) = (other.x - self.x, other.y - self.y, other.z - self.z);
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Linear interpolation, `fraction` clamped to `[0, 1]`.
    pub fn lerp(self, other: Position, fraction: f64) -> Self {
        let t = fraction.clamp(0.0, 1.0);
        Self::new(
            self.x + (other.x - self.x) * t,
            self.y + (other.y - self.y) * t,
            self.z + (other.z - self.z) * t,
        )
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.3}, {:.3}, {:.3})", self.x, self.y, self.z)
    }
}

/// The actuator capability the motion controller drives.
///
/// Implementations own the transport. `move_to` returns once the command has
/// been accepted, not when motion completes; completion is observed through
/// `is_busy`.
#[async_trait]
pub trait DeviceAdapter: Send + Sync {
    async fn get_position(&self) -> Result<Position, DeviceError>;

    async fn move_to(&self, target: Position, speed: f64) -> Result<(), DeviceError>;

    async fn is_busy(&self) -> Result<bool, DeviceError>;

    /// Halt any motion in progress. Safe to call while idle.
    async fn stop(&self) -> Result<(), DeviceError>;

    /// Distance (µm) under which the device considers itself at the target.
    async fn set_position_tolerance(&self, distance: f64) -> Result<(), DeviceError>;
}
