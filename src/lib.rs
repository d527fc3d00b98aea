//! Stepped single-axis motion runs for a micromanipulator.
//!
//! A run moves the actuator `loops` times by `step_size` along one axis,
//! waits for the device to settle after each step, and can be stopped or
//! quit at any time from the control surface.

pub mod config;
pub mod device;
pub mod estimate;
pub mod host;
pub mod motion;
pub mod params;

pub use config::{Config, ConfigError};
pub use device::{Axis, DeviceAdapter, DeviceError, Position};
pub use estimate::{estimate, ConfirmationPolicy, TimeEstimate};
pub use host::{HostError, MotionHost, RunHandle};
pub use motion::{CancelSignals, ControllerSettings, MotionController, RunEvent, RunOutcome, RunState};
pub use params::{Field, ParameterForm, RawInputs, RunParameters, ValidationError, ValidationReason};
