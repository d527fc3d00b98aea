// src/motion/mod.rs - Motion control loop, its events and cancellation signals
pub mod controller;
pub mod events;
pub mod signals;

pub use controller::{ControllerSettings, MotionController, RunOutcome, RunState};
pub use events::RunEvent;
pub use signals::{CancelCause, CancelSignals, Latch};
