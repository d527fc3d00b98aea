// src/device/simulated.rs - Time-based micromanipulator model
use super::{DeviceAdapter, DeviceError, Position};
use crate::config::SimulatorConfig;
use async_trait::async_trait;
use rand::Rng;
use std::sync::Mutex;
use tokio::time::{Duration, Instant};

/// Arrival tolerance the controller firmware ships with.
const FACTORY_TOLERANCE_UM: f64 = 0.4;

#[derive(Debug, Clone, Copy)]
struct Motion {
    from: Position,
    to: Position,
    started: Instant,
    duration: Duration,
}

#[derive(Debug)]
struct SimState {
    position: Position,
    motion: Option<Motion>,
    tolerance: f64,
}

/// Simulated actuator used in place of a real transport.
///
/// Travels in a straight line at the commanded speed and settles within
/// `settle_jitter_um` of the target. Moves shorter than `min_step_um`, or
/// already inside the position tolerance, are accepted but produce no motion.
#[derive(Debug)]
pub struct SimulatedDevice {
    state: Mutex<SimState>,
    settle_jitter: f64,
    min_step: f64,
}

impl SimulatedDevice {
    pub fn new(config: &SimulatorConfig) -> Self {
        Self {
            state: Mutex::new(SimState {
                position: Position::from_array(config.start_position),
                motion: None,
                tolerance: FACTORY_TOLERANCE_UM,
            }),
            settle_jitter: config.settle_jitter_um.abs(),
            min_step: config.min_step_um,
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, SimState>, DeviceError> {
        self.state
            .lock()
            .map_err(|_| DeviceError::new("simulator state poisoned"))
    }

    /// Advance the motion model to `now`, landing the actuator if it arrived.
    fn settle(&self, state: &mut SimState, now: Instant) {
        if let Some(motion) = state.motion {
            if now.duration_since(motion.started) >= motion.duration {
                let jitter = if self.settle_jitter > 0.0 {
                    rand::rng().random_range(-self.settle_jitter..=self.settle_jitter)
                } else {
                    0.0
                };
                let mut landed = motion.to.to_array();
                for (coord, start) in landed.iter_mut().zip(motion.from.to_array()) {
                    if *coord != start {
                        *coord += jitter;
                    }
                }
                state.position = Position::from_array(landed);
                state.motion = None;
            }
        }
    }

    fn current(state: &SimState, now: Instant) -> Position {
        match state.motion {
            Some(motion) => {
                let elapsed = now.duration_since(motion.started).as_secs_f64();
                let total = motion.duration.as_secs_f64();
                let fraction = if total > 0.0 { elapsed / total } else { 1.0 };
                motion.from.lerp(motion.to, fraction)
            }
            None => state.position,
        }
    }
}

#[async_trait]
impl DeviceAdapter for SimulatedDevice {
    async fn get_position(&self) -> Result<Position, DeviceError> {
        let now = Instant::now();
        let mut state = self.lock()?;
        self.settle(&mut state, now);
        Ok(Self::current(&state, now))
    }

    async fn move_to(&self, target: Position, speed: f64) -> Result<(), DeviceError> {
        if !speed.is_finite() || speed <= 0.0 {
            return Err(DeviceError::new(format!("invalid speed {} um/s", speed)));
        }
        let now = Instant::now();
        let mut state = self.lock()?;
        self.settle(&mut state, now);
        let from = Self::current(&state, now);
        let distance = from.distance_to(target);
        if distance < self.min_step || distance <= state.tolerance {
            tracing::debug!("Simulator ignoring {:.4} um move (below threshold)", distance);
            state.position = from;
            state.motion = None;
            return Ok(());
        }
        state.motion = Some(Motion {
            from,
            to: target,
            started: now,
            duration: Duration::from_secs_f64(distance / speed),
        });
        Ok(())
    }

    async fn is_busy(&self) -> Result<bool, DeviceError> {
        let now = Instant::now();
        let mut state = self.lock()?;
        self.settle(&mut state, now);
        Ok(state.motion.is_some())
    }

    async fn stop(&self) -> Result<(), DeviceError> {
        let now = Instant::now();
        let mut state = self.lock()?;
        self.settle(&mut state, now);
        state.position = Self::current(&state, now);
        state.motion = None;
        Ok(())
    }

    async fn set_position_tolerance(&self, distance: f64) -> Result<(), DeviceError> {
        if !distance.is_finite() || distance < 0.0 {
            return Err(DeviceError::new(format!("invalid tolerance {} um", distance)));
        }
        self.lock()?.tolerance = distance;
        Ok(())
    }
}
