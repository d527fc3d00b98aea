// src/motion/controller.rs - Step-and-settle motion loop
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep, Duration};
use uuid::Uuid;

use crate::device::{Axis, DeviceAdapter, DeviceError, Position};
use crate::motion::events::RunEvent;
use crate::motion::signals::{CancelCause, CancelSignals};
use crate::params::RunParameters;

/// Lifecycle of a run as seen from the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunState {
    #[default]
    Idle,
    Running,
    StopRequested,
    Finished,
    Failed,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Finished | RunState::Failed)
    }
}

/// Fixed per-host settings of the motion loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControllerSettings {
    pub axis: Axis,
    /// Interval between busy polls. Bounds cancellation latency.
    pub poll_interval: Duration,
    /// Arrival tolerance handed to the device before the first move (µm).
    pub position_tolerance: f64,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            axis: Axis::Z,
            poll_interval: Duration::from_millis(100),
            position_tolerance: 0.005,
        }
    }
}

/// Summary of a finished run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub run_id: Uuid,
    pub state: RunState,
    pub steps_completed: u32,
    /// Last device-reported position, `None` if it was never read.
    pub last_position: Option<Position>,
    pub cancelled_by: Option<CancelCause>,
    pub error: Option<DeviceError>,
}

enum Termination {
    Completed,
    Interrupted(Position, CancelCause),
}

#[derive(Debug, PartialEq)]
enum Settle {
    Idle,
    Cancelled(CancelCause),
}

#[derive(Default)]
struct Progress {
    steps_completed: u32,
    last_position: Option<Position>,
}

/// Executes one run at a time against a device.
///
/// The controller owns no shared mutable state: position and loop index live
/// on the stack of `run`, progress goes out through the event channel and
/// the state watch.
pub struct MotionController {
    device: Arc<dyn DeviceAdapter>,
    settings: ControllerSettings,
    events: mpsc::UnboundedSender<RunEvent>,
    state: watch::Sender<RunState>,
}

impl MotionController {
    pub fn new(
        device: Arc<dyn DeviceAdapter>,
        settings: ControllerSettings,
        events: mpsc::UnboundedSender<RunEvent>,
    ) -> Self {
        let (state, _) = watch::channel(RunState::Idle);
        Self { device, settings, events, state }
    }

    pub fn subscribe_state(&self) -> watch::Receiver<RunState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> RunState {
        *self.state.borrow()
    }

    /// Run `params.loops()` relative steps, honoring `signals` between and
    /// during moves. Device errors end the run in `Failed`; nothing is retried.
    pub async fn run(&self, run_id: Uuid, params: RunParameters, signals: &CancelSignals) -> RunOutcome {
        tracing::info!("Run {} starting: {} on axis {}", run_id, params, self.settings.axis);
        self.set_state(RunState::Running);
        self.emit(RunEvent::Started {
            run_id,
            params,
            started_at: chrono::Utc::now(),
        });

        let mut progress = Progress::default();
        let (state, cancelled_by, error) = match self.execute(&params, signals, &mut progress).await {
            Ok(Termination::Completed) => {
                tracing::info!("Run {} finished after {} steps", run_id, progress.steps_completed);
                self.emit(RunEvent::Completed);
                (RunState::Finished, None, None)
            }
            Ok(Termination::Interrupted(position, cause)) => {
                tracing::info!("Run {} interrupted ({:?}) at {}", run_id, cause, position);
                self.emit(RunEvent::Interrupted { position });
                (RunState::Finished, Some(cause), None)
            }
            Err(e) => {
                tracing::error!("Run {} failed: device error: {}", run_id, e);
                self.emit(RunEvent::Failed { error: e.clone() });
                (RunState::Failed, signals.cause(), Some(e))
            }
        };
        self.set_state(state);

        RunOutcome {
            run_id,
            state,
            steps_completed: progress.steps_completed,
            last_position: progress.last_position,
            cancelled_by,
            error,
        }
    }

    async fn execute(
        &self,
        params: &RunParameters,
        signals: &CancelSignals,
        progress: &mut Progress,
    ) -> Result<Termination, DeviceError> {
        let mut last_known = self.device.get_position().await?;
        progress.last_position = Some(last_known);
        tracing::info!("Starting position: {}", last_known);

        self.device
            .set_position_tolerance(self.settings.position_tolerance)
            .await?;

        for index in 0..params.loops() {
            if let Some(cause) = signals.cause() {
                self.set_state(RunState::StopRequested);
                return Ok(Termination::Interrupted(last_known, cause));
            }

            // Relative to the observed position, not the planned one.
            let target = last_known.offset(self.settings.axis, params.step_size());
            tracing::debug!("Step {}: moving to {} at {} um/s", index, target, params.speed());
            self.device.move_to(target, params.speed()).await?;

            if let Settle::Cancelled(cause) = self.wait_until_idle(signals).await? {
                self.set_state(RunState::StopRequested);
                self.device.stop().await?;
                let position = self.device.get_position().await?;
                progress.last_position = Some(position);
                return Ok(Termination::Interrupted(position, cause));
            }

            // Settling pause; latches are only checked again before the next move.
            sleep(Duration::from_secs_f64(params.delay())).await;

            let previous = last_known;
            last_known = self.device.get_position().await?;
            progress.last_position = Some(last_known);
            progress.steps_completed += 1;
            let axis = self.settings.axis;
            tracing::debug!(
                "Moved to: {} ({} travel {:.3} um)",
                last_known,
                axis,
                last_known.axis(axis) - previous.axis(axis)
            );
            self.emit(RunEvent::StepCompleted { index, position: last_known });
        }

        Ok(Termination::Completed)
    }

    async fn wait_until_idle(&self, signals: &CancelSignals) -> Result<Settle, DeviceError> {
        loop {
            if let Some(cause) = signals.cause() {
                return Ok(Settle::Cancelled(cause));
            }
            if !self.device.is_busy().await? {
                return Ok(Settle::Idle);
            }
            sleep(self.settings.poll_interval).await;
        }
    }

    fn emit(&self, event: RunEvent) {
        // The surface may have stopped listening; the run goes on regardless.
        let _ = self.events.send(event);
    }

    fn set_state(&self, state: RunState) {
        self.state.send_replace(state);
    }
}
