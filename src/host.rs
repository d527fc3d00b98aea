// src/host.rs - Owns the device and at most one motion worker
use futures_core::stream::Stream;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Duration;
use uuid::Uuid;

use crate::config::Config;
use crate::device::{DeviceAdapter, DeviceError};
use crate::motion::{CancelSignals, ControllerSettings, MotionController, RunEvent, RunOutcome, RunState};
use crate::params::RunParameters;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("A run is already active")]
    AlreadyRunning,
    #[error("Host is shutting down")]
    ShuttingDown,
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),
}

/// The control surface's view of a started run.
#[derive(Debug)]
pub struct RunHandle {
    pub run_id: Uuid,
    events: mpsc::UnboundedReceiver<RunEvent>,
}

impl RunHandle {
    /// Next event, `None` once the worker is gone and the backlog is drained.
    pub async fn next_event(&mut self) -> Option<RunEvent> {
        self.events.recv().await
    }

    pub fn into_stream(self) -> impl Stream<Item = RunEvent> {
        let mut events = self.events;
        async_stream::stream! {
            while let Some(event) = events.recv().await {
                yield event;
            }
        }
    }
}

struct ActiveRun {
    run_id: Uuid,
    signals: CancelSignals,
    state: watch::Receiver<RunState>,
    task: JoinHandle<RunOutcome>,
}

/// Starts runs on a background task and relays stop/quit requests to them.
///
/// Only one worker exists at a time. Each run gets its own latches, so a stop
/// honored by one run never leaks into the next.
pub struct MotionHost {
    device: Arc<dyn DeviceAdapter>,
    settings: ControllerSettings,
    join_timeout: Duration,
    active: Option<ActiveRun>,
    last_state: RunState,
    quitting: bool,
}

impl MotionHost {
    pub fn new(device: Arc<dyn DeviceAdapter>, settings: ControllerSettings, join_timeout: Duration) -> Self {
        Self {
            device,
            settings,
            join_timeout,
            active: None,
            last_state: RunState::Idle,
            quitting: false,
        }
    }

    pub fn from_config(device: Arc<dyn DeviceAdapter>, config: &Config) -> Self {
        Self::new(device, config.controller_settings(), config.quit_join_timeout())
    }

    pub fn state(&self) -> RunState {
        match &self.active {
            // Spawned but not yet scheduled.
            Some(run) if *run.state.borrow() == RunState::Idle => RunState::Running,
            Some(run) => *run.state.borrow(),
            None => self.last_state,
        }
    }

    pub fn is_running(&self) -> bool {
        self.active.as_ref().is_some_and(|run| !run.task.is_finished())
    }

    pub fn active_run_id(&self) -> Option<Uuid> {
        self.active.as_ref().map(|run| run.run_id)
    }

    pub fn start(&mut self, params: RunParameters) -> Result<RunHandle, HostError> {
        if self.quitting {
            return Err(HostError::ShuttingDown);
        }
        if self.is_running() {
            tracing::warn!("Ignoring start: run {:?} still active", self.active_run_id());
            return Err(HostError::AlreadyRunning);
        }
        if let Some(previous) = self.active.take() {
            self.last_state = *previous.state.borrow();
        }

        let run_id = Uuid::new_v4();
        let signals = CancelSignals::new();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let controller = MotionController::new(self.device.clone(), self.settings, events_tx);
        let state = controller.subscribe_state();
        let worker_signals = signals.clone();
        let task = tokio::spawn(async move { controller.run(run_id, params, &worker_signals).await });

        self.active = Some(ActiveRun { run_id, signals, state, task });
        Ok(RunHandle { run_id, events: events_rx })
    }

    /// Ask the active run to stop before its next move or busy poll.
    pub fn request_stop(&self) {
        if let Some(run) = &self.active {
            tracing::info!("Stop requested for run {}", run.run_id);
            run.signals.request_stop();
        }
    }

    /// Latch quit on the active run and halt the device, run or no run.
    /// The host accepts no new runs afterwards.
    pub async fn request_quit(&mut self) -> Result<(), HostError> {
        self.quitting = true;
        if let Some(run) = &self.active {
            tracing::info!("Quit requested for run {}", run.run_id);
            run.signals.request_quit();
        }
        self.device.stop().await?;
        Ok(())
    }

    /// Wait for the active worker to finish.
    pub async fn wait(&mut self) -> Option<RunOutcome> {
        let run = self.active.take()?;
        self.reap(run.task.await)
    }

    /// Quit, then give the worker `join_timeout` to wind down. A worker that
    /// overruns is aborted, recorded as `Failed`, and shutdown continues without it.
    pub async fn shutdown(&mut self) -> Option<RunOutcome> {
        tracing::info!("Shutting down motion host");
        if let Err(e) = self.request_quit().await {
            tracing::error!("Device stop during shutdown failed: {}", e);
        }
        let mut run = self.active.take()?;
        match tokio::time::timeout(self.join_timeout, &mut run.task).await {
            Ok(joined) => self.reap(joined),
            Err(_) => {
                tracing::warn!(
                    "Run {} did not finish within {:?}; abandoning it",
                    run.run_id,
                    self.join_timeout
                );
                run.task.abort();
                // The worker never reported a terminal state.
                self.last_state = RunState::Failed;
                None
            }
        }
    }

    fn reap(&mut self, joined: Result<RunOutcome, tokio::task::JoinError>) -> Option<RunOutcome> {
        match joined {
            Ok(outcome) => {
                self.last_state = outcome.state;
                Some(outcome)
            }
            Err(e) => {
                tracing::error!("Motion worker ended abnormally: {}", e);
                self.last_state = RunState::Failed;
                None
            }
        }
    }
}
