// src/device/mock.rs - Scripted, call-recording device for tests and dry runs
use super::{DeviceAdapter, DeviceError, Position};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Every adapter operation, used to script failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceOp {
    GetPosition,
    MoveTo,
    IsBusy,
    Stop,
    SetPositionTolerance,
}

/// A recorded adapter call.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCall {
    GetPosition,
    MoveTo { target: Position, speed: f64 },
    IsBusy,
    Stop,
    SetPositionTolerance(f64),
}

impl DeviceCall {
    pub fn op(&self) -> DeviceOp {
        match self {
            DeviceCall::GetPosition => DeviceOp::GetPosition,
            DeviceCall::MoveTo { .. } => DeviceOp::MoveTo,
            DeviceCall::IsBusy => DeviceOp::IsBusy,
            DeviceCall::Stop => DeviceOp::Stop,
            DeviceCall::SetPositionTolerance(_) => DeviceOp::SetPositionTolerance,
        }
    }
}

type CallHook = Arc<dyn Fn(&DeviceCall) + Send + Sync>;

#[derive(Debug)]
struct MockState {
    position: Position,
    target: Option<Position>,
    busy_polls_per_move: usize,
    remaining_busy_polls: usize,
    settle_offset: f64,
    tolerance: Option<f64>,
    calls: Vec<DeviceCall>,
    op_counts: HashMap<DeviceOp, usize>,
    failures: HashMap<DeviceOp, usize>,
}

/// In-memory actuator.
///
/// A move stays busy for `busy_polls_per_move` calls to `is_busy`, then lands
/// on its target shifted by `settle_offset` along every moved coordinate.
/// `stop` aborts a pending move and leaves the position where it was.
#[derive(Clone)]
pub struct MockDevice {
    state: Arc<Mutex<MockState>>,
    hook: Option<CallHook>,
}

impl MockDevice {
    pub fn new(start: Position) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                position: start,
                target: None,
                busy_polls_per_move: 0,
                remaining_busy_polls: 0,
                settle_offset: 0.0,
                tolerance: None,
                calls: Vec::new(),
                op_counts: HashMap::new(),
                failures: HashMap::new(),
            })),
            hook: None,
        }
    }

    pub fn with_busy_polls(self, polls: usize) -> Self {
        self.lock().busy_polls_per_move = polls;
        self
    }

    pub fn with_settle_offset(self, offset: f64) -> Self {
        self.lock().settle_offset = offset;
        self
    }

    /// Fail the `nth` (zero-based) call of `op`.
    pub fn fail_on(self, op: DeviceOp, nth: usize) -> Self {
        self.lock().failures.insert(op, nth);
        self
    }

    /// Run `hook` on every call after it is recorded and before it takes effect.
    pub fn on_call<F>(mut self, hook: F) -> Self
    where
        F: Fn(&DeviceCall) + Send + Sync + 'static,
    {
        self.hook = Some(Arc::new(hook));
        self
    }

    pub fn calls(&self) -> Vec<DeviceCall> {
        self.lock().calls.clone()
    }

    pub fn count(&self, op: DeviceOp) -> usize {
        self.lock().op_counts.get(&op).copied().unwrap_or(0)
    }

    pub fn position(&self) -> Position {
        self.lock().position
    }

    pub fn tolerance(&self) -> Option<f64> {
        self.lock().tolerance
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, call: DeviceCall) -> Result<(), DeviceError> {
        let op = call.op();
        let failed = {
            let mut state = self.lock();
            state.calls.push(call.clone());
            let count = state.op_counts.entry(op).or_insert(0);
            let nth = *count;
            *count += 1;
            state.failures.get(&op) == Some(&nth)
        };
        if let Some(hook) = &self.hook {
            hook(&call);
        }
        if failed {
            return Err(DeviceError::new(format!("injected {:?} failure", op)));
        }
        Ok(())
    }
}

impl std::fmt::Debug for MockDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockDevice").field("state", &*self.lock()).finish()
    }
}

#[async_trait]
impl DeviceAdapter for MockDevice {
    async fn get_position(&self) -> Result<Position, DeviceError> {
        self.record(DeviceCall::GetPosition)?;
        Ok(self.lock().position)
    }

    async fn move_to(&self, target: Position, speed: f64) -> Result<(), DeviceError> {
        self.record(DeviceCall::MoveTo { target, speed })?;
        let mut state = self.lock();
        state.target = Some(target);
        state.remaining_busy_polls = state.busy_polls_per_move;
        if state.remaining_busy_polls == 0 {
            arrive(&mut state);
        }
        Ok(())
    }

    async fn is_busy(&self) -> Result<bool, DeviceError> {
        self.record(DeviceCall::IsBusy)?;
        let mut state = self.lock();
        if state.target.is_none() {
            return Ok(false);
        }
        if state.remaining_busy_polls > 0 {
            state.remaining_busy_polls -= 1;
            return Ok(true);
        }
        arrive(&mut state);
        Ok(false)
    }

    async fn stop(&self) -> Result<(), DeviceError> {
        self.record(DeviceCall::Stop)?;
        let mut state = self.lock();
        state.target = None;
        state.remaining_busy_polls = 0;
        Ok(())
    }

    async fn set_position_tolerance(&self, distance: f64) -> Result<(), DeviceError> {
        self.record(DeviceCall::SetPositionTolerance(distance))?;
        self.lock().tolerance = Some(distance);
        Ok(())
    }
}

fn arrive(state: &mut MockState) {
    if let Some(target) = state.target.take() {
        let from = state.position.to_array();
        let mut landed = target.to_array();
        for (coord, start) in landed.iter_mut().zip(from) {
            if *coord != start {
                *coord += state.settle_offset;
            }
        }
        state.position = Position::from_array(landed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_move_stays_busy_for_scripted_polls() {
        let device = MockDevice::new(Position::default()).with_busy_polls(2);
        device.move_to(Position::new(0.0, 0.0, 5.0), 1.0).await.unwrap();
        assert!(device.is_busy().await.unwrap());
        assert!(device.is_busy().await.unwrap());
        assert!(!device.is_busy().await.unwrap());
        assert_eq!(device.get_position().await.unwrap().z, 5.0);
        assert_eq!(device.count(DeviceOp::IsBusy), 3);
    }

    #[tokio::test]
    async fn test_stop_abandons_move() {
        let device = MockDevice::new(Position::default()).with_busy_polls(5);
        device.move_to(Position::new(0.0, 0.0, 5.0), 1.0).await.unwrap();
        device.stop().await.unwrap();
        assert!(!device.is_busy().await.unwrap());
        assert_eq!(device.position(), Position::default());
    }

    #[tokio::test]
    async fn test_injected_failure_hits_nth_call_only() {
        let device = MockDevice::new(Position::default()).fail_on(DeviceOp::GetPosition, 1);
        assert!(device.get_position().await.is_ok());
        assert!(device.get_position().await.is_err());
        assert!(device.get_position().await.is_ok());
    }

    #[tokio::test]
    async fn test_settle_offset_applies_to_moved_axis() {
        let device = MockDevice::new(Position::new(1.0, 1.0, 0.0)).with_settle_offset(-0.001);
        device.move_to(Position::new(1.0, 1.0, 0.1), 1.0).await.unwrap();
        let landed = device.position();
        assert_eq!(landed.x, 1.0);
        assert!((landed.z - 0.099).abs() < 1e-12);
    }
}
