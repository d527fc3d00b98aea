// src/motion/signals.rs - Cancellation latches shared between the host and a worker
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A boolean that can be set once and never cleared.
///
/// Clones share the same flag. A new run gets a new latch instead of
/// resetting an old one.
#[derive(Debug, Clone, Default)]
pub struct Latch(Arc<AtomicBool>);

impl Latch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Which latch ended a run early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelCause {
    Stop,
    Quit,
}

/// The stop and quit latches for one run.
#[derive(Debug, Clone, Default)]
pub struct CancelSignals {
    stop: Latch,
    quit: Latch,
}

impl CancelSignals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.stop.set();
    }

    pub fn request_quit(&self) {
        self.quit.set();
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.is_set()
    }

    pub fn quit_requested(&self) -> bool {
        self.quit.is_set()
    }

    /// Quit wins when both latches are set.
    pub fn cause(&self) -> Option<CancelCause> {
        if self.quit_requested() {
            Some(CancelCause::Quit)
        } else if self.stop_requested() {
            Some(CancelCause::Stop)
        } else {
            None
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cause().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latches_are_independent_and_shared() {
        let signals = CancelSignals::new();
        let worker_view = signals.clone();
        assert_eq!(worker_view.cause(), None);
        signals.request_stop();
        assert!(worker_view.stop_requested());
        assert!(!worker_view.quit_requested());
        assert_eq!(worker_view.cause(), Some(CancelCause::Stop));
        signals.request_quit();
        assert_eq!(worker_view.cause(), Some(CancelCause::Quit));
    }

    #[test]
    fn test_fresh_signals_start_clear() {
        let old = CancelSignals::new();
        old.request_stop();
        assert!(!CancelSignals::new().is_cancelled());
    }
}
