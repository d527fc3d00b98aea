// src/estimate.rs - Run duration estimates and the long-run confirmation gate
use crate::params::RunParameters;
use serde::Serialize;
use std::fmt;

/// Duration estimate for a run, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimeEstimate {
    /// Travel time of one step, excluding the inter-step delay.
    pub per_step_secs: f64,
    pub total_secs: f64,
}

/// Limits above which a run must be confirmed by the user before it starts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfirmationPolicy {
    pub max_step_secs: f64,
    pub max_total_secs: f64,
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        Self {
            max_step_secs: 20.0,
            max_total_secs: 600.0,
        }
    }
}

pub fn estimate(params: &RunParameters) -> TimeEstimate {
    let per_step_secs = params.step_size() / params.speed();
    let total_secs = (per_step_secs + params.delay()) * f64::from(params.loops());
    TimeEstimate { per_step_secs, total_secs }
}

impl TimeEstimate {
    pub fn needs_confirmation(&self, policy: &ConfirmationPolicy) -> bool {
        self.per_step_secs > policy.max_step_secs || self.total_secs > policy.max_total_secs
    }

    pub fn total_minutes(&self) -> f64 {
        self.total_secs / 60.0
    }
}

impl fmt::Display for TimeEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Time per step (no delay): {:.2} s | Total time: {:.2} s / {:.2} min",
            self.per_step_secs,
            self.total_secs,
            self.total_minutes()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_format() {
        let params = RunParameters::new(3, 10.0, 5.0, 1.0).unwrap();
        assert_eq!(
            estimate(&params).to_string(),
            "Time per step (no delay): 2.00 s | Total time: 9.00 s / 0.15 min"
        );
    }

    #[test]
    fn test_gate_boundaries_are_exclusive() {
        let policy = ConfirmationPolicy::default();
        let at_limit = TimeEstimate { per_step_secs: 20.0, total_secs: 600.0 };
        assert!(!at_limit.needs_confirmation(&policy));
        let slow_step = TimeEstimate { per_step_secs: 20.01, total_secs: 30.0 };
        assert!(slow_step.needs_confirmation(&policy));
        let long_run = TimeEstimate { per_step_secs: 1.0, total_secs: 600.5 };
        assert!(long_run.needs_confirmation(&policy));
    }
}
