//! Events a run reports to its control surface.

use crate::device::{DeviceError, Position};
use crate::params::RunParameters;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Progress of one run, in emission order.
///
/// Every run starts with `Started` and ends with exactly one of `Completed`,
/// `Interrupted` or `Failed`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
    Started {
        run_id: Uuid,
        params: RunParameters,
        started_at: DateTime<Utc>,
    },
    StepCompleted {
        index: u32,
        position: Position,
    },
    Interrupted {
        position: Position,
    },
    Completed,
    Failed {
        error: DeviceError,
    },
}

impl RunEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunEvent::Completed | RunEvent::Interrupted { .. } | RunEvent::Failed { .. }
        )
    }

    /// One-line status message for the control surface.
    pub fn status_text(&self) -> String {
        match self {
            RunEvent::Started { .. } => "Running macro...".to_string(),
            RunEvent::StepCompleted { position, .. } => format!("Moved to: {}", position),
            RunEvent::Interrupted { .. } => "Macro stopped by user".to_string(),
            RunEvent::Completed => "Macro finished".to_string(),
            RunEvent::Failed { error } => format!("Device error: {}", error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_shape() {
        let event = RunEvent::StepCompleted {
            index: 2,
            position: Position::new(0.0, 0.0, 30.0),
        };
        let json: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "step_completed");
        assert_eq!(json["index"], 2);
        assert_eq!(json["position"]["z"], 30.0);

        let failed = RunEvent::Failed { error: DeviceError::new("cable unplugged") };
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["error"]["cause"], "cable unplugged");
    }

    #[test]
    fn test_status_text() {
        assert_eq!(RunEvent::Completed.status_text(), "Macro finished");
        let moved = RunEvent::StepCompleted { index: 0, position: Position::new(0.0, 0.0, 10.0) };
        assert_eq!(moved.status_text(), "Moved to: (0.000, 0.000, 10.000)");
        assert!(!moved.is_terminal());
        assert!(RunEvent::Interrupted { position: Position::default() }.is_terminal());
    }
}
