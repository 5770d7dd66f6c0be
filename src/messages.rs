// Message types published by the runtime

use serde::{Deserialize, Serialize};

use crate::controller::MotionController;
use crate::motion::MotionId;

/// Whether the worker is executing a motion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum MotionState {
    Idle,
    Busy,
}

/// Controller status published by runtime -> observers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MotionStatus {
    pub state: MotionState,
    pub active_motion: Option<MotionId>,
    pub last_completed: Option<MotionId>,
    pub pending: usize,
    pub next_id: MotionId,
}

impl From<&MotionController> for MotionStatus {
    fn from(controller: &MotionController) -> Self {
        Self {
            state: if controller.is_busy() {
                MotionState::Busy
            } else {
                MotionState::Idle
            },
            active_motion: controller.active_motion(),
            last_completed: controller.last_completed(),
            pending: controller.pending(),
            next_id: controller.peek_next_id(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::servo::SimServo;

    #[test]
    fn test_status_of_fresh_controller() {
        let controller = MotionController::init(SimServo::new()).unwrap();
        let status = MotionStatus::from(&controller);

        assert_eq!(status.state, MotionState::Idle);
        assert_eq!(
            serde_json::to_string(&status).unwrap(),
            r#"{"state":"idle","active_motion":null,"last_completed":null,"pending":0,"next_id":0}"#
        );
    }
}
