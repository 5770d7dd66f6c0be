// Motion execution core
//
// Provides:
// - Easing curves for trajectory shaping
// - Motion command types passed through the queue
// - The fixed-period trajectory executor
// - The worker thread that drains the queue one motion at a time

pub mod command;
pub mod easing;
pub mod executor;
pub mod worker;

pub use command::{GroupMotion, Motion, MotionCommand, MotionId, MotionKind, SingleMotion};
pub use easing::{Easing, ease_in_out_quad};
pub use executor::{MotionExecutor, sample_angle, step_count, trajectory};
pub use worker::WorkerStatus;
