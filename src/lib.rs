pub mod config;
pub mod controller;
pub mod document;
pub mod error;
pub mod messages;
pub mod motion;
pub mod runtime;
pub mod sequence;
pub mod servo;

pub use controller::{ControllerOptions, MotionController};
pub use error::{MotionError, StepError};
pub use sequence::MotionStep;
