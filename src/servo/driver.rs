// Actuator driver contract used by the motion executor
//
// A driver addresses servos by integer channel and speaks angles in degrees.
// The valid channel and angle range is up to the implementation.

use super::feetech::FeetechError;

/// Channel identifier addressing one physical servo
pub type Channel = u8;

/// Error types for servo drivers
#[derive(Debug, thiserror::Error)]
pub enum ServoError {
    #[error("Feetech bus error: {0}")]
    Feetech(#[from] FeetechError),

    #[error("Channel {0} is not addressed by this driver")]
    UnknownChannel(Channel),
}

/// Read/write access to a bank of position-controlled servos
pub trait ServoDriver: Send {
    /// Current position of `channel` in degrees.
    ///
    /// May be stale or a default for a channel the driver has never moved.
    fn read_position(&mut self, channel: Channel) -> Result<f32, ServoError>;

    /// Command `channel` to `angle` degrees. Fire-and-forget: no completion
    /// is reported back.
    fn write_position(&mut self, channel: Channel, angle: f32) -> Result<(), ServoError>;
}

impl<D: ServoDriver + ?Sized> ServoDriver for Box<D> {
    fn read_position(&mut self, channel: Channel) -> Result<f32, ServoError> {
        (**self).read_position(channel)
    }

    fn write_position(&mut self, channel: Channel, angle: f32) -> Result<(), ServoError> {
        (**self).write_position(channel, angle)
    }
}
