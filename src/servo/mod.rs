// Servo drivers for the motion controller
//
// Provides:
// - The driver contract (read/write position per channel)
// - Feetech STS serial bus servos in position mode
// - A simulated servo bank that records every write

mod driver;
pub mod feetech;
pub mod sim;

pub use driver::{Channel, ServoDriver, ServoError};
pub use feetech::{FeetechBus, FeetechError, FeetechServo};
pub use sim::{ServoWrite, SimServo};
