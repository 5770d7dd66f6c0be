// Feetech STS-series serial bus servos in position mode
//
// Packet format: [0xFF, 0xFF, ID, Length, Instruction, Params..., Checksum]
// Status reply:  [0xFF, 0xFF, ID, Length, Error, Params..., Checksum]
// Length counts everything after itself; the checksum is the inverted low
// byte of the sum of ID..last param.

use serialport::SerialPort;
use std::io::{Read, Write};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::driver::{Channel, ServoDriver, ServoError};

pub const DEFAULT_BAUDRATE: u32 = 1_000_000;
pub const DEFAULT_TIMEOUT_MS: u64 = 100;

/// Encoder steps per full turn
pub const STEPS_PER_REVOLUTION: u16 = 4096;
const STEPS_PER_DEG: f32 = STEPS_PER_REVOLUTION as f32 / 360.0;
const MAX_STEP: u16 = STEPS_PER_REVOLUTION - 1;

const HEADER: [u8; 2] = [0xFF, 0xFF];

#[repr(u8)]
#[derive(Debug, Clone, Copy)]
enum Instruction {
    Ping = 0x01,
    Read = 0x02,
    Write = 0x03,
}

/// RAM registers used for position control
#[repr(u8)]
#[derive(Debug, Clone, Copy)]
pub enum Register {
    OperatingMode = 33,   // 1 byte: 0=position
    TorqueEnable = 40,    // 1 byte
    GoalPosition = 42,    // 2 bytes
    Lock = 55,            // 1 byte
    PresentPosition = 56, // 2 bytes, read-only
}

const POSITION_MODE: u8 = 0;

#[derive(Debug, thiserror::Error)]
pub enum FeetechError {
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed reply from servo {id}: {reason}")]
    Malformed { id: u8, reason: String },

    #[error("Checksum mismatch in reply from servo {id}")]
    Checksum { id: u8 },

    #[error("Servo {id} reported error status 0x{status:02X}")]
    Status { id: u8, status: u8 },

    #[error("No reply from servo {id}")]
    Timeout { id: u8 },
}

pub type Result<T> = std::result::Result<T, FeetechError>;

fn checksum(bytes: &[u8]) -> u8 {
    !bytes.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

fn encode(id: u8, instruction: Instruction, params: &[u8]) -> Vec<u8> {
    let mut packet = Vec::with_capacity(6 + params.len());
    packet.extend_from_slice(&HEADER);
    packet.extend_from_slice(&[id, params.len() as u8 + 2, instruction as u8]);
    packet.extend_from_slice(params);
    packet.push(checksum(&packet[2..]));
    packet
}

/// Validate a status reply body (error byte, params, checksum) and return the params
fn decode_status(expected_id: u8, id: u8, body: &[u8]) -> Result<Vec<u8>> {
    if id != expected_id {
        return Err(FeetechError::Malformed {
            id: expected_id,
            reason: format!("reply addressed from servo {}", id),
        });
    }
    let Some((&received, payload)) = body.split_last() else {
        return Err(FeetechError::Malformed {
            id,
            reason: "empty reply".to_string(),
        });
    };
    let Some((&status, params)) = payload.split_first() else {
        return Err(FeetechError::Malformed {
            id,
            reason: "reply has no status byte".to_string(),
        });
    };

    let mut summed = vec![id, body.len() as u8];
    summed.extend_from_slice(payload);
    if checksum(&summed) != received {
        return Err(FeetechError::Checksum { id });
    }
    if status != 0 {
        return Err(FeetechError::Status { id, status });
    }
    Ok(params.to_vec())
}

/// Degrees to encoder steps, limited to one turn
pub fn angle_to_steps(angle: f32) -> u16 {
    (angle * STEPS_PER_DEG).round().clamp(0.0, MAX_STEP as f32) as u16
}

pub fn steps_to_angle(steps: u16) -> f32 {
    (steps.min(MAX_STEP)) as f32 / STEPS_PER_DEG
}

/// Half-duplex serial bus shared by all servos
pub struct FeetechBus {
    port: Box<dyn SerialPort>,
}

impl FeetechBus {
    pub fn open(port_name: &str) -> Result<Self> {
        let port = serialport::new(port_name, DEFAULT_BAUDRATE)
            .timeout(Duration::from_millis(DEFAULT_TIMEOUT_MS))
            .open()?;
        Ok(Self { port })
    }

    fn transact(&mut self, id: u8, instruction: Instruction, params: &[u8]) -> Result<Vec<u8>> {
        self.port.write_all(&encode(id, instruction, params))?;
        self.port.flush()?;

        let mut head = [0u8; 4];
        self.port.read_exact(&mut head).map_err(|e| match e.kind() {
            std::io::ErrorKind::TimedOut => FeetechError::Timeout { id },
            _ => FeetechError::Io(e),
        })?;
        if head[..2] != HEADER {
            return Err(FeetechError::Malformed {
                id,
                reason: format!("bad header {:02X?}", &head[..2]),
            });
        }

        let mut body = vec![0u8; head[3] as usize];
        self.port.read_exact(&mut body)?;
        decode_status(id, head[2], &body)
    }

    pub fn ping(&mut self, id: u8) -> Result<bool> {
        match self.transact(id, Instruction::Ping, &[]) {
            Ok(_) => Ok(true),
            Err(FeetechError::Timeout { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub fn write_u8(&mut self, id: u8, register: Register, value: u8) -> Result<()> {
        debug!("servo {}: {:?} <- {}", id, register, value);
        self.transact(id, Instruction::Write, &[register as u8, value])
            .map(drop)
    }

    pub fn write_u16(&mut self, id: u8, register: Register, value: u16) -> Result<()> {
        debug!("servo {}: {:?} <- {}", id, register, value);
        let [lo, hi] = value.to_le_bytes();
        self.transact(id, Instruction::Write, &[register as u8, lo, hi])
            .map(drop)
    }

    pub fn read_u16(&mut self, id: u8, register: Register) -> Result<u16> {
        let params = self.transact(id, Instruction::Read, &[register as u8, 2])?;
        match params.as_slice() {
            [lo, hi, ..] => Ok(u16::from_le_bytes([*lo, *hi])),
            _ => Err(FeetechError::Malformed {
                id,
                reason: format!("expected 2 bytes, got {}", params.len()),
            }),
        }
    }

    /// Put a servo into position mode with torque on
    pub fn enable_position_mode(&mut self, id: u8) -> Result<()> {
        self.write_u8(id, Register::TorqueEnable, 0)?;
        self.write_u8(id, Register::Lock, 0)?;
        self.write_u8(id, Register::OperatingMode, POSITION_MODE)?;
        self.write_u8(id, Register::TorqueEnable, 1)?;
        self.write_u8(id, Register::Lock, 1)
    }

    pub fn disable_torque(&mut self, id: u8) -> Result<()> {
        self.write_u8(id, Register::TorqueEnable, 0)
    }
}

/// Servo driver over a Feetech bus; channel = servo ID
pub struct FeetechServo {
    bus: FeetechBus,
    ids: Vec<u8>,
}

impl FeetechServo {
    /// Open the bus and put every listed servo into position mode
    pub fn open(port: &str, ids: &[u8]) -> Result<Self> {
        info!("Opening servo bus on {}", port);
        let mut bus = FeetechBus::open(port)?;
        for &id in ids {
            if !bus.ping(id)? {
                warn!("Servo {} not responding to ping", id);
                return Err(FeetechError::Timeout { id });
            }
            bus.enable_position_mode(id)?;
        }
        info!("Servos {:?} ready in position mode", ids);
        Ok(Self {
            bus,
            ids: ids.to_vec(),
        })
    }

    fn check(&self, channel: Channel) -> std::result::Result<(), ServoError> {
        if self.ids.contains(&channel) {
            Ok(())
        } else {
            Err(ServoError::UnknownChannel(channel))
        }
    }
}

impl ServoDriver for FeetechServo {
    fn read_position(&mut self, channel: Channel) -> std::result::Result<f32, ServoError> {
        self.check(channel)?;
        let steps = self.bus.read_u16(channel, Register::PresentPosition)?;
        Ok(steps_to_angle(steps))
    }

    fn write_position(
        &mut self,
        channel: Channel,
        angle: f32,
    ) -> std::result::Result<(), ServoError> {
        self.check(channel)?;
        self.bus
            .write_u16(channel, Register::GoalPosition, angle_to_steps(angle))?;
        Ok(())
    }
}

impl Drop for FeetechServo {
    fn drop(&mut self) {
        // Leave the servos limp rather than holding the last goal
        for &id in &self.ids {
            if let Err(e) = self.bus.disable_torque(id) {
                warn!("Failed to release servo {} on drop: {}", id, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_write_goal_position() {
        let packet = encode(3, Instruction::Write, &[Register::GoalPosition as u8, 0x00, 0x08]);
        assert_eq!(packet[..5], [0xFF, 0xFF, 3, 5, 0x03]);
        assert_eq!(packet[5..8], [42, 0x00, 0x08]);
        // !(3 + 5 + 3 + 42 + 0 + 8) = !61
        assert_eq!(packet[8], !61u8);
    }

    #[test]
    fn test_decode_status_returns_params() {
        // id 1, length 4: status 0, params [0x00, 0x08], checksum
        let check = checksum(&[1, 4, 0, 0x00, 0x08]);
        let params = decode_status(1, 1, &[0, 0x00, 0x08, check]).unwrap();
        assert_eq!(params, vec![0x00, 0x08]);
    }

    #[test]
    fn test_decode_status_rejects_bad_replies() {
        let check = checksum(&[1, 2, 0]);
        assert!(matches!(
            decode_status(2, 1, &[0, check]),
            Err(FeetechError::Malformed { id: 2, .. })
        ));
        assert!(matches!(
            decode_status(1, 1, &[0, check.wrapping_add(1)]),
            Err(FeetechError::Checksum { id: 1 })
        ));

        let check = checksum(&[1, 2, 0x20]);
        assert!(matches!(
            decode_status(1, 1, &[0x20, check]),
            Err(FeetechError::Status { id: 1, status: 0x20 })
        ));
        assert!(decode_status(1, 1, &[]).is_err());
    }

    #[test]
    fn test_angle_step_conversion() {
        assert_eq!(angle_to_steps(0.0), 0);
        assert_eq!(angle_to_steps(180.0), 2048);
        assert_eq!(angle_to_steps(-10.0), 0);
        assert_eq!(angle_to_steps(400.0), MAX_STEP);
        assert!((steps_to_angle(2048) - 180.0).abs() < 1e-3);
        assert!((steps_to_angle(angle_to_steps(90.0)) - 90.0).abs() < 0.1);
    }
}
