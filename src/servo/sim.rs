// In-memory servo bank for simulation and tests
//
// Every write moves the simulated servo instantly and is recorded with a
// timestamp, so trajectories and pacing can be inspected after the fact.
// Clones share the same bank.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tracing::trace;

use super::driver::{Channel, ServoDriver, ServoError};

/// One recorded position write
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServoWrite {
    pub channel: Channel,
    pub angle: f32,
    pub at: Instant,
}

#[derive(Debug, Default)]
struct Bank {
    positions: HashMap<Channel, f32>,
    writes: Vec<ServoWrite>,
}

/// Simulated servo bank; unaddressed channels report 0°
#[derive(Debug, Clone, Default)]
pub struct SimServo {
    bank: Arc<Mutex<Bank>>,
}

impl SimServo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Preset where a servo currently sits
    pub fn with_position(self, channel: Channel, angle: f32) -> Self {
        self.bank().positions.insert(channel, angle);
        self
    }

    /// Last commanded (or preset) position of a channel
    pub fn position(&self, channel: Channel) -> Option<f32> {
        self.bank().positions.get(&channel).copied()
    }

    /// Snapshot of every write so far, oldest first
    pub fn writes(&self) -> Vec<ServoWrite> {
        self.bank().writes.clone()
    }

    /// Writes to a single channel, oldest first
    pub fn writes_for(&self, channel: Channel) -> Vec<ServoWrite> {
        self.bank()
            .writes
            .iter()
            .filter(|w| w.channel == channel)
            .copied()
            .collect()
    }

    pub fn write_count(&self) -> usize {
        self.bank().writes.len()
    }

    fn bank(&self) -> MutexGuard<'_, Bank> {
        self.bank.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ServoDriver for SimServo {
    fn read_position(&mut self, channel: Channel) -> Result<f32, ServoError> {
        Ok(self.position(channel).unwrap_or(0.0))
    }

    fn write_position(&mut self, channel: Channel, angle: f32) -> Result<(), ServoError> {
        trace!("sim servo {} -> {:.2}", channel, angle);
        let mut bank = self.bank();
        bank.positions.insert(channel, angle);
        bank.writes.push(ServoWrite {
            channel,
            angle,
            at: Instant::now(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unaddressed_channel_reads_zero() {
        let mut sim = SimServo::new();
        assert_eq!(sim.read_position(5).unwrap(), 0.0);
        assert_eq!(sim.position(5), None);
    }

    #[test]
    fn test_clones_share_bank() {
        let sim = SimServo::new().with_position(1, 45.0);
        let mut handle = sim.clone();
        handle.write_position(1, 60.0).unwrap();
        handle.write_position(2, 10.0).unwrap();

        assert_eq!(sim.position(1), Some(60.0));
        assert_eq!(sim.write_count(), 2);
        assert_eq!(sim.writes_for(2).len(), 1);
        assert_eq!(sim.writes_for(2)[0].angle, 10.0);
    }
}
