// Motion executor: turns one resolved motion into timed servo writes
//
// A motion of duration d is sampled every SAMPLE_PERIOD for
// steps = max(1, d / 20ms) intervals, i.e. steps + 1 writes per channel.
// Start positions are resolved once, before the first sample, so every
// channel in a group follows the same schedule.

use std::thread;
use tracing::{trace, warn};

use super::command::{GroupMotion, Motion, SingleMotion};
use super::easing::Easing;
use crate::config::{SAMPLE_PERIOD, SAMPLE_PERIOD_MS};
use crate::servo::{Channel, ServoDriver};

/// Number of sampling intervals for a duration (never zero)
pub fn step_count(duration_ms: u32) -> u32 {
    (duration_ms / SAMPLE_PERIOD_MS).max(1)
}

/// Interpolated angle at eased progress, floored at 0°.
/// The upper bound is left to the driver.
pub fn sample_angle(start: f32, target: f32, eased: f32) -> f32 {
    (start + (target - start) * eased).max(0.0)
}

/// Angles a channel passes through, one per sample
pub fn trajectory(start: f32, target: f32, duration_ms: u32, easing: Easing) -> Vec<f32> {
    let steps = step_count(duration_ms);
    (0..=steps)
        .map(|s| sample_angle(start, target, easing.apply(s as f32 / steps as f32)))
        .collect()
}

pub struct MotionExecutor<D> {
    driver: D,
    easing: Easing,
}

impl<D: ServoDriver> MotionExecutor<D> {
    pub fn new(driver: D, easing: Easing) -> Self {
        Self { driver, easing }
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Run a motion to completion, blocking the calling thread
    pub fn execute(&mut self, motion: &Motion) {
        match motion {
            Motion::Single(single) => self.execute_single(single),
            Motion::Group(group) => self.execute_group(group),
        }
    }

    fn execute_single(&mut self, motion: &SingleMotion) {
        let start = self.resolve_start(motion.channel, motion.start_angle);
        self.sample(
            &[motion.channel],
            &[start],
            &[motion.target_angle],
            motion.duration_ms,
        );
    }

    fn execute_group(&mut self, motion: &GroupMotion) {
        let starts: Vec<f32> = motion
            .channels
            .iter()
            .zip(&motion.start_angles)
            .map(|(&channel, &explicit)| self.resolve_start(channel, explicit))
            .collect();
        self.sample(
            &motion.channels,
            &starts,
            &motion.target_angles,
            motion.duration_ms,
        );
    }

    /// Explicit non-negative start wins; otherwise read the servo
    fn resolve_start(&mut self, channel: Channel, explicit: Option<f32>) -> f32 {
        match explicit {
            Some(angle) if angle >= 0.0 => angle,
            _ => self.driver.read_position(channel).unwrap_or_else(|e| {
                warn!("Reading channel {} failed ({}), starting from 0", channel, e);
                0.0
            }),
        }
    }

    fn sample(&mut self, channels: &[Channel], starts: &[f32], targets: &[f32], duration_ms: u32) {
        let steps = step_count(duration_ms);
        let mut failed_writes = 0usize;

        for s in 0..=steps {
            let eased = self.easing.apply(s as f32 / steps as f32);
            for ((&channel, &start), &target) in channels.iter().zip(starts).zip(targets) {
                let angle = sample_angle(start, target, eased);
                trace!("sample {}/{}: channel {} -> {:.2}", s, steps, channel, angle);
                if let Err(e) = self.driver.write_position(channel, angle) {
                    if failed_writes == 0 {
                        warn!("Write to channel {} failed: {}", channel, e);
                    }
                    failed_writes += 1;
                }
            }
            if s < steps {
                thread::sleep(SAMPLE_PERIOD);
            }
        }

        if failed_writes > 1 {
            warn!("{} servo writes failed during motion", failed_writes);
        }
    }
}
