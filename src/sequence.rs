// Preset motion sequences
//
// A sequence is a list of steps submitted one after another. A step's
// post-delay pauses the submitting thread, not the worker, so it paces
// submission rather than execution.

use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::config::POLL_INTERVAL;
use crate::controller::{self, MotionController, SendMode};
use crate::error::{MotionError, Result};
use crate::motion::{Motion, MotionId, MotionKind};
use crate::servo::Channel;

/// One step of a sequence or motion document
#[derive(Debug, Clone, PartialEq)]
pub struct MotionStep {
    pub kind: MotionKind,
    pub channels: Vec<Channel>,
    /// Target angles, index-aligned with `channels`
    pub angles: Vec<f32>,
    pub duration_ms: u32,
    /// Pause after submitting this step, before the next one
    pub delay_after_ms: u32,
}

impl MotionStep {
    pub fn single(channel: Channel, target_angle: f32, duration_ms: u32) -> Self {
        Self {
            kind: MotionKind::Single,
            channels: vec![channel],
            angles: vec![target_angle],
            duration_ms,
            delay_after_ms: 0,
        }
    }

    pub fn group(channels: &[Channel], target_angles: &[f32], duration_ms: u32) -> Self {
        Self {
            kind: MotionKind::Group,
            channels: channels.to_vec(),
            angles: target_angles.to_vec(),
            duration_ms,
            delay_after_ms: 0,
        }
    }

    pub fn then_wait(mut self, delay_after_ms: u32) -> Self {
        self.delay_after_ms = delay_after_ms;
        self
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn post_delay(&self) -> Duration {
        Duration::from_millis(self.delay_after_ms as u64)
    }

    fn motion(&self) -> Result<Motion> {
        match self.kind {
            MotionKind::Single => {
                let (Some(&channel), Some(&angle)) = (self.channels.first(), self.angles.first())
                else {
                    return Err(MotionError::InvalidArgument(
                        "single step needs a channel and a target angle".to_string(),
                    ));
                };
                Ok(controller::single(channel, angle, self.duration_ms))
            }
            MotionKind::Group => controller::group(&self.channels, &self.angles, self.duration_ms),
        }
    }
}

impl MotionController {
    /// Submit one step through the matching `submit_*` call
    pub fn submit_step(&self, step: &MotionStep) -> Result<MotionId> {
        self.enqueue(step.motion()?, SendMode::Blocking)
    }

    /// Submit steps in order, sleeping each step's post-delay after it is
    /// queued. Stops at the first failed submission; steps already queued
    /// stay queued. A `stop_all` while this runs ends it with `Stopped`.
    pub fn run_sequence(&self, steps: &[MotionStep]) -> Result<Vec<MotionId>> {
        let generation = self.generation();
        let mut ids = Vec::with_capacity(steps.len());
        for step in steps {
            ids.push(self.submit_step_until_stopped(step, generation)?);
            self.wait_after(step, generation)?;
        }
        Ok(ids)
    }

    /// `submit_step` that gives up if `stop_all` ran since `generation`,
    /// including while blocked on a full queue
    pub(crate) fn submit_step_until_stopped(
        &self,
        step: &MotionStep,
        generation: u64,
    ) -> Result<MotionId> {
        self.enqueue(step.motion()?, SendMode::UntilStopped { generation })
    }

    /// Sleep a step's post-delay, cut short by `stop_all`
    pub(crate) fn wait_after(&self, step: &MotionStep, generation: u64) -> Result<()> {
        if step.delay_after_ms == 0 {
            return Ok(());
        }
        debug!("Waiting {} ms before next step", step.delay_after_ms);

        let deadline = Instant::now() + step.post_delay();
        loop {
            self.check_generation(generation)?;
            let now = Instant::now();
            if now >= deadline {
                return Ok(());
            }
            thread::sleep((deadline - now).min(POLL_INTERVAL));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MAX_CHANNELS;
    use crate::controller::ControllerOptions;
    use crate::servo::SimServo;
    use std::sync::Arc;

    const WAIT: Duration = Duration::from_secs(5);

    #[test]
    fn test_sequence_submits_in_order() {
        let sim = SimServo::new();
        let ctrl = MotionController::init(sim.clone()).unwrap();

        let steps = [
            MotionStep::single(0, 90.0, 0),
            MotionStep::group(&[1, 2], &[45.0, 135.0], 40),
            MotionStep::single(3, 10.0, 0),
        ];
        assert_eq!(ctrl.run_sequence(&steps).unwrap(), vec![0, 1, 2]);
        assert!(ctrl.wait_idle(WAIT));

        assert_eq!(sim.position(0), Some(90.0));
        assert_eq!(sim.position(2), Some(135.0));
        assert_eq!(sim.position(3), Some(10.0));
        assert_eq!(sim.writes_for(1).len(), 3);
    }

    #[test]
    fn test_post_delay_paces_submission() {
        let sim = SimServo::new();
        let ctrl = MotionController::init(sim.clone()).unwrap();

        let steps = [
            MotionStep::single(0, 90.0, 0).then_wait(100),
            MotionStep::single(1, 90.0, 0),
        ];
        let started = Instant::now();
        ctrl.run_sequence(&steps).unwrap();
        assert!(started.elapsed() >= Duration::from_millis(100));
        assert!(ctrl.wait_idle(WAIT));

        // The second step cannot start before it was submitted
        let first = sim.writes_for(0)[0].at;
        let second = sim.writes_for(1)[0].at;
        assert!(second.duration_since(first) >= Duration::from_millis(100));
    }

    #[test]
    fn test_failing_step_stops_sequence() {
        let sim = SimServo::new();
        let ctrl = MotionController::init(sim.clone()).unwrap();

        let too_many: Vec<Channel> = (0..=MAX_CHANNELS as u8).collect();
        let steps = [
            MotionStep::single(0, 90.0, 0),
            MotionStep::group(&too_many, &vec![0.0; too_many.len()], 100),
            MotionStep::single(1, 90.0, 0),
        ];
        assert!(matches!(
            ctrl.run_sequence(&steps),
            Err(MotionError::InvalidArgument(_))
        ));
        assert!(ctrl.wait_idle(WAIT));

        assert_eq!(ctrl.peek_next_id(), 1);
        assert!(sim.writes_for(1).is_empty());
    }

    #[test]
    fn test_single_step_without_channel_rejected() {
        let ctrl = MotionController::init(SimServo::new()).unwrap();
        let step = MotionStep {
            kind: MotionKind::Single,
            channels: vec![],
            angles: vec![],
            duration_ms: 100,
            delay_after_ms: 0,
        };
        assert!(ctrl.submit_step(&step).is_err());
        assert_eq!(ctrl.peek_next_id(), 0);
    }

    #[test]
    fn test_stop_all_ends_sequence_during_post_delay() {
        let sim = SimServo::new();
        let ctrl = Arc::new(MotionController::init(sim.clone()).unwrap());

        let steps = vec![
            MotionStep::single(0, 90.0, 0).then_wait(300),
            MotionStep::single(1, 90.0, 0).then_wait(300),
            MotionStep::single(2, 90.0, 0),
        ];
        let runner = {
            let ctrl = ctrl.clone();
            thread::spawn(move || ctrl.run_sequence(&steps))
        };
        thread::sleep(Duration::from_millis(100));

        let stopped = Instant::now();
        ctrl.stop_all();
        assert!(matches!(runner.join().unwrap(), Err(MotionError::Stopped)));
        assert!(stopped.elapsed() < Duration::from_millis(200));
        assert!(ctrl.wait_idle(WAIT));

        assert_eq!(ctrl.peek_next_id(), 1);
        assert_eq!(ctrl.pending(), 0);
        assert_eq!(sim.position(0), Some(90.0));
        assert!(sim.writes_for(1).is_empty());
        assert!(sim.writes_for(2).is_empty());
    }

    #[test]
    fn test_stop_all_releases_sequence_blocked_on_full_queue() {
        let sim = SimServo::new();
        let options = ControllerOptions {
            queue_capacity: 1,
            ..ControllerOptions::default()
        };
        let ctrl = Arc::new(MotionController::with_options(sim.clone(), options).unwrap());

        ctrl.submit_single(0, 90.0, 300).unwrap();
        thread::sleep(Duration::from_millis(30));
        let runner = {
            let ctrl = ctrl.clone();
            thread::spawn(move || {
                ctrl.run_sequence(&[MotionStep::single(1, 90.0, 0), MotionStep::single(2, 90.0, 0)])
            })
        };
        // Step 1 fills the slot, step 2 blocks behind it
        thread::sleep(Duration::from_millis(50));
        assert_eq!(ctrl.pending(), 1);

        ctrl.stop_all();
        assert!(matches!(runner.join().unwrap(), Err(MotionError::Stopped)));
        assert!(ctrl.wait_idle(WAIT));

        assert!(sim.writes_for(1).is_empty());
        assert!(sim.writes_for(2).is_empty());
        assert_eq!(ctrl.last_completed(), Some(0));
    }
}
