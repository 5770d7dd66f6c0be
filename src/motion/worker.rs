// Motion worker: the single consumer of the command queue
//
// Idle -> (command dequeued) -> Busy -> (motion finished) -> Idle, until every
// sender is dropped and the queue is empty.

use crossbeam_channel::Receiver;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

use super::command::{MotionCommand, MotionId};
use super::executor::MotionExecutor;
use crate::servo::ServoDriver;

#[derive(Debug, Default, Clone, Copy)]
struct Activity {
    active: Option<MotionId>,
    last_completed: Option<MotionId>,
    completed: u64,
    processed: u64,
}

/// Worker state observable from the controller
#[derive(Debug, Default)]
pub struct WorkerStatus {
    busy: AtomicBool,
    generation: AtomicU64,
    activity: Mutex<Activity>,
}

impl WorkerStatus {
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Clear the busy flag without touching the motion in flight
    pub fn clear_busy(&self) {
        self.busy.store(false, Ordering::Release);
    }

    /// Number of stop-all requests so far
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Start a new generation: commands submitted before now will not run
    pub fn advance_generation(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Motion the worker is executing right now
    pub fn active(&self) -> Option<MotionId> {
        self.activity().active
    }

    pub fn last_completed(&self) -> Option<MotionId> {
        self.activity().last_completed
    }

    /// Motions run to completion since the worker started
    pub fn completed(&self) -> u64 {
        self.activity().completed
    }

    /// Commands taken off the queue, whether executed or skipped
    pub fn processed(&self) -> u64 {
        self.activity().processed
    }

    fn begin(&self, id: MotionId) {
        self.activity().active = Some(id);
        self.busy.store(true, Ordering::Release);
    }

    fn discard(&self) {
        self.activity().processed += 1;
    }

    fn finish(&self, id: MotionId, ran: bool) {
        {
            let mut activity = self.activity();
            activity.active = None;
            activity.processed += 1;
            if ran {
                activity.last_completed = Some(id);
                activity.completed += 1;
            }
        }
        self.busy.store(false, Ordering::Release);
    }

    fn activity(&self) -> MutexGuard<'_, Activity> {
        self.activity.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Start the worker thread
pub fn spawn<D>(
    queue: Receiver<MotionCommand>,
    executor: MotionExecutor<D>,
    status: Arc<WorkerStatus>,
) -> io::Result<JoinHandle<()>>
where
    D: ServoDriver + 'static,
{
    thread::Builder::new()
        .name("motion_worker".to_string())
        .spawn(move || run(queue, executor, &status))
}

fn run<D: ServoDriver>(
    queue: Receiver<MotionCommand>,
    mut executor: MotionExecutor<D>,
    status: &WorkerStatus,
) {
    debug!("Motion worker started");

    while let Ok(command) = queue.recv() {
        // Landed in the queue after a stop-all that should have cancelled it
        if command.generation != status.generation() {
            debug!("Dropping motion ID: {} submitted before stop-all", command.id);
            status.discard();
            continue;
        }
        status.begin(command.id);

        // A malformed payload is skipped, never fatal to the loop
        let ran = match command.motion.validate() {
            Ok(()) => {
                info!(
                    "Executing {} motion ID: {} ({} ms)",
                    command.kind(),
                    command.id,
                    command.motion.duration_ms()
                );
                executor.execute(&command.motion);
                info!("Motion ID: {} completed", command.id);
                true
            }
            Err(e) => {
                warn!("Skipping motion ID: {}: {}", command.id, e);
                false
            }
        };

        status.finish(command.id, ran);
    }

    debug!("Motion worker stopped: command queue closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motion::command::{GroupMotion, Motion, SingleMotion};
    use crate::motion::easing::Easing;
    use crate::servo::SimServo;

    fn single(id: MotionId, channel: u8) -> MotionCommand {
        MotionCommand {
            id,
            motion: Motion::Single(SingleMotion {
                channel,
                start_angle: None,
                target_angle: 45.0,
                duration_ms: 0,
            }),
            generation: 0,
        }
    }

    #[test]
    fn test_worker_skips_malformed_and_keeps_running() {
        let sim = SimServo::new();
        let status = Arc::new(WorkerStatus::default());
        let (tx, rx) = crossbeam_channel::bounded(4);

        tx.send(single(0, 1)).unwrap();
        tx.send(MotionCommand {
            id: 1,
            motion: Motion::Group(GroupMotion {
                channels: vec![2, 3],
                start_angles: vec![None],
                target_angles: vec![10.0],
                duration_ms: 0,
            }),
            generation: 0,
        })
        .unwrap();
        tx.send(single(2, 4)).unwrap();
        drop(tx);

        let executor = MotionExecutor::new(sim.clone(), Easing::default());
        let handle = spawn(rx, executor, status.clone()).unwrap();
        handle.join().unwrap();

        let channels: Vec<u8> = sim.writes().iter().map(|w| w.channel).collect();
        assert_eq!(channels, vec![1, 1, 4, 4]);
        assert_eq!(status.completed(), 2);
        assert_eq!(status.processed(), 3);
        assert_eq!(status.last_completed(), Some(2));
        assert_eq!(status.active(), None);
        assert!(!status.is_busy());
    }

    #[test]
    fn test_worker_drops_commands_from_earlier_generation() {
        let sim = SimServo::new();
        let status = Arc::new(WorkerStatus::default());
        let (tx, rx) = crossbeam_channel::bounded(4);

        tx.send(single(0, 1)).unwrap();
        status.advance_generation();
        tx.send(MotionCommand {
            generation: 1,
            ..single(1, 2)
        })
        .unwrap();
        drop(tx);

        let executor = MotionExecutor::new(sim.clone(), Easing::default());
        spawn(rx, executor, status.clone()).unwrap().join().unwrap();

        assert!(sim.writes_for(1).is_empty());
        assert_eq!(sim.writes_for(2).len(), 2);
        assert_eq!(status.processed(), 2);
        assert_eq!(status.completed(), 1);
        assert_eq!(status.last_completed(), Some(1));
    }
}
