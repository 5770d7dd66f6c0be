// Motion controller: owns the command queue and the worker thread
//
// Producers (API callers, sequence runner, document interpreter) push commands
// into a bounded queue; the worker thread executes them strictly in order.
// The queue is the only handoff between the two sides.

use crossbeam_channel::{Receiver, SendTimeoutError, Sender, TrySendError};
use std::sync::atomic::{AtomicU16, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::{MAX_CHANNELS, POLL_INTERVAL, QUEUE_CAPACITY};
use crate::error::{MotionError, Result};
use crate::motion::worker::{self, WorkerStatus};
use crate::motion::{
    Easing, GroupMotion, Motion, MotionCommand, MotionExecutor, MotionId, SingleMotion,
};
use crate::servo::{Channel, ServoDriver};

/// How `enqueue` behaves when the queue is full
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SendMode {
    Blocking,
    NonBlocking,
    /// Block, but give up once `stop_all` has run since `generation`
    UntilStopped { generation: u64 },
}

/// Tunables for a controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerOptions {
    /// Commands held before `submit_*` blocks
    pub queue_capacity: usize,
    pub easing: Easing,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            queue_capacity: QUEUE_CAPACITY,
            easing: Easing::default(),
        }
    }
}

pub struct MotionController {
    queue: Option<Sender<MotionCommand>>,
    // Second handle on the queue, used only to discard pending commands
    drain: Receiver<MotionCommand>,
    worker: Option<JoinHandle<()>>,
    status: Arc<WorkerStatus>,
    // Serializes sends so ids enter the queue in order
    submit: Mutex<()>,
    next_id: AtomicU16,
    submitted: AtomicU64,
    discarded: AtomicU64,
}

impl MotionController {
    /// Create the queue and start the worker with default options
    pub fn init<D: ServoDriver + 'static>(driver: D) -> Result<Self> {
        Self::with_options(driver, ControllerOptions::default())
    }

    pub fn with_options<D: ServoDriver + 'static>(
        driver: D,
        options: ControllerOptions,
    ) -> Result<Self> {
        if options.queue_capacity == 0 {
            return Err(MotionError::InvalidArgument(
                "queue capacity must be at least 1".to_string(),
            ));
        }

        let (queue, commands) = crossbeam_channel::bounded(options.queue_capacity);
        let status = Arc::new(WorkerStatus::default());
        let executor = MotionExecutor::new(driver, options.easing);
        let worker = worker::spawn(commands.clone(), executor, status.clone())
            .map_err(MotionError::ResourceExhausted)?;

        info!(
            "Motion controller started: queue capacity {}, {:?} easing",
            options.queue_capacity, options.easing
        );

        Ok(Self {
            queue: Some(queue),
            drain: commands,
            worker: Some(worker),
            status,
            submit: Mutex::new(()),
            next_id: AtomicU16::new(0),
            submitted: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
        })
    }

    /// Queue a move of one channel from its current position.
    /// Blocks while the queue is full.
    pub fn submit_single(
        &self,
        channel: Channel,
        target_angle: f32,
        duration_ms: u32,
    ) -> Result<MotionId> {
        self.enqueue(single(channel, target_angle, duration_ms), SendMode::Blocking)
    }

    /// Queue a lockstep move of several channels. Start angles are always
    /// resolved from current positions at dispatch. Blocks while the queue
    /// is full.
    pub fn submit_group(
        &self,
        channels: &[Channel],
        target_angles: &[f32],
        duration_ms: u32,
    ) -> Result<MotionId> {
        self.enqueue(group(channels, target_angles, duration_ms)?, SendMode::Blocking)
    }

    /// Like `submit_single`, but fails with `QueueFull` instead of blocking
    pub fn try_submit_single(
        &self,
        channel: Channel,
        target_angle: f32,
        duration_ms: u32,
    ) -> Result<MotionId> {
        self.enqueue(single(channel, target_angle, duration_ms), SendMode::NonBlocking)
    }

    /// Like `submit_group`, but fails with `QueueFull` instead of blocking
    pub fn try_submit_group(
        &self,
        channels: &[Channel],
        target_angles: &[f32],
        duration_ms: u32,
    ) -> Result<MotionId> {
        self.enqueue(group(channels, target_angles, duration_ms)?, SendMode::NonBlocking)
    }

    pub(crate) fn enqueue(&self, motion: Motion, mode: SendMode) -> Result<MotionId> {
        let queue = self.queue.as_ref().ok_or(MotionError::Closed)?;

        // Readers of next_id never take this lock
        let _order = self.submit.lock().unwrap_or_else(PoisonError::into_inner);
        let id = self.next_id.load(Ordering::Acquire);
        let generation = match mode {
            SendMode::UntilStopped { generation } => generation,
            _ => self.generation(),
        };
        let command = MotionCommand {
            id,
            motion,
            generation,
        };

        match mode {
            SendMode::Blocking => queue.send(command).map_err(|_| MotionError::Closed)?,
            SendMode::NonBlocking => queue.try_send(command).map_err(|e| match e {
                TrySendError::Full(_) => MotionError::QueueFull,
                TrySendError::Disconnected(_) => MotionError::Closed,
            })?,
            SendMode::UntilStopped { generation } => {
                self.send_until_stopped(queue, command, generation)?
            }
        }

        self.next_id.store(id.wrapping_add(1), Ordering::Release);
        self.submitted.fetch_add(1, Ordering::AcqRel);
        if let SendMode::UntilStopped { generation } = mode {
            // Sent into a slot freed by stop_all; the worker will drop it
            self.check_generation(generation)?;
        }
        debug!("Queued motion ID: {} ({} pending)", id, self.drain.len());
        Ok(id)
    }

    fn send_until_stopped(
        &self,
        queue: &Sender<MotionCommand>,
        mut command: MotionCommand,
        generation: u64,
    ) -> Result<()> {
        loop {
            self.check_generation(generation)?;
            match queue.send_timeout(command, POLL_INTERVAL) {
                Ok(()) => return Ok(()),
                Err(SendTimeoutError::Timeout(returned)) => command = returned,
                Err(SendTimeoutError::Disconnected(_)) => return Err(MotionError::Closed),
            }
        }
    }

    /// Discard every queued command and clear the busy flag.
    /// A motion already executing runs to completion. Submissions still
    /// blocked on a full queue are cancelled too, and sequences or documents
    /// being submitted stop at their next step. Returns how many commands
    /// were discarded from the queue.
    pub fn stop_all(&self) -> usize {
        self.status.advance_generation();
        let discarded = self.drain.try_iter().count();
        self.discarded.fetch_add(discarded as u64, Ordering::AcqRel);
        self.status.clear_busy();
        info!("Stopped all motions: {} pending discarded", discarded);
        discarded
    }

    /// Number of `stop_all` calls so far
    pub(crate) fn generation(&self) -> u64 {
        self.status.generation()
    }

    /// Fails with `Stopped` if `stop_all` ran since `generation`
    pub(crate) fn check_generation(&self, generation: u64) -> Result<()> {
        if self.generation() == generation {
            Ok(())
        } else {
            Err(MotionError::Stopped)
        }
    }

    /// True while the worker is executing a motion (cleared early by `stop_all`)
    pub fn is_busy(&self) -> bool {
        self.status.is_busy()
    }

    pub fn active_motion(&self) -> Option<MotionId> {
        self.status.active()
    }

    pub fn last_completed(&self) -> Option<MotionId> {
        self.status.last_completed()
    }

    /// Commands waiting in the queue
    pub fn pending(&self) -> usize {
        self.drain.len()
    }

    /// Id the next successful submission will get
    pub fn peek_next_id(&self) -> MotionId {
        self.next_id.load(Ordering::Acquire)
    }

    pub fn is_destroyed(&self) -> bool {
        self.worker.is_none()
    }

    /// Block until everything submitted so far has run or been discarded.
    /// Returns false if `timeout` elapsed first.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        loop {
            let settled = self.status.processed() + self.discarded.load(Ordering::Acquire);
            if settled >= self.submitted.load(Ordering::Acquire) {
                return true;
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return false;
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    /// Cancel pending work, stop the worker, then release the queue.
    /// Waits for a motion in flight to finish. Safe to call repeatedly.
    pub fn destroy(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };

        self.stop_all();
        // Dropping the only sender ends the worker's receive loop
        self.queue = None;
        if worker.join().is_err() {
            warn!("Motion worker panicked before shutdown");
        }

        self.next_id.store(0, Ordering::Release);
        info!("Motion controller destroyed");
    }
}

impl Drop for MotionController {
    fn drop(&mut self) {
        self.destroy();
    }
}

pub(crate) fn single(channel: Channel, target_angle: f32, duration_ms: u32) -> Motion {
    Motion::Single(SingleMotion {
        channel,
        start_angle: None,
        target_angle,
        duration_ms,
    })
}

pub(crate) fn group(
    channels: &[Channel],
    target_angles: &[f32],
    duration_ms: u32,
) -> Result<Motion> {
    if channels.len() > MAX_CHANNELS {
        return Err(MotionError::too_many_channels(channels.len()));
    }
    if channels.is_empty() {
        return Err(MotionError::InvalidArgument(
            "group motion needs at least one channel".to_string(),
        ));
    }
    if channels.len() != target_angles.len() {
        return Err(MotionError::InvalidArgument(format!(
            "{} channels but {} target angles",
            channels.len(),
            target_angles.len()
        )));
    }

    Ok(Motion::Group(GroupMotion {
        channels: channels.to_vec(),
        start_angles: vec![None; channels.len()],
        target_angles: target_angles.to_vec(),
        duration_ms,
    }))
}
