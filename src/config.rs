// Timing, queue sizing, topics, servo configuration
use std::time::Duration;

// Trajectory sampling period (one servo write per channel per sample)
pub const SAMPLE_PERIOD_MS: u32 = 20;
pub const SAMPLE_PERIOD: Duration = Duration::from_millis(SAMPLE_PERIOD_MS as u64);

// Pending motion commands held before submitters block
pub const QUEUE_CAPACITY: usize = 10;

// How often blocked waiters (idle wait, post-delays, full queue) recheck for stop-all
pub const POLL_INTERVAL: Duration = Duration::from_millis(5);

// Channels in one group motion (LEDC channel count on the reference board)
pub const MAX_CHANNELS: usize = 8;

// Status publish rate for the zenoh runtime
pub const STATUS_HZ: u64 = 10;

// Zenoh topics
pub const TOPIC_CMD_MOTIONS: &str = "servo/cmd/motions"; // motion documents
pub const TOPIC_CMD_STOP: &str = "servo/cmd/stop"; // stop-all requests
pub const TOPIC_STATE_MOTION: &str = "servo/state/motion"; // controller status

// Serial port for the Feetech servo bus
pub const SERVO_PORT: &str = "/dev/ttyUSB0";

// Enable hardware servo control (set to false for simulation/testing)
pub const SERVO_ENABLED: bool = true;
