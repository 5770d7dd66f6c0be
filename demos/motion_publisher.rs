// Motion publisher: send a motion document to a running servo runtime
//
// Usage: cargo run --example motion_publisher -- [document.json]
// Without a file, publishes a built-in wave over channels 1-4.
// Pass `stop` instead of a file to request stop-all.

use servo_motion_runtime::MotionStep;
use servo_motion_runtime::config::{TOPIC_CMD_MOTIONS, TOPIC_CMD_STOP, TOPIC_STATE_MOTION};
use servo_motion_runtime::document::to_document;
use servo_motion_runtime::messages::MotionStatus;
use std::time::Duration;
use tracing::{info, warn};

fn wave() -> Vec<MotionStep> {
    vec![
        MotionStep::group(&[1, 2, 3, 4], &[90.0, 90.0, 90.0, 90.0], 800).then_wait(200),
        MotionStep::single(1, 150.0, 400),
        MotionStep::single(2, 150.0, 400).then_wait(100),
        MotionStep::group(&[1, 2], &[30.0, 30.0], 600),
        MotionStep::group(&[3, 4], &[150.0, 30.0], 600).then_wait(300),
        MotionStep::group(&[1, 2, 3, 4], &[90.0, 90.0, 90.0, 90.0], 800),
    ]
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let arg = std::env::args().nth(1);

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;

    if arg.as_deref() == Some("stop") {
        let publisher = session.declare_publisher(TOPIC_CMD_STOP).await?;
        publisher.put("{}".to_string()).await?;
        info!("Stop requested");
        return Ok(());
    }

    let document = match arg {
        Some(path) => std::fs::read_to_string(&path)?,
        None => to_document(&wave()).to_string(),
    };

    let status = session.declare_subscriber(TOPIC_STATE_MOTION).await?;
    let publisher = session.declare_publisher(TOPIC_CMD_MOTIONS).await?;
    publisher.put(document).await?;
    info!("Published motion document to {}", TOPIC_CMD_MOTIONS);

    // Follow controller status for a few seconds
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        while let Ok(Some(sample)) = status.try_recv() {
            let payload = sample.payload().to_bytes();
            match serde_json::from_slice::<MotionStatus>(&payload) {
                Ok(s) => info!(
                    "{:?} active={:?} pending={} next_id={}",
                    s.state, s.active_motion, s.pending, s.next_id
                ),
                Err(e) => warn!("Failed to parse status: {}", e),
            }
        }
    }

    Ok(())
}
