use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use servo_motion_runtime::config::{SERVO_ENABLED, SERVO_PORT};
use servo_motion_runtime::servo::{FeetechServo, ServoDriver, SimServo};
use servo_motion_runtime::{MotionController, runtime};

/// Servo motion sequencer
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Serial port of the servo bus
    #[arg(long, default_value = SERVO_PORT)]
    port: String,

    /// Servo IDs on the bus (comma separated)
    #[arg(long, value_delimiter = ',', default_value = "1,2,3,4")]
    ids: Vec<u8>,

    /// Drive a simulated servo bank instead of hardware
    #[arg(long)]
    sim: bool,

    /// Run one motion document file and exit instead of serving over Zenoh
    #[arg(long)]
    document: Option<PathBuf>,
}

type BoxError = Box<dyn std::error::Error + Send + Sync>;

fn open_driver(args: &Args) -> Result<Box<dyn ServoDriver>, BoxError> {
    if args.sim || !SERVO_ENABLED {
        info!("Using simulated servos");
        Ok(Box::new(SimServo::new()))
    } else {
        Ok(Box::new(FeetechServo::open(&args.port, &args.ids)?))
    }
}

async fn run(args: Args) -> Result<(), BoxError> {
    let controller = MotionController::init(open_driver(&args)?)?;

    match args.document {
        Some(path) => {
            let text = tokio::fs::read_to_string(&path).await?;
            // Post-delays and queue backpressure block the submitting thread
            tokio::task::spawn_blocking(move || -> Result<(), BoxError> {
                let ids = controller.exec_document(&text)?;
                info!("Queued {} motions from {}", ids.len(), path.display());
                if !controller.wait_idle(Duration::MAX) {
                    warn!("Gave up waiting for motions to finish");
                }
                Ok(())
            })
            .await?
        }
        None => runtime::run(Arc::new(controller)).await,
    }
}

#[tokio::main]
async fn main() {
    // Setup logging (set RUST_LOG=info or debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(e) = run(Args::parse()).await {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}
