// Servo diagnostic: READ-ONLY check of a Feetech servo bus
//
// Pings each servo and prints its present position. Nothing is written,
// torque is left as it is.
//
// Usage: cargo run --example servo_diagnostic -- [port] [ids]
// Example: cargo run --example servo_diagnostic -- /dev/ttyUSB0 1,2,3,4

use servo_motion_runtime::config::SERVO_PORT;
use servo_motion_runtime::servo::FeetechBus;
use servo_motion_runtime::servo::feetech::{Register, steps_to_angle};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let port = args.next().unwrap_or_else(|| SERVO_PORT.to_string());
    let ids: Vec<u8> = match args.next() {
        Some(list) => list
            .split(',')
            .map(|id| id.trim().parse::<u8>())
            .collect::<Result<_, _>>()?,
        None => vec![1, 2, 3, 4],
    };

    println!("Serial port: {}", port);
    println!("Servo IDs:   {:?}", ids);
    println!();

    let mut bus = FeetechBus::open(&port)?;
    let mut missing = 0;

    for &id in &ids {
        match bus.ping(id) {
            Ok(true) => match bus.read_u16(id, Register::PresentPosition) {
                Ok(steps) => println!(
                    "  ✓ Servo {:>3}: position {:>4} steps ({:>6.1}°)",
                    id,
                    steps,
                    steps_to_angle(steps)
                ),
                Err(e) => println!("  ✗ Servo {:>3}: responds, position read failed: {}", id, e),
            },
            Ok(false) => {
                println!("  ✗ Servo {:>3}: no response", id);
                missing += 1;
            }
            Err(e) => {
                println!("  ✗ Servo {:>3}: error: {}", id, e);
                missing += 1;
            }
        }
    }

    println!();
    if missing == 0 {
        println!("All {} servos responding.", ids.len());
    } else {
        println!("{} of {} servos missing. Check wiring, power and IDs.", missing, ids.len());
    }
    Ok(())
}
