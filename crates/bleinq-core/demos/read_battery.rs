//! Example: Reading a Battery Level
//!
//! Finds a peripheral, then connects, discovers services, reads the
//! standard battery level characteristic and disconnects, printing each
//! phase as it completes.
//!
//! Run with: `cargo run --example read_battery -- <DEVICE_ADDRESS_OR_NAME>`

use std::env;
use std::sync::Arc;

use bleinq_core::bleinq_types::Timeout;
use bleinq_core::{BleContext, CharacteristicReader, DEFAULT_BATTERY_READ_TIMEOUT};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();
    let identifier = if args.len() > 1 {
        &args[1]
    } else {
        eprintln!("Usage: {} <DEVICE_ADDRESS_OR_NAME>", args[0]);
        eprintln!();
        eprintln!("Example:");
        eprintln!("  {} 58:2D:34:33:16:F6", args[0]);
        eprintln!("  {} MJ_HT_V1", args[0]);
        std::process::exit(1);
    };

    println!("Looking for {}...", identifier);
    let context = BleContext::new().await?;
    let opened = context.open(identifier, Timeout::secs(15)).await?;
    let reader = CharacteristicReader::new(Arc::new(opened.transport), opened.handler);

    let (level, status) = reader
        .read_battery_level(DEFAULT_BATTERY_READ_TIMEOUT, |report| {
            println!("  {}", report);
        })
        .await;

    println!();
    match level {
        Some(level) => println!("Battery: {} %", level),
        None => println!("Battery read failed: {}", status),
    }

    Ok(())
}
