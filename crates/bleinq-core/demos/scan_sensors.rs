//! Example: Scanning for Xiaomi Sensors
//!
//! Scans for ten seconds (or until Ctrl-C) and prints every sensor heard,
//! with the latest values it advertised.
//!
//! Run with: `cargo run --example scan_sensors`

use std::sync::{Arc, Mutex};

use bleinq_core::bleinq_types::Timeout;
use bleinq_core::{BleContext, DeviceRegistry, ScanOptions};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let context = BleContext::new().await?;
    let session = context.scan_session();
    let registry = Arc::new(Mutex::new(DeviceRegistry::new()));

    let stopper = session.stopper();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            stopper.stop_by_user();
        }
    });

    println!("Scanning for sensors (Ctrl-C to stop)...");
    println!();

    let sink = Arc::clone(&registry);
    let options = ScanOptions::new()
        .timeout(Timeout::secs(10))
        .sensors_only(true);
    let error = session
        .scan_with_options(options, move |adv| {
            if let Ok(mut registry) = sink.lock() {
                registry.observe(&adv);
            }
        })
        .await;
    if let Some(error) = error {
        println!("Scan ended: {}", error);
    }

    let registry = registry.lock().map_err(|_| "registry poisoned")?;
    if registry.is_empty() {
        println!("No sensors found.");
        println!();
        println!("Make sure:");
        println!("  - Bluetooth is enabled on this computer");
        println!("  - The sensor is within range");
        return Ok(());
    }

    println!("Found {} sensor(s):", registry.len());
    println!();
    for record in registry.devices() {
        println!("  {}", record.display_name());
        println!("    Address:     {}", record.address);
        if let Some(t) = record.temperature {
            println!("    Temperature: {:.1} °C", t);
        }
        if let Some(h) = record.humidity {
            println!("    Humidity:    {:.1} %", h);
        }
        if let Some(b) = record.battery {
            println!("    Battery:     {} %", b);
        }
        if let Some(e) = &record.error {
            println!("    Error:       {}", e);
        }
    }

    Ok(())
}
