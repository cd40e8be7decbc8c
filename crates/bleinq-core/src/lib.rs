//! Core BLE library for inquiring nearby peripherals.
//!
//! This crate drives a single GATT client connection through an explicit
//! state machine and builds the user-facing flows on top of it.
//!
//! # Features
//!
//! - **Connection state machine**: connect, discover, read and disconnect
//!   with one operation in flight and a deadline on every wait
//! - **Scan sessions**: time-bounded scans that stop on timeout, radio
//!   failure or user request
//! - **Characteristic reader**: the full connect/discover/read/disconnect
//!   sequence under one budget, with cleanup that always runs
//! - **Device registry**: sensor readings and custom names keyed by address
//! - **Mock transport and scanner** for tests without a radio
//!
//! # Architecture
//!
//! The radio is reached through the [`Transport`] and [`Scanner`] traits.
//! Completions flow from the transport into a [`Responder`] (directly or via
//! a [`TransportEvent`] channel), which wakes the [`Requester`] waiting on
//! that operation.
//!
//! # Quick Start
//!
//! ```no_run
//! use bleinq_core::{BleContext, CharacteristicReader, DEFAULT_BATTERY_READ_TIMEOUT};
//! use bleinq_core::bleinq_types::Timeout;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let context = BleContext::new().await?;
//!     let opened = context.open("MJ_HT_V1", Timeout::secs(10)).await?;
//!
//!     let reader = CharacteristicReader::new(Arc::new(opened.transport), opened.handler);
//!     let (level, status) = reader
//!         .read_battery_level(DEFAULT_BATTERY_READ_TIMEOUT, |report| println!("{report}"))
//!         .await;
//!     println!("battery: {level:?} ({status})");
//!     Ok(())
//! }
//! ```

pub mod connection;
pub mod context;
pub mod device;
pub mod error;
pub mod events;
pub mod guard;
pub mod mock;
pub mod outcome;
pub mod reader;
pub mod registry;
pub mod scan;
pub mod scanner;
pub mod status;
pub mod traits;
pub mod util;

pub use bleinq_types;

// Core exports
pub use connection::{
    ConnectionHandler, ConnectionState, DiscoveryState, MachineState, ReadingState, RequestId,
    Requester, Responder,
};
pub use error::{Error, Result};
pub use guard::{CurrentOperation, OperationGuard, OperationTicket};
pub use outcome::Outcome;
pub use traits::{ReadSlot, Scanner, Transport};

pub use context::{BleContext, OpenedPeripheral, get_adapter};
pub use device::GattTransport;
pub use events::{EventReceiver, EventSender, TransportEvent, event_channel, spawn_event_pump};
pub use mock::{MockScanner, MockTransport};
pub use reader::{
    CharacteristicReader, DEFAULT_BATTERY_READ_TIMEOUT, DEFAULT_CLEANUP_TIMEOUT, Deadline, Phase,
    PhaseReport, ReadReport, ReaderOptions,
};
pub use registry::{Change, DeviceRecord, DeviceRegistry};
pub use scan::{
    DEFAULT_SCAN_TIMEOUT, STOPPED_BY_USER, ScanCallback, ScanFailure, ScanOptions, ScanSession,
    ScanStopper,
};
pub use scanner::BtleScanner;
pub use util::{create_identifier, format_peripheral_id};
