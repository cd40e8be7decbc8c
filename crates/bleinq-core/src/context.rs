//! Explicitly owned Bluetooth context.
//!
//! A [`BleContext`] holds the adapter every other btleplug-backed component
//! is built from. Create one per process (or per adapter) and pass it down;
//! nothing in this crate keeps a global adapter.

use std::time::Duration;

use btleplug::api::{Central as _, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use bleinq_types::Timeout;

use crate::connection::ConnectionHandler;
use crate::device::GattTransport;
use crate::error::{Error, Result};
use crate::events::{event_channel, spawn_event_pump};
use crate::scan::ScanSession;
use crate::scanner::BtleScanner;
use crate::util::{format_peripheral_id, match_identifier};

/// How often known peripherals are re-checked while looking for one.
const LOOKUP_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Get the first available Bluetooth adapter.
pub async fn get_adapter() -> Result<Adapter> {
    let manager = Manager::new().await?;
    let adapters = manager.adapters().await?;

    adapters.into_iter().next().ok_or(Error::NoAdapter)
}

/// A peripheral opened for reading: its transport, the connection state
/// it reports into, and the task pumping its events.
#[derive(Debug)]
pub struct OpenedPeripheral {
    pub transport: GattTransport,
    pub handler: ConnectionHandler,
    pub pump: JoinHandle<()>,
}

/// The Bluetooth adapter and everything built from it.
#[derive(Debug, Clone)]
pub struct BleContext {
    adapter: Adapter,
}

impl BleContext {
    /// Use the first available adapter.
    pub async fn new() -> Result<Self> {
        Ok(Self::from_adapter(get_adapter().await?))
    }

    pub fn from_adapter(adapter: Adapter) -> Self {
        Self { adapter }
    }

    pub fn adapter(&self) -> &Adapter {
        &self.adapter
    }

    /// A scan session over this adapter.
    pub fn scan_session(&self) -> ScanSession<BtleScanner> {
        ScanSession::new(BtleScanner::new(self.adapter.clone()))
    }

    /// Find a peripheral by ID, address or name.
    ///
    /// Peripherals already known to the adapter are checked first; otherwise
    /// the adapter scans for up to `scan_timeout`.
    #[tracing::instrument(level = "info", skip_all, fields(identifier = %identifier, scan_timeout = %scan_timeout))]
    pub async fn find_peripheral(&self, identifier: &str, scan_timeout: Timeout) -> Result<Peripheral> {
        if let Some(peripheral) = self.find_known_peripheral(identifier).await? {
            info!("Found device in cache (no scan needed)");
            return Ok(peripheral);
        }

        self.adapter.start_scan(ScanFilter::default()).await?;
        let started = Instant::now();
        let found = loop {
            if let Some(peripheral) = self.find_known_peripheral(identifier).await? {
                break Some(peripheral);
            }
            if scan_timeout.remaining_after(started.elapsed()).is_zero() {
                break None;
            }
            sleep(LOOKUP_POLL_INTERVAL.min(scan_timeout.as_duration())).await;
        };
        if let Err(e) = self.adapter.stop_scan().await {
            warn!("Failed to stop scan: {}", e);
        }

        found.ok_or_else(|| Error::device_not_found(identifier))
    }

    /// Search the peripherals the adapter already knows about.
    async fn find_known_peripheral(&self, identifier: &str) -> Result<Option<Peripheral>> {
        for peripheral in self.adapter.peripherals().await? {
            let Ok(Some(properties)) = peripheral.properties().await else {
                continue;
            };
            let peripheral_id = format_peripheral_id(&peripheral.id());
            let address = properties.address.to_string();
            if let Some(matched) = match_identifier(
                identifier,
                &peripheral_id,
                &address,
                properties.local_name.as_deref(),
            ) {
                debug!("Matched {} by {:?}", peripheral_id, matched);
                return Ok(Some(peripheral));
            }
        }
        Ok(None)
    }

    /// Find a peripheral and wire it to a fresh connection handler.
    ///
    /// Transport completions flow through an event channel into the
    /// handler's responder; link loss is reported as a disconnection.
    pub async fn open(&self, identifier: &str, scan_timeout: Timeout) -> Result<OpenedPeripheral> {
        let peripheral = self.find_peripheral(identifier, scan_timeout).await?;
        let handler = ConnectionHandler::new();
        let (sender, receiver) = event_channel();
        let pump = spawn_event_pump(receiver, handler.responder());

        let transport = GattTransport::new(peripheral, sender).await?;
        transport.watch_link(&self.adapter).await?;

        Ok(OpenedPeripheral {
            transport,
            handler,
            pump,
        })
    }
}
