//! Radio scanning over a btleplug adapter.

use std::sync::Mutex;

use async_trait::async_trait;
use btleplug::api::{Central as _, CentralEvent, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, PeripheralId};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use bleinq_types::Advertisement;

use crate::error::Result;
use crate::outcome::Outcome;
use crate::scan::{ScanCallback, ScanFailure};
use crate::traits::Scanner;
use crate::util::{create_identifier, lock};

/// Map a btleplug error to the scan failure it represents.
pub fn scan_failure(err: &btleplug::Error) -> ScanFailure {
    match err {
        btleplug::Error::PermissionDenied => ScanFailure::ApplicationRegistrationFailed,
        btleplug::Error::NotSupported(_) => ScanFailure::FeatureUnsupported,
        _ => ScanFailure::InternalError,
    }
}

/// Build an [`Advertisement`] from what the adapter knows about `id`.
async fn advertisement_for(adapter: &Adapter, id: &PeripheralId) -> Result<Option<Advertisement>> {
    let peripheral = adapter.peripheral(id).await?;
    let Some(properties) = peripheral.properties().await? else {
        return Ok(None);
    };

    let address = properties.address.to_string();
    let mut adv = Advertisement::new(address.clone()).identifier(create_identifier(&address, id));
    adv.name = properties.local_name;
    adv.rssi = properties.rssi;
    adv.service_data = properties.service_data;
    adv.services = properties.services;
    Ok(Some(adv))
}

/// [`Scanner`] over a btleplug adapter.
pub struct BtleScanner {
    adapter: Adapter,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for BtleScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BtleScanner").finish_non_exhaustive()
    }
}

impl BtleScanner {
    pub fn new(adapter: Adapter) -> Self {
        Self {
            adapter,
            task: Mutex::default(),
        }
    }

    pub fn adapter(&self) -> &Adapter {
        &self.adapter
    }
}

#[async_trait]
impl Scanner for BtleScanner {
    async fn start_scan(&self, callback: ScanCallback) -> Outcome {
        let mut events = match self.adapter.events().await {
            Ok(events) => events,
            Err(e) => return Outcome::failed(scan_failure(&e).to_string()),
        };
        if let Err(e) = self.adapter.start_scan(ScanFilter::default()).await {
            warn!("Failed to start scan: {}", e);
            return Outcome::failed(scan_failure(&e).to_string());
        }

        let adapter = self.adapter.clone();
        let handle = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                let id = match event {
                    CentralEvent::DeviceDiscovered(id)
                    | CentralEvent::DeviceUpdated(id)
                    | CentralEvent::ServiceDataAdvertisement { id, .. } => id,
                    _ => continue,
                };
                match advertisement_for(&adapter, &id).await {
                    Ok(Some(adv)) => callback.found(adv),
                    Ok(None) => {}
                    Err(e) => debug!("Skipping peripheral without properties: {}", e),
                }
            }
            callback.failed(ScanFailure::InternalError);
        });

        if let Some(previous) = lock(&self.task).replace(handle) {
            previous.abort();
        }
        Outcome::Success
    }

    async fn stop_scan(&self) {
        let task = lock(&self.task).take();
        if let Some(task) = task {
            task.abort();
        }
        if let Err(e) = self.adapter.stop_scan().await {
            warn!("Failed to stop scan: {}", e);
        }
    }
}
