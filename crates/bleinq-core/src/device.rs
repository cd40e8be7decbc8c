//! GATT transport over a btleplug peripheral.
//!
//! btleplug operations are awaited to completion, so [`GattTransport`] runs
//! each one on its own task and reports the result as a
//! [`TransportEvent`]. The caller pumps those events into the connection's
//! responder (see [`crate::events`]).

use std::future::Future;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use btleplug::api::{CentralEvent, CharPropFlags, Central as _, Peripheral as _};
use btleplug::platform::{Adapter, Peripheral};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use bleinq_types::CharacteristicValue;

use crate::connection::RequestId;
use crate::error::Result;
use crate::events::{EventSender, TransportEvent};
use crate::outcome::Outcome;
use crate::status;
use crate::traits::{ReadSlot, Transport};
use crate::util::{create_identifier, format_peripheral_id, lock};

/// Reason reported when the peripheral drops the link on its own.
pub const LINK_LOST: &str = "link lost";

/// A btleplug peripheral driven through the [`Transport`] capability.
///
/// # Cleanup
///
/// Dropping the transport aborts its in-flight operations and the link
/// watcher, which closes the event channel once no other sender is left.
pub struct GattTransport {
    peripheral: Peripheral,
    name: Option<String>,
    identifier: String,
    events: EventSender,
    value: Arc<ReadSlot>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for GattTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GattTransport")
            .field("name", &self.name)
            .field("identifier", &self.identifier)
            .finish_non_exhaustive()
    }
}

impl GattTransport {
    /// Wrap `peripheral`, reporting completions through `events`.
    pub async fn new(peripheral: Peripheral, events: EventSender) -> Result<Self> {
        let properties = peripheral.properties().await?;
        let name = properties.as_ref().and_then(|p| p.local_name.clone());
        // On macOS the address is hidden, so the peripheral ID stands in.
        let identifier = properties
            .as_ref()
            .map(|p| create_identifier(&p.address.to_string(), &peripheral.id()))
            .unwrap_or_else(|| format_peripheral_id(&peripheral.id()));

        Ok(Self {
            peripheral,
            name,
            identifier,
            events,
            value: Arc::default(),
            tasks: Mutex::default(),
            watcher: Mutex::default(),
        })
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Address, or peripheral ID where the address is hidden.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn peripheral(&self) -> &Peripheral {
        &self.peripheral
    }

    /// Report link loss seen by `adapter` as a disconnection.
    pub async fn watch_link(&self, adapter: &Adapter) -> Result<()> {
        let mut events = adapter.events().await?;
        let id = self.peripheral.id();
        let sender = self.events.clone();
        let handle = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if let CentralEvent::DeviceDisconnected(other) = event
                    && other == id
                {
                    debug!("Peripheral {} disconnected", format_peripheral_id(&id));
                    if sender
                        .send(TransportEvent::Disconnected {
                            reason: Outcome::failed(LINK_LOST),
                        })
                        .is_err()
                    {
                        break;
                    }
                }
            }
        });
        if let Some(previous) = lock(&self.watcher).replace(handle) {
            previous.abort();
        }
        Ok(())
    }

    /// Run one btleplug operation on its own task and report its event.
    fn spawn_operation<F>(&self, operation: &'static str, future: F)
    where
        F: Future<Output = TransportEvent> + Send + 'static,
    {
        let events = self.events.clone();
        let handle = tokio::spawn(async move {
            let event = future.await;
            trace!(operation, ?event, "Operation completed");
            if events.send(event).is_err() {
                debug!(operation, "Event channel closed; dropping completion");
            }
        });
        let mut tasks = lock(&self.tasks);
        tasks.retain(|task| !task.is_finished());
        tasks.push(handle);
    }
}

#[async_trait]
impl Transport for GattTransport {
    async fn initiate_connect(&self, request: RequestId) -> Outcome {
        info!("Connecting to {}...", self.description());
        let peripheral = self.peripheral.clone();
        self.spawn_operation("connect", async move {
            match peripheral.connect().await {
                Ok(()) => TransportEvent::Connected { request },
                Err(e) => {
                    warn!("Connection failed: {}", e);
                    TransportEvent::Disconnected {
                        reason: Outcome::failed(format!("{}: {}", status::CONNECTION_FAILED, e)),
                    }
                }
            }
        });
        Outcome::Success
    }

    async fn initiate_disconnect(&self, request: RequestId) -> Outcome {
        info!("Disconnecting from {}...", self.description());
        let peripheral = self.peripheral.clone();
        self.spawn_operation("disconnect", async move {
            match peripheral.disconnect().await {
                Ok(()) => TransportEvent::Disconnected {
                    reason: Outcome::Success,
                },
                Err(e) => TransportEvent::OperationFailed {
                    request,
                    reason: Outcome::failed(e.to_string()),
                },
            }
        });
        Outcome::Success
    }

    async fn initiate_discovery(&self, request: RequestId) -> Outcome {
        let peripheral = self.peripheral.clone();
        self.spawn_operation("discover", async move {
            match peripheral.discover_services().await {
                Ok(()) => {
                    debug!("Found {} services", peripheral.services().len());
                    TransportEvent::ServicesDiscovered { request }
                }
                Err(e) => TransportEvent::DiscoveryFailed {
                    request,
                    reason: Outcome::failed(format!("{}: {}", status::DISCOVERY_FAILED, e)),
                },
            }
        });
        Outcome::Success
    }

    async fn initiate_read(
        &self,
        request: RequestId,
        service: Uuid,
        characteristic: Uuid,
    ) -> Outcome {
        self.value.begin(request, service, characteristic);
        let services = self.peripheral.services();
        let Some(found) = services.iter().find(|s| s.uuid == service) else {
            return status::service_not_available(&service);
        };
        let Some(target) = found
            .characteristics
            .iter()
            .find(|c| c.uuid == characteristic)
            .cloned()
        else {
            return status::characteristic_not_available(&characteristic);
        };
        if !target.properties.contains(CharPropFlags::READ) {
            return status::characteristic_not_readable(&characteristic);
        }

        let peripheral = self.peripheral.clone();
        let slot = Arc::clone(&self.value);
        self.spawn_operation("read", async move {
            match peripheral.read(&target).await {
                Ok(bytes) => {
                    if !slot.fill(request, CharacteristicValue::new(bytes)) {
                        debug!(%request, "Read superseded; discarding value");
                    }
                    TransportEvent::ReadSucceeded { request }
                }
                Err(e) => TransportEvent::ReadFailed {
                    request,
                    reason: Outcome::failed(e.to_string()),
                },
            }
        });
        Outcome::Success
    }

    fn characteristic_value(
        &self,
        service: Uuid,
        characteristic: Uuid,
    ) -> Option<CharacteristicValue> {
        self.value.value(service, characteristic)
    }

    async fn close(&self) {
        let mut tasks = lock(&self.tasks);
        debug!("Aborting {} pending operation(s)", tasks.len());
        for task in tasks.drain(..) {
            task.abort();
        }
    }

    fn description(&self) -> String {
        match &self.name {
            Some(name) => format!("{} ({})", self.identifier, name),
            None => self.identifier.clone(),
        }
    }
}

impl Drop for GattTransport {
    fn drop(&mut self) {
        for task in lock(&self.tasks).drain(..) {
            task.abort();
        }
        if let Some(watcher) = lock(&self.watcher).take() {
            watcher.abort();
        }
    }
}
