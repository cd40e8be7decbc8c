//! Mock transport and scanner for testing.
//!
//! This module provides a [`MockTransport`] and a [`MockScanner`] that can be
//! used for unit testing without requiring actual BLE hardware.
//!
//! # Features
//!
//! - **Failure injection**: make any phase complete with a chosen outcome
//! - **Latency simulation**: deliver completions after a delay
//! - **Event routing**: apply completions directly, or through a transport
//!   event channel like a real adapter

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::debug;
use uuid::Uuid;

use bleinq_types::uuid::{BATTERY_LEVEL, BATTERY_SERVICE, XIAOMI_ROOT_SERVICE};
use bleinq_types::{Advertisement, CharacteristicValue};

use crate::connection::{ConnectionHandler, RequestId, Responder};
use crate::events::{EventSender, TransportEvent};
use crate::outcome::Outcome;
use crate::scan::{ScanCallback, ScanFailure};
use crate::status;
use crate::traits::{ReadSlot, Scanner, Transport};
use crate::util::{format_address, lock};

/// Where a mock delivers its completions.
#[derive(Debug, Clone)]
enum Sink {
    Responder(Responder),
    Channel(EventSender),
}

impl Sink {
    fn send(&self, event: TransportEvent) {
        match self {
            Sink::Responder(responder) => responder.apply(event),
            Sink::Channel(sender) => {
                if sender.send(event).is_err() {
                    debug!("Event channel closed; dropping mock completion");
                }
            }
        }
    }
}

/// A mock peripheral implementing [`Transport`].
///
/// # Example
///
/// ```
/// use std::sync::Arc;
///
/// use bleinq_core::{CharacteristicReader, MockTransport};
/// use bleinq_types::Timeout;
///
/// #[tokio::main]
/// async fn main() {
///     let transport = MockTransport::new().with_battery(72);
///     let handler = transport.handler().clone();
///     let reader = CharacteristicReader::new(Arc::new(transport), handler);
///
///     let (level, status) = reader.read_battery_level(Timeout::secs(5), |_| {}).await;
///     assert_eq!(level, Some(72));
///     assert_eq!(status, "Success");
/// }
/// ```
pub struct MockTransport {
    name: String,
    handler: ConnectionHandler,
    sink: Sink,
    values: HashMap<(Uuid, Uuid), Vec<u8>>,
    unreadable: HashSet<Uuid>,
    latency: Duration,
    responsive: bool,
    connect_rejection: Option<Outcome>,
    connect_failure: Option<Outcome>,
    discover_failure: Option<Outcome>,
    read_failure: Option<Outcome>,
    disconnect_failure: Option<Outcome>,
    value: Arc<ReadSlot>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    connect_count: AtomicU32,
    discover_count: AtomicU32,
    read_count: AtomicU32,
    disconnect_count: AtomicU32,
    close_count: AtomicU32,
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransport")
            .field("name", &self.name)
            .field("state", &self.handler.snapshot())
            .field("latency", &self.latency)
            .finish_non_exhaustive()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    /// Create a mock with its own [`ConnectionHandler`]; completions are
    /// applied to its responder directly.
    pub fn new() -> Self {
        let handler = ConnectionHandler::new();
        let sink = Sink::Responder(handler.responder());
        Self::with_sink(handler, sink)
    }

    /// Create a mock that reports completions through `sender`.
    ///
    /// The caller pumps the matching receiver into `handler`'s responder.
    pub fn with_event_sender(handler: ConnectionHandler, sender: EventSender) -> Self {
        Self::with_sink(handler, Sink::Channel(sender))
    }

    fn with_sink(handler: ConnectionHandler, sink: Sink) -> Self {
        Self {
            name: format!("MOCK-{:06X}", rand::random::<u32>() % 0xFFFFFF),
            handler,
            sink,
            values: HashMap::new(),
            unreadable: HashSet::new(),
            latency: Duration::ZERO,
            responsive: true,
            connect_rejection: None,
            connect_failure: None,
            discover_failure: None,
            read_failure: None,
            disconnect_failure: None,
            value: Arc::default(),
            tasks: Mutex::default(),
            connect_count: AtomicU32::new(0),
            discover_count: AtomicU32::new(0),
            read_count: AtomicU32::new(0),
            disconnect_count: AtomicU32::new(0),
            close_count: AtomicU32::new(0),
        }
    }

    #[must_use]
    pub fn name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Expose a readable characteristic holding `value`.
    #[must_use]
    pub fn with_value(mut self, service: Uuid, characteristic: Uuid, value: Vec<u8>) -> Self {
        self.values.insert((service, characteristic), value);
        self
    }

    /// Expose the standard battery level characteristic.
    #[must_use]
    pub fn with_battery(self, level: u8) -> Self {
        self.with_value(BATTERY_SERVICE, BATTERY_LEVEL, vec![level])
    }

    /// Make `characteristic` present but not readable.
    #[must_use]
    pub fn unreadable(mut self, characteristic: Uuid) -> Self {
        self.unreadable.insert(characteristic);
        self
    }

    /// Deliver every completion after `latency`.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Accept every request but never complete one.
    #[must_use]
    pub fn unresponsive(mut self) -> Self {
        self.responsive = false;
        self
    }

    /// Reject connect requests synchronously.
    #[must_use]
    pub fn reject_connect(mut self, reason: Outcome) -> Self {
        self.connect_rejection = Some(reason);
        self
    }

    /// Complete connect requests with a disconnection carrying `reason`.
    #[must_use]
    pub fn fail_connect(mut self, reason: Outcome) -> Self {
        self.connect_failure = Some(reason);
        self
    }

    #[must_use]
    pub fn fail_discovery(mut self, reason: Outcome) -> Self {
        self.discover_failure = Some(reason);
        self
    }

    #[must_use]
    pub fn fail_read(mut self, reason: Outcome) -> Self {
        self.read_failure = Some(reason);
        self
    }

    /// Complete disconnect requests with an operation failure.
    #[must_use]
    pub fn fail_disconnect(mut self, reason: Outcome) -> Self {
        self.disconnect_failure = Some(reason);
        self
    }

    /// The handler this mock reports to.
    pub fn handler(&self) -> &ConnectionHandler {
        &self.handler
    }

    /// Simulate the peripheral dropping the link.
    pub fn drop_link(&self, reason: Outcome) {
        self.sink.send(TransportEvent::Disconnected { reason });
    }

    pub fn connect_count(&self) -> u32 {
        self.connect_count.load(Ordering::Relaxed)
    }

    pub fn discover_count(&self) -> u32 {
        self.discover_count.load(Ordering::Relaxed)
    }

    pub fn read_count(&self) -> u32 {
        self.read_count.load(Ordering::Relaxed)
    }

    pub fn disconnect_count(&self) -> u32 {
        self.disconnect_count.load(Ordering::Relaxed)
    }

    pub fn close_count(&self) -> u32 {
        self.close_count.load(Ordering::Relaxed)
    }

    /// Deliver `event`, storing a read value first, now or after the latency.
    fn complete(&self, event: TransportEvent, value: Option<(RequestId, CharacteristicValue)>) {
        if !self.responsive {
            debug!(?event, "Unresponsive mock swallowing completion");
            return;
        }
        let sink = self.sink.clone();
        let slot = Arc::clone(&self.value);
        let deliver = move || {
            if let Some((request, value)) = value
                && !slot.fill(request, value)
            {
                debug!(%request, "Read superseded; discarding mock value");
            }
            sink.send(event);
        };

        if self.latency.is_zero() {
            deliver();
        } else {
            let latency = self.latency;
            let handle = tokio::spawn(async move {
                tokio::time::sleep(latency).await;
                deliver();
            });
            lock(&self.tasks).push(handle);
        }
    }

    fn has_service(&self, service: &Uuid) -> bool {
        self.values.keys().any(|(s, _)| s == service)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn initiate_connect(&self, request: RequestId) -> Outcome {
        self.connect_count.fetch_add(1, Ordering::Relaxed);
        if let Some(reason) = &self.connect_rejection {
            return reason.clone();
        }
        let event = match &self.connect_failure {
            Some(reason) => TransportEvent::Disconnected {
                reason: reason.clone(),
            },
            None => TransportEvent::Connected { request },
        };
        self.complete(event, None);
        Outcome::Success
    }

    async fn initiate_disconnect(&self, request: RequestId) -> Outcome {
        self.disconnect_count.fetch_add(1, Ordering::Relaxed);
        let event = match &self.disconnect_failure {
            Some(reason) => TransportEvent::OperationFailed {
                request,
                reason: reason.clone(),
            },
            None => TransportEvent::Disconnected {
                reason: Outcome::Success,
            },
        };
        self.complete(event, None);
        Outcome::Success
    }

    async fn initiate_discovery(&self, request: RequestId) -> Outcome {
        self.discover_count.fetch_add(1, Ordering::Relaxed);
        let event = match &self.discover_failure {
            Some(reason) => TransportEvent::DiscoveryFailed {
                request,
                reason: reason.clone(),
            },
            None => TransportEvent::ServicesDiscovered { request },
        };
        self.complete(event, None);
        Outcome::Success
    }

    async fn initiate_read(
        &self,
        request: RequestId,
        service: Uuid,
        characteristic: Uuid,
    ) -> Outcome {
        self.read_count.fetch_add(1, Ordering::Relaxed);
        self.value.begin(request, service, characteristic);
        if !self.has_service(&service) {
            return status::service_not_available(&service);
        }
        let Some(bytes) = self.values.get(&(service, characteristic)) else {
            return status::characteristic_not_available(&characteristic);
        };
        if self.unreadable.contains(&characteristic) {
            return status::characteristic_not_readable(&characteristic);
        }

        match &self.read_failure {
            Some(reason) => self.complete(
                TransportEvent::ReadFailed {
                    request,
                    reason: reason.clone(),
                },
                None,
            ),
            None => self.complete(
                TransportEvent::ReadSucceeded { request },
                Some((request, CharacteristicValue::new(bytes.clone()))),
            ),
        }
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
        self.close_count.fetch_add(1, Ordering::Relaxed);
        for task in lock(&self.tasks).drain(..) {
            task.abort();
        }
    }

    fn description(&self) -> String {
        self.name.clone()
    }
}

/// Random address, most significant byte first.
pub fn random_address() -> String {
    format_address(rand::random::<[u8; 6]>())
}

/// A Xiaomi battery frame from the device at `address`.
fn battery_frame(address: &str, counter: u8, battery: u8) -> Vec<u8> {
    let mut mac: Vec<u8> = address
        .split(':')
        .filter_map(|part| u8::from_str_radix(part, 16).ok())
        .collect();
    mac.reverse();

    let mut frame = vec![0x50, 0x20, 0xaa, 0x01, counter];
    frame.extend_from_slice(&mac);
    frame.extend_from_slice(&[0x0a, 0x10, 0x01, battery]);
    frame
}

/// A mock radio implementing [`Scanner`].
///
/// Configured advertisements are delivered as soon as the scan starts;
/// more can be injected with [`MockScanner::emit`] while it runs.
#[derive(Default)]
pub struct MockScanner {
    advertisements: Vec<Advertisement>,
    start_failure: Option<Outcome>,
    failure: Option<(Duration, ScanFailure)>,
    callback: Mutex<Option<ScanCallback>>,
    task: Mutex<Option<JoinHandle<()>>>,
    start_count: AtomicU32,
    stop_count: AtomicU32,
}

impl std::fmt::Debug for MockScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockScanner")
            .field("advertisements", &self.advertisements.len())
            .field("start_count", &self.start_count())
            .field("stop_count", &self.stop_count())
            .finish_non_exhaustive()
    }
}

impl MockScanner {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_advertisement(mut self, advertisement: Advertisement) -> Self {
        self.advertisements.push(advertisement);
        self
    }

    /// Add `count` plain advertisements from random addresses.
    #[must_use]
    pub fn with_advertisements(mut self, count: usize) -> Self {
        for i in 0..count {
            let adv = Advertisement::new(random_address())
                .name(format!("Device {}", i + 1))
                .rssi(-60);
            self.advertisements.push(adv);
        }
        self
    }

    /// Add `count` Xiaomi sensor advertisements carrying a battery level.
    #[must_use]
    pub fn with_sensor_advertisements(mut self, count: usize) -> Self {
        for i in 0..count {
            let address = random_address();
            let frame = battery_frame(&address, i as u8, 90);
            let adv = Advertisement::new(address)
                .name("MJ_HT_V1")
                .rssi(-70)
                .service_data(XIAOMI_ROOT_SERVICE, frame);
            self.advertisements.push(adv);
        }
        self
    }

    /// Reject scan starts with `message`.
    #[must_use]
    pub fn fail_start(mut self, message: &str) -> Self {
        self.start_failure = Some(Outcome::failed(message));
        self
    }

    /// Report `failure` through the callback `delay` after the scan starts.
    #[must_use]
    pub fn fail_after(mut self, delay: Duration, failure: ScanFailure) -> Self {
        self.failure = Some((delay, failure));
        self
    }

    /// Deliver an advertisement to the running scan.
    ///
    /// Returns `false` if no scan is running.
    pub fn emit(&self, advertisement: Advertisement) -> bool {
        match lock(&self.callback).as_ref() {
            Some(callback) => {
                callback.found(advertisement);
                true
            }
            None => false,
        }
    }

    pub fn start_count(&self) -> u32 {
        self.start_count.load(Ordering::Relaxed)
    }

    pub fn stop_count(&self) -> u32 {
        self.stop_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Scanner for MockScanner {
    async fn start_scan(&self, callback: ScanCallback) -> Outcome {
        self.start_count.fetch_add(1, Ordering::Relaxed);
        if let Some(reason) = &self.start_failure {
            return reason.clone();
        }

        for adv in &self.advertisements {
            callback.found(adv.clone());
        }
        if let Some((delay, failure)) = self.failure {
            let callback = callback.clone();
            let handle = tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                callback.failed(failure);
            });
            *lock(&self.task) = Some(handle);
        }
        *lock(&self.callback) = Some(callback);
        Outcome::Success
    }

    async fn stop_scan(&self) {
        self.stop_count.fetch_add(1, Ordering::Relaxed);
        if let Some(task) = lock(&self.task).take() {
            task.abort();
        }
        lock(&self.callback).take();
    }
}
