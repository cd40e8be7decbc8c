//! Capabilities the core consumes from a Bluetooth stack.
//!
//! [`Transport`] starts GATT operations on one peripheral and [`Scanner`]
//! drives the radio scan. Both are implemented over btleplug in
//! [`crate::device`] and [`crate::scanner`], and by the mocks in
//! [`crate::mock`] for testing.

use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use bleinq_types::CharacteristicValue;

use crate::connection::RequestId;
use crate::outcome::Outcome;
use crate::scan::ScanCallback;
use crate::util::lock;

/// Starts GATT operations on one peripheral.
///
/// Every `initiate_*` method returns as soon as the lower layer accepted
/// (`Success`) or rejected the request. The completion itself is reported
/// later through the connection's [`Responder`](crate::Responder), usually
/// via the transport event channel, tagged with the same `request`.
///
/// # Example
///
/// ```ignore
/// use bleinq_core::{ConnectionHandler, Transport};
///
/// async fn connect<T: Transport>(transport: &T, handler: &ConnectionHandler) {
///     let outcome = handler
///         .requester()
///         .connect(Timeout::secs(10), |request| transport.initiate_connect(request))
///         .await;
///     println!("connect {}", outcome);
/// }
/// ```
#[async_trait]
pub trait Transport: Send + Sync {
    async fn initiate_connect(&self, request: RequestId) -> Outcome;

    async fn initiate_disconnect(&self, request: RequestId) -> Outcome;

    async fn initiate_discovery(&self, request: RequestId) -> Outcome;

    /// Start reading `characteristic` of `service`.
    ///
    /// Fails synchronously when the service or characteristic is unknown
    /// or not readable. Any value held from an earlier read is discarded.
    async fn initiate_read(
        &self,
        request: RequestId,
        service: Uuid,
        characteristic: Uuid,
    ) -> Outcome;

    /// The value captured by the latest read, if that read was of
    /// `characteristic` of `service` and has succeeded.
    fn characteristic_value(
        &self,
        service: Uuid,
        characteristic: Uuid,
    ) -> Option<CharacteristicValue>;

    /// Abandon any lower-layer work still in flight.
    ///
    /// Called after a failed connect and after a failed disconnect. The
    /// default implementation does nothing.
    async fn close(&self) {}

    /// Human-readable peripheral description for logs.
    fn description(&self) -> String {
        String::from("peripheral")
    }
}

/// The value of the latest read a transport started.
///
/// [`begin`](ReadSlot::begin) drops the previous value and only the same
/// request can [`fill`](ReadSlot::fill) the slot afterwards, so a late
/// completion of an earlier read never shows up as a later read's value.
#[derive(Debug, Default)]
pub struct ReadSlot {
    latest: Mutex<Option<CapturedRead>>,
}

#[derive(Debug)]
struct CapturedRead {
    request: RequestId,
    service: Uuid,
    characteristic: Uuid,
    value: Option<CharacteristicValue>,
}

impl ReadSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking `request`'s read of `characteristic` of `service`.
    pub fn begin(&self, request: RequestId, service: Uuid, characteristic: Uuid) {
        *lock(&self.latest) = Some(CapturedRead {
            request,
            service,
            characteristic,
            value: None,
        });
    }

    /// Store the value read by `request`.
    ///
    /// Returns `false`, storing nothing, if another read has begun since.
    pub fn fill(&self, request: RequestId, value: CharacteristicValue) -> bool {
        match lock(&self.latest).as_mut() {
            Some(latest) if latest.request == request => {
                latest.value = Some(value);
                true
            }
            _ => false,
        }
    }

    pub fn value(&self, service: Uuid, characteristic: Uuid) -> Option<CharacteristicValue> {
        lock(&self.latest)
            .as_ref()
            .filter(|latest| latest.service == service && latest.characteristic == characteristic)
            .and_then(|latest| latest.value.clone())
    }
}

/// Drives the radio scan.
#[async_trait]
pub trait Scanner: Send + Sync {
    /// Start scanning and deliver every advertisement to `callback`.
    ///
    /// Scan failures after a successful start are reported through
    /// [`ScanCallback::failed`].
    async fn start_scan(&self, callback: ScanCallback) -> Outcome;

    async fn stop_scan(&self);
}
