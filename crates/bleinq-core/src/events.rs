//! Transport event channel.
//!
//! Transport adapters run their lower-layer operations on their own tasks
//! and report completions as [`TransportEvent`]s. An event pump drains the
//! channel into a [`Responder`], so the adapter never touches the state
//! machine directly.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::connection::{RequestId, Responder};
use crate::outcome::Outcome;

/// Completion reported by a transport adapter.
///
/// Completions of a request carry the [`RequestId`] it was started with.
/// All events are serializable for logging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransportEvent {
    Connected { request: RequestId },
    /// Link closed; `Success` for a requested disconnect.
    Disconnected { reason: Outcome },
    ServicesDiscovered { request: RequestId },
    DiscoveryFailed { request: RequestId, reason: Outcome },
    ReadSucceeded { request: RequestId },
    ReadFailed { request: RequestId, reason: Outcome },
    /// A failure that leaves the link state unchanged.
    OperationFailed { request: RequestId, reason: Outcome },
}

/// Sender for transport events.
pub type EventSender = mpsc::UnboundedSender<TransportEvent>;

/// Receiver for transport events.
pub type EventReceiver = mpsc::UnboundedReceiver<TransportEvent>;

/// Create a new transport event channel.
///
/// The channel is unbounded so that callback contexts never wait on it.
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

impl Responder {
    /// Dispatch one transport event to the matching entry point.
    pub fn apply(&self, event: TransportEvent) {
        trace!(?event, "Applying transport event");
        match event {
            TransportEvent::Connected { request } => self.on_connected(request),
            TransportEvent::Disconnected { reason } => self.on_disconnected(reason),
            TransportEvent::ServicesDiscovered { request } => self.on_services_discovered(request),
            TransportEvent::DiscoveryFailed { request, reason } => {
                self.on_discovery_error(request, reason)
            }
            TransportEvent::ReadSucceeded { request } => self.on_read_success(request),
            TransportEvent::ReadFailed { request, reason } => self.on_read_error(request, reason),
            TransportEvent::OperationFailed { request, reason } => {
                self.on_operation_failed(request, reason)
            }
        }
    }
}

/// Apply events to `responder` until every sender is dropped.
pub async fn pump_events(mut receiver: EventReceiver, responder: Responder) {
    while let Some(event) = receiver.recv().await {
        responder.apply(event);
    }
    debug!("Transport event channel closed");
}

/// Spawn [`pump_events`] on the current runtime.
pub fn spawn_event_pump(receiver: EventReceiver, responder: Responder) -> JoinHandle<()> {
    tokio::spawn(pump_events(receiver, responder))
}
