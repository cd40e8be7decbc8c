//! Connection state machine shared by requests and transport callbacks.
//!
//! A [`ConnectionHandler`] owns the state of one physical connection and
//! hands out two views of it:
//!
//! - [`Requester`]: async `connect`, `discover`, `read` and `disconnect`
//!   requests. Each one claims the [`OperationGuard`], checks its
//!   precondition, starts the lower-layer operation and waits for the
//!   completion signal. Starting and waiting share one timeout.
//! - [`Responder`]: synchronous, non-blocking entry points for transport
//!   callbacks. They update the state and complete the waiting request.
//!
//! The completion slot is armed before the lower-layer operation starts, so a
//! callback that fires before the requester begins to wait is not lost. Each
//! armed request gets a fresh [`RequestId`], which the transport echoes back
//! with its completion. A late completion from an earlier request that already
//! timed out is dropped instead of completing a newer one. Disconnection
//! completes whatever request is pending.
//!
//! # Example
//!
//! ```
//! use bleinq_core::{ConnectionHandler, Outcome};
//! use bleinq_types::Timeout;
//!
//! # tokio_test_block_on(async {
//! let handler = ConnectionHandler::new();
//! let requester = handler.requester();
//! let responder = handler.responder();
//!
//! let outcome = requester
//!     .connect(Timeout::secs(1), move |request| async move {
//!         // A real transport starts the radio operation here and calls the
//!         // responder from its own callback context.
//!         responder.on_connected(request);
//!         Outcome::Success
//!     })
//!     .await;
//! assert_eq!(outcome, Outcome::Success);
//! assert!(handler.snapshot().is_connected());
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(f)
//! # }
//! ```

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use bleinq_types::Timeout;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tracing::{debug, trace};

use crate::guard::{CurrentOperation, OperationGuard};
use crate::outcome::Outcome;
use crate::util::lock;

/// Link-level connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    NotConnected,
    Connecting,
    Connected,
    Disconnecting,
}

/// GATT service discovery state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryState {
    #[default]
    NotDiscovered,
    Discovering,
    Discovered,
}

/// Characteristic read state. `Read` is idle whatever the last read returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadingState {
    #[default]
    Read,
    Reading,
}

/// Point-in-time copy of the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct MachineState {
    pub connection: ConnectionState,
    pub discovery: DiscoveryState,
    pub reading: ReadingState,
    pub operation: CurrentOperation,
}

impl MachineState {
    pub fn is_connected(&self) -> bool {
        self.connection == ConnectionState::Connected
    }

    pub fn is_discovered(&self) -> bool {
        self.discovery == DiscoveryState::Discovered
    }
}

/// Tag of one armed request.
///
/// Handed to the `initiate` closure of every request; the transport passes
/// it back to the [`Responder`] with the completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(u64);

impl RequestId {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Which pending request a responder signal may complete.
#[derive(Debug, Clone, Copy)]
enum Target {
    /// The request `id`, if it is an operation of this kind.
    Only(CurrentOperation, RequestId),
    /// The request `id`, whatever its kind.
    Request(RequestId),
    Any,
}

impl Target {
    fn accepts(self, waiter: &Waiter) -> bool {
        match self {
            Target::Only(operation, request) => {
                waiter.operation == operation && waiter.request == request
            }
            Target::Request(request) => waiter.request == request,
            Target::Any => true,
        }
    }
}

#[derive(Debug)]
struct Waiter {
    operation: CurrentOperation,
    request: RequestId,
    sender: oneshot::Sender<Outcome>,
}

#[derive(Debug, Default)]
struct Inner {
    connection: ConnectionState,
    discovery: DiscoveryState,
    reading: ReadingState,
    waiter: Option<Waiter>,
    last_request: u64,
}

impl Inner {
    fn arm(&mut self, operation: CurrentOperation) -> (RequestId, oneshot::Receiver<Outcome>) {
        self.last_request += 1;
        let request = RequestId(self.last_request);
        let (sender, receiver) = oneshot::channel();
        self.waiter = Some(Waiter {
            operation,
            request,
            sender,
        });
        (request, receiver)
    }

    fn disarm(&mut self, request: RequestId) {
        if self.waiter.as_ref().is_some_and(|w| w.request == request) {
            self.waiter = None;
        }
    }

    fn is_pending(&self, operation: CurrentOperation, request: RequestId) -> bool {
        self.waiter
            .as_ref()
            .is_some_and(|w| Target::Only(operation, request).accepts(w))
    }

    fn complete(&mut self, target: Target, outcome: Outcome) {
        match self.waiter.take() {
            Some(waiter) if target.accepts(&waiter) => {
                trace!(operation = %waiter.operation, request = %waiter.request, %outcome, "Completing request");
                if waiter.sender.send(outcome).is_err() {
                    debug!(operation = %waiter.operation, "Request stopped waiting before completion");
                }
            }
            Some(waiter) => {
                debug!(
                    pending = %waiter.operation,
                    request = %waiter.request,
                    ?target,
                    %outcome,
                    "Dropping signal meant for another request"
                );
                self.waiter = Some(waiter);
            }
            None => debug!(?target, %outcome, "No request waiting; dropping signal"),
        }
    }
}

#[derive(Debug, Default)]
struct Shared {
    guard: OperationGuard,
    inner: Mutex<Inner>,
}

impl Shared {
    /// Never held across an await.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        lock(&self.inner)
    }

    fn snapshot(&self) -> MachineState {
        let inner = self.lock();
        MachineState {
            connection: inner.connection,
            discovery: inner.discovery,
            reading: inner.reading,
            operation: self.guard.current(),
        }
    }
}

/// An armed request. Rolls its transient state back and disarms its waiter
/// on every exit path, including the request future being dropped.
struct PendingRequest<'a> {
    shared: &'a Shared,
    operation: CurrentOperation,
    request: RequestId,
    /// Connection state to restore after a failed disconnect.
    previous: ConnectionState,
    settled: bool,
}

impl<'a> PendingRequest<'a> {
    fn arm(
        shared: &'a Shared,
        inner: &mut Inner,
        operation: CurrentOperation,
    ) -> (Self, oneshot::Receiver<Outcome>) {
        let previous = inner.connection;
        match operation {
            CurrentOperation::Connect => inner.connection = ConnectionState::Connecting,
            CurrentOperation::Disconnect => inner.connection = ConnectionState::Disconnecting,
            CurrentOperation::Discover => inner.discovery = DiscoveryState::Discovering,
            CurrentOperation::Read => inner.reading = ReadingState::Reading,
            CurrentOperation::None => {}
        }
        let (request, completion) = inner.arm(operation);
        let pending = Self {
            shared,
            operation,
            request,
            previous,
            settled: false,
        };
        (pending, completion)
    }

    /// Roll back and hand out the lock for computing the verdict.
    fn settle(mut self) -> MutexGuard<'a, Inner> {
        let shared = self.shared;
        let mut inner = shared.lock();
        self.roll_back(&mut inner);
        self.settled = true;
        inner
    }

    fn roll_back(&self, inner: &mut Inner) {
        inner.disarm(self.request);
        match self.operation {
            CurrentOperation::Connect if inner.connection == ConnectionState::Connecting => {
                inner.connection = ConnectionState::NotConnected;
            }
            CurrentOperation::Disconnect if inner.connection == ConnectionState::Disconnecting => {
                inner.connection = self.previous;
            }
            CurrentOperation::Discover if inner.discovery == DiscoveryState::Discovering => {
                inner.discovery = DiscoveryState::NotDiscovered;
            }
            CurrentOperation::Read => inner.reading = ReadingState::Read,
            _ => {}
        }
    }
}

impl Drop for PendingRequest<'_> {
    fn drop(&mut self) {
        if !self.settled {
            let mut inner = self.shared.lock();
            self.roll_back(&mut inner);
            debug!(operation = %self.operation, request = %self.request, "Request cancelled; state rolled back");
        }
    }
}

/// Owner of one connection's state.
#[derive(Debug, Clone, Default)]
pub struct ConnectionHandler {
    shared: Arc<Shared>,
}

impl ConnectionHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// The request side, for the orchestration layer.
    pub fn requester(&self) -> Requester {
        Requester {
            shared: Arc::clone(&self.shared),
        }
    }

    /// The callback side, for the transport adapter.
    pub fn responder(&self) -> Responder {
        Responder {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn snapshot(&self) -> MachineState {
        self.shared.snapshot()
    }
}

/// Issues requests against the state machine.
///
/// Every request claims the operation guard first and reports
/// [`Outcome::Busy`] without touching any state if another request holds it.
/// `initiate` receives the request's [`RequestId`] and starts the lower-layer
/// operation; it counts against the request's timeout.
#[derive(Debug, Clone)]
pub struct Requester {
    shared: Arc<Shared>,
}

impl Requester {
    /// Connect, unless already connected.
    ///
    /// `initiate` is only called when a connection has to be made. On any
    /// failure the state rolls back from `Connecting` to `NotConnected`.
    pub async fn connect<I, F>(&self, timeout: Timeout, initiate: I) -> Outcome
    where
        I: FnOnce(RequestId) -> F,
        F: Future<Output = Outcome>,
    {
        let Some(_ticket) = self.shared.guard.acquire(CurrentOperation::Connect) else {
            debug!("Connect rejected: another operation is in flight");
            return Outcome::Busy;
        };

        let (pending, completion) = {
            let mut inner = self.shared.lock();
            if inner.connection == ConnectionState::Connected {
                debug!("Already connected");
                return Outcome::Success;
            }
            PendingRequest::arm(&self.shared, &mut inner, CurrentOperation::Connect)
        };

        let outcome = wait_for_completion(&pending, timeout, initiate, completion).await;

        let inner = pending.settle();
        match inner.connection {
            ConnectionState::Connected => Outcome::Success,
            _ if outcome.is_success() => Outcome::NotConnected,
            _ => outcome,
        }
    }

    /// Disconnect, unless already disconnected.
    ///
    /// A failed disconnect rolls the state back to what it was before.
    pub async fn disconnect<I, F>(&self, timeout: Timeout, initiate: I) -> Outcome
    where
        I: FnOnce(RequestId) -> F,
        F: Future<Output = Outcome>,
    {
        let Some(_ticket) = self.shared.guard.acquire(CurrentOperation::Disconnect) else {
            debug!("Disconnect rejected: another operation is in flight");
            return Outcome::Busy;
        };

        let (pending, completion) = {
            let mut inner = self.shared.lock();
            if inner.connection == ConnectionState::NotConnected {
                debug!("Already disconnected");
                return Outcome::Success;
            }
            PendingRequest::arm(&self.shared, &mut inner, CurrentOperation::Disconnect)
        };

        let outcome = wait_for_completion(&pending, timeout, initiate, completion).await;

        let inner = pending.settle();
        match inner.connection {
            ConnectionState::NotConnected => Outcome::Success,
            _ if outcome.is_success() => Outcome::failed("still connected"),
            _ => outcome,
        }
    }

    /// Discover services. Requires a connection; a no-op once discovered.
    pub async fn discover<I, F>(&self, timeout: Timeout, initiate: I) -> Outcome
    where
        I: FnOnce(RequestId) -> F,
        F: Future<Output = Outcome>,
    {
        let Some(_ticket) = self.shared.guard.acquire(CurrentOperation::Discover) else {
            debug!("Discover rejected: another operation is in flight");
            return Outcome::Busy;
        };

        let (pending, completion) = {
            let mut inner = self.shared.lock();
            if inner.connection != ConnectionState::Connected {
                return Outcome::NotConnected;
            }
            if inner.discovery == DiscoveryState::Discovered {
                debug!("Services already discovered");
                return Outcome::Success;
            }
            PendingRequest::arm(&self.shared, &mut inner, CurrentOperation::Discover)
        };

        let outcome = wait_for_completion(&pending, timeout, initiate, completion).await;

        let inner = pending.settle();
        if inner.discovery == DiscoveryState::Discovered {
            Outcome::Success
        } else if !outcome.is_success() {
            outcome
        } else if inner.connection != ConnectionState::Connected {
            Outcome::NotConnected
        } else {
            Outcome::NotDiscovered
        }
    }

    /// Read a characteristic. Requires a connection and discovered services.
    ///
    /// Every call starts a fresh read; the value itself is held by the
    /// transport.
    pub async fn read<I, F>(&self, timeout: Timeout, initiate: I) -> Outcome
    where
        I: FnOnce(RequestId) -> F,
        F: Future<Output = Outcome>,
    {
        let Some(_ticket) = self.shared.guard.acquire(CurrentOperation::Read) else {
            debug!("Read rejected: another operation is in flight");
            return Outcome::Busy;
        };

        let (pending, completion) = {
            let mut inner = self.shared.lock();
            if inner.connection != ConnectionState::Connected {
                return Outcome::NotConnected;
            }
            if inner.discovery != DiscoveryState::Discovered {
                return Outcome::NotDiscovered;
            }
            PendingRequest::arm(&self.shared, &mut inner, CurrentOperation::Read)
        };

        let outcome = wait_for_completion(&pending, timeout, initiate, completion).await;

        let inner = pending.settle();
        if outcome.is_success() && inner.connection != ConnectionState::Connected {
            Outcome::NotConnected
        } else {
            outcome
        }
    }

    pub fn snapshot(&self) -> MachineState {
        self.shared.snapshot()
    }
}

/// Start the lower-layer operation and, if it was accepted, wait for its
/// completion signal. Both steps share `timeout`.
async fn wait_for_completion<I, F>(
    pending: &PendingRequest<'_>,
    timeout: Timeout,
    initiate: I,
    completion: oneshot::Receiver<Outcome>,
) -> Outcome
where
    I: FnOnce(RequestId) -> F,
    F: Future<Output = Outcome>,
{
    let operation = pending.operation;
    let request = pending.request;
    let work = async {
        let initiated = initiate(request).await;
        if initiated.is_error() {
            debug!(%operation, %request, outcome = %initiated, "Operation was not initiated");
            return initiated;
        }
        match completion.await {
            Ok(outcome) => outcome,
            Err(_) => Outcome::failed("completion signal dropped"),
        }
    };

    match tokio::time::timeout(timeout.as_duration(), work).await {
        Ok(outcome) => outcome,
        Err(_) => {
            debug!(%operation, %request, %timeout, "Timed out");
            Outcome::TimedOut
        }
    }
}

/// Transport-side entry points. None of them block.
///
/// Completions carry the [`RequestId`] the transport was started with.
/// State changes that reflect the link itself are applied whichever request
/// they belong to; completions of a request that is no longer pending are
/// dropped.
#[derive(Debug, Clone)]
pub struct Responder {
    shared: Arc<Shared>,
}

impl Responder {
    pub fn on_connected(&self, request: RequestId) {
        let mut inner = self.shared.lock();
        inner.connection = ConnectionState::Connected;
        inner.complete(Target::Only(CurrentOperation::Connect, request), Outcome::Success);
    }

    /// Link closed, requested or not. Completes any pending request with
    /// `reason` and resets discovery and reading.
    pub fn on_disconnected(&self, reason: Outcome) {
        let mut inner = self.shared.lock();
        inner.connection = ConnectionState::NotConnected;
        inner.discovery = DiscoveryState::NotDiscovered;
        inner.reading = ReadingState::Read;
        inner.complete(Target::Any, reason);
    }

    pub fn on_services_discovered(&self, request: RequestId) {
        let mut inner = self.shared.lock();
        if inner.connection != ConnectionState::Connected {
            debug!("Ignoring service discovery on a closed link");
            return;
        }
        inner.discovery = DiscoveryState::Discovered;
        inner.complete(Target::Only(CurrentOperation::Discover, request), Outcome::Success);
    }

    pub fn on_discovery_error(&self, request: RequestId, reason: Outcome) {
        let mut inner = self.shared.lock();
        if !inner.is_pending(CurrentOperation::Discover, request) {
            debug!(%request, %reason, "Dropping stale discovery error");
            return;
        }
        inner.discovery = DiscoveryState::NotDiscovered;
        inner.complete(Target::Only(CurrentOperation::Discover, request), reason);
    }

    pub fn on_read_success(&self, request: RequestId) {
        let mut inner = self.shared.lock();
        if !inner.is_pending(CurrentOperation::Read, request) {
            debug!(%request, "Dropping stale read completion");
            return;
        }
        inner.reading = ReadingState::Read;
        inner.complete(Target::Only(CurrentOperation::Read, request), Outcome::Success);
    }

    pub fn on_read_error(&self, request: RequestId, reason: Outcome) {
        let mut inner = self.shared.lock();
        if !inner.is_pending(CurrentOperation::Read, request) {
            debug!(%request, %reason, "Dropping stale read error");
            return;
        }
        inner.reading = ReadingState::Read;
        inner.complete(Target::Only(CurrentOperation::Read, request), reason);
    }

    /// A lower-layer failure that does not change connection state, such
    /// as a rejected disconnect. Completes `request` whatever its kind.
    pub fn on_operation_failed(&self, request: RequestId, reason: Outcome) {
        let mut inner = self.shared.lock();
        inner.complete(Target::Request(request), reason);
    }

    pub fn snapshot(&self) -> MachineState {
        self.shared.snapshot()
    }
}
