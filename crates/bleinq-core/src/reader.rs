//! Connect, discover, read and disconnect under one deadline.
//!
//! [`CharacteristicReader`] sequences the four requests of a
//! [`ConnectionHandler`] against one [`Transport`]. Each phase gets the time
//! left of the overall budget, and the disconnect always runs, whichever
//! phase failed before it.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use bleinq_core::{BleContext, CharacteristicReader, DEFAULT_BATTERY_READ_TIMEOUT};
//!
//! let context = BleContext::new().await?;
//! let (transport, handler) = context.open("Flower care").await?;
//! let reader = CharacteristicReader::new(Arc::new(transport), handler);
//!
//! let (level, status) = reader
//!     .read_battery_level(DEFAULT_BATTERY_READ_TIMEOUT, |phase| println!("{}", phase))
//!     .await;
//! println!("battery {:?}: {}", level, status);
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use bleinq_types::uuid::{BATTERY_LEVEL, BATTERY_SERVICE, describe_characteristic};
use bleinq_types::{CharacteristicValue, Timeout};

use crate::connection::ConnectionHandler;
use crate::outcome::Outcome;
use crate::traits::Transport;

/// Default overall budget for a battery read.
pub const DEFAULT_BATTERY_READ_TIMEOUT: Timeout = Timeout::secs(30);

/// Default minimum budget for the cleanup disconnect.
pub const DEFAULT_CLEANUP_TIMEOUT: Timeout = Timeout::secs(5);

/// Options for [`CharacteristicReader`].
#[derive(Debug, Clone)]
pub struct ReaderOptions {
    /// Budget floor for the final disconnect, so cleanup still gets a
    /// chance when the earlier phases used up the deadline.
    pub cleanup_timeout: Timeout,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            cleanup_timeout: DEFAULT_CLEANUP_TIMEOUT,
        }
    }
}

impl ReaderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the cleanup disconnect budget floor.
    #[must_use]
    pub fn cleanup_timeout(mut self, timeout: Timeout) -> Self {
        self.cleanup_timeout = timeout;
        self
    }
}

/// One step of a read sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Connect,
    Discover,
    Read,
    Disconnect,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Connect => "connect",
            Phase::Discover => "discover",
            Phase::Read => "read",
            Phase::Disconnect => "disconnect",
        };
        f.write_str(name)
    }
}

/// The outcome of one phase, displayed as e.g. `connect Success`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseReport {
    pub phase: Phase,
    pub outcome: Outcome,
}

impl fmt::Display for PhaseReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.phase, self.outcome)
    }
}

/// Result of [`CharacteristicReader::read_characteristic`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadReport {
    /// The value read, or `None` if any phase failed.
    pub value: Option<CharacteristicValue>,
    /// The outcome of the last phase that decided the result.
    pub status: String,
    /// Every phase that ran, in order.
    pub phases: Vec<PhaseReport>,
}

/// Overall deadline shared by the phases of one sequence.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    total: Timeout,
}

impl Deadline {
    pub fn start(total: Timeout) -> Self {
        Self {
            started: Instant::now(),
            total,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Budget left, floored at zero.
    pub fn remaining(&self) -> Timeout {
        self.total.remaining_after(self.elapsed())
    }
}

/// Reads one characteristic of one peripheral.
pub struct CharacteristicReader<T> {
    transport: Arc<T>,
    handler: ConnectionHandler,
    options: ReaderOptions,
}

impl<T: Transport> CharacteristicReader<T> {
    /// `handler` must be the one whose responder receives `transport`'s
    /// completions.
    pub fn new(transport: Arc<T>, handler: ConnectionHandler) -> Self {
        Self {
            transport,
            handler,
            options: ReaderOptions::default(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: ReaderOptions) -> Self {
        self.options = options;
        self
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    pub fn handler(&self) -> &ConnectionHandler {
        &self.handler
    }

    pub async fn connect(&self, timeout: Timeout) -> Outcome {
        self.handler
            .requester()
            .connect(timeout, |request| self.transport.initiate_connect(request))
            .await
    }

    pub async fn discover(&self, timeout: Timeout) -> Outcome {
        self.handler
            .requester()
            .discover(timeout, |request| self.transport.initiate_discovery(request))
            .await
    }

    pub async fn read(&self, service: Uuid, characteristic: Uuid, timeout: Timeout) -> Outcome {
        self.handler
            .requester()
            .read(timeout, |request| {
                self.transport.initiate_read(request, service, characteristic)
            })
            .await
    }

    pub async fn disconnect(&self, timeout: Timeout) -> Outcome {
        self.handler
            .requester()
            .disconnect(timeout, |request| self.transport.initiate_disconnect(request))
            .await
    }

    /// Connect, discover, read `characteristic` of `service`, disconnect.
    ///
    /// `on_report` sees each phase as it completes. The whole sequence is
    /// bounded by `timeout`, except that the disconnect always gets at least
    /// [`ReaderOptions::cleanup_timeout`].
    #[tracing::instrument(level = "info", skip_all, fields(
        peripheral = %self.transport.description(),
        characteristic = %describe_characteristic(&characteristic),
        timeout = %timeout,
    ))]
    pub async fn read_characteristic<R>(
        &self,
        service: Uuid,
        characteristic: Uuid,
        timeout: Timeout,
        mut on_report: R,
    ) -> ReadReport
    where
        R: FnMut(&PhaseReport),
    {
        let deadline = Deadline::start(timeout);
        let mut phases = Vec::with_capacity(4);
        let mut record = |phase: Phase, outcome: Outcome| {
            let report = PhaseReport { phase, outcome };
            debug!("{}", report);
            on_report(&report);
            let status = report.outcome.to_string();
            let succeeded = report.outcome.is_success();
            phases.push(report);
            (succeeded, status)
        };

        let mut value = None;
        let (connected, mut status) = record(Phase::Connect, self.connect(deadline.remaining()).await);
        if connected {
            let (discovered, discover_status) =
                record(Phase::Discover, self.discover(deadline.remaining()).await);
            status = discover_status;
            if discovered {
                let outcome = self
                    .read(service, characteristic, deadline.remaining())
                    .await;
                let (read, read_status) = record(Phase::Read, outcome);
                status = read_status;
                if read {
                    value = self.transport.characteristic_value(service, characteristic);
                    if value.is_none() {
                        status = Outcome::failed("no value").to_string();
                    }
                }
            }
        } else {
            self.transport.close().await;
        }

        let cleanup = deadline.remaining().max(self.options.cleanup_timeout);
        let outcome = self.disconnect(cleanup).await;
        let (disconnected, disconnect_status) = record(Phase::Disconnect, outcome);
        if !disconnected {
            warn!("Disconnecting failed: {}", disconnect_status);
            self.transport.close().await;
            value = None;
            status = disconnect_status;
        }

        info!(elapsed = ?deadline.elapsed(), "Read finished with {}", status);
        ReadReport {
            value,
            status,
            phases,
        }
    }

    /// Read the standard battery level characteristic.
    ///
    /// Returns the percentage, or `None` with the failing status.
    pub async fn read_battery_level<R>(&self, timeout: Timeout, on_report: R) -> (Option<u8>, String)
    where
        R: FnMut(&PhaseReport),
    {
        let report = self
            .read_characteristic(BATTERY_SERVICE, BATTERY_LEVEL, timeout, on_report)
            .await;
        match report.value.as_ref().map(|value| value.uint8(0)) {
            Some(Ok(level)) => (Some(level), report.status),
            Some(Err(e)) => (None, Outcome::failed(e.to_string()).to_string()),
            None => (None, report.status),
        }
    }
}

impl<T> fmt::Debug for CharacteristicReader<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CharacteristicReader")
            .field("state", &self.handler.snapshot())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionState;
    use crate::mock::MockTransport;
    use bleinq_types::uuid::{DEVICE_NAME, GENERIC_ACCESS};

    fn reader(transport: MockTransport) -> CharacteristicReader<MockTransport> {
        let handler = transport.handler().clone();
        CharacteristicReader::new(Arc::new(transport), handler)
    }

    fn phase_strings(report: &ReadReport) -> Vec<String> {
        report.phases.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_phase_report_display() {
        let report = PhaseReport {
            phase: Phase::Discover,
            outcome: Outcome::TimedOut,
        };
        assert_eq!(report.to_string(), "discover Error(timeout)");
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_remaining_is_floored() {
        let deadline = Deadline::start(Timeout::millis(100));
        assert_eq!(deadline.remaining(), Timeout::millis(100));
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(deadline.remaining(), Timeout::millis(60));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(deadline.remaining().is_zero());
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_battery_level() {
        let reader = reader(MockTransport::new().with_battery(87));
        let mut reported = Vec::new();

        let (level, status) = reader
            .read_battery_level(Timeout::secs(10), |phase| reported.push(phase.to_string()))
            .await;

        assert_eq!(level, Some(87));
        assert_eq!(status, "Success");
        assert_eq!(
            reported,
            vec![
                "connect Success",
                "discover Success",
                "read Success",
                "disconnect Success"
            ]
        );
        assert_eq!(
            reader.handler().snapshot().connection,
            ConnectionState::NotConnected
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_failure_still_cleans_up() {
        let transport = MockTransport::new().fail_connect(Outcome::failed("Connection failed"));
        let reader = reader(transport);

        let report = reader
            .read_characteristic(BATTERY_SERVICE, BATTERY_LEVEL, Timeout::secs(10), |_| {})
            .await;

        assert_eq!(report.value, None);
        assert_eq!(report.status, "Error(Connection failed)");
        assert_eq!(
            phase_strings(&report),
            vec!["connect Error(Connection failed)", "disconnect Success"]
        );
        assert_eq!(reader.transport().close_count(), 1);
        assert_eq!(reader.transport().disconnect_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_failure_reports_read_status() {
        let transport = MockTransport::new()
            .with_battery(50)
            .fail_read(Outcome::failed("read not permitted (2)"));
        let reader = reader(transport);

        let (level, status) = reader.read_battery_level(Timeout::secs(10), |_| {}).await;

        assert_eq!(level, None);
        assert_eq!(status, "Error(read not permitted (2))");
        assert_eq!(reader.transport().disconnect_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_phases_share_one_deadline() {
        let transport = MockTransport::new()
            .with_battery(50)
            .with_latency(Duration::from_millis(400));
        let reader = reader(transport);

        let started = Instant::now();
        let report = reader
            .read_characteristic(BATTERY_SERVICE, BATTERY_LEVEL, Timeout::secs(1), |_| {})
            .await;

        // connect and discover use 800 ms; the read gets the 200 ms left.
        assert_eq!(
            phase_strings(&report)[..3],
            ["connect Success", "discover Success", "read Error(timeout)"]
        );
        assert_eq!(report.status, "Error(timeout)");
        assert_eq!(report.value, None);
        // The disconnect still gets its cleanup budget past the deadline.
        assert_eq!(report.phases[3].outcome, Outcome::Success);
        assert_eq!(started.elapsed(), Duration::from_millis(1400));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_disconnect_overrides_value() {
        let transport = MockTransport::new()
            .with_battery(64)
            .fail_disconnect(Outcome::failed("rejected"));
        let reader = reader(transport);

        let report = reader
            .read_characteristic(BATTERY_SERVICE, BATTERY_LEVEL, Timeout::secs(10), |_| {})
            .await;

        assert_eq!(report.value, None);
        assert_eq!(report.status, "Error(rejected)");
        assert_eq!(reader.transport().close_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_value_is_malformed() {
        let transport = MockTransport::new().with_value(BATTERY_SERVICE, BATTERY_LEVEL, Vec::new());
        let reader = reader(transport);

        let (level, status) = reader.read_battery_level(Timeout::secs(10), |_| {}).await;
        assert_eq!(level, None);
        assert!(status.starts_with("Error(Malformed payload"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_characteristic_fails_read() {
        let reader = reader(MockTransport::new());

        let report = reader
            .read_characteristic(BATTERY_SERVICE, BATTERY_LEVEL, Timeout::secs(10), |_| {})
            .await;
        assert_eq!(report.value, None);
        assert!(report.status.contains("not available"));
        assert_eq!(report.phases.len(), 4);
    }
    #[tokio::test(start_paused = true)]
    async fn test_disconnect_uses_remaining_budget_when_larger() {
        let transport = MockTransport::new()
            .with_battery(50)
            .with_latency(Duration::from_millis(300));
        let reader = reader(transport)
            .with_options(ReaderOptions::new().cleanup_timeout(Timeout::millis(100)));

        let started = Instant::now();
        let report = reader
            .read_characteristic(BATTERY_SERVICE, BATTERY_LEVEL, Timeout::secs(10), |_| {})
            .await;

        // 9.1 s remain after the read, well above the 100 ms cleanup floor,
        // so the 300 ms disconnect completes.
        assert_eq!(report.phases[3].to_string(), "disconnect Success");
        assert_eq!(report.status, "Success");
        assert_eq!(report.value.and_then(|v| v.uint8(0).ok()), Some(50));
        assert_eq!(started.elapsed(), Duration::from_millis(1200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_floor_applies_after_exhausted_deadline() {
        let transport = MockTransport::new()
            .with_battery(50)
            .with_latency(Duration::from_millis(300));
        let reader = reader(transport)
            .with_options(ReaderOptions::new().cleanup_timeout(Timeout::millis(100)));

        let report = reader
            .read_characteristic(BATTERY_SERVICE, BATTERY_LEVEL, Timeout::millis(700), |_| {})
            .await;

        // The read exhausts the deadline; the disconnect only gets the
        // 100 ms floor, shorter than the transport's latency.
        assert_eq!(report.phases[2].outcome, Outcome::TimedOut);
        assert_eq!(report.phases[3].to_string(), "disconnect Error(timeout)");
        assert_eq!(reader.transport().close_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_completion_of_timed_out_read_is_ignored() {
        let transport = MockTransport::new()
            .with_battery(50)
            .with_value(GENERIC_ACCESS, DEVICE_NAME, b"MJ_HT_V1".to_vec())
            .with_latency(Duration::from_millis(150));
        let reader = reader(transport);
        assert!(reader.connect(Timeout::secs(1)).await.is_success());
        assert!(reader.discover(Timeout::secs(1)).await.is_success());

        let first = reader
            .read(BATTERY_SERVICE, BATTERY_LEVEL, Timeout::millis(100))
            .await;
        assert_eq!(first, Outcome::TimedOut);

        // The battery completion lands 50 ms into this read and must not
        // complete it.
        let started = Instant::now();
        let second = reader.read(GENERIC_ACCESS, DEVICE_NAME, Timeout::secs(1)).await;
        assert_eq!(second, Outcome::Success);
        assert_eq!(started.elapsed(), Duration::from_millis(150));

        let transport = reader.transport();
        assert_eq!(transport.characteristic_value(BATTERY_SERVICE, BATTERY_LEVEL), None);
        assert_eq!(
            transport
                .characteristic_value(GENERIC_ACCESS, DEVICE_NAME)
                .and_then(|value| value.as_utf8().map(str::to_string)),
            Some("MJ_HT_V1".to_string())
        );
    }
}
