//! Bounded scan sessions.
//!
//! A [`ScanSession`] runs one radio scan at a time over a [`Scanner`]. The
//! scan ends when its timeout elapses or when someone calls
//! [`ScanStopper::stop`], either the user or the scanner itself after a
//! failure. The underlying scan is always stopped afterwards.

use std::fmt;
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use bleinq_types::{Advertisement, Timeout};

use crate::traits::Scanner;
use crate::util::lock;

/// Default scan duration.
pub const DEFAULT_SCAN_TIMEOUT: Timeout = Timeout::secs(30);

/// Reason reported when the user stops a scan.
pub const STOPPED_BY_USER: &str = "stopped by user";

/// Scan start failure codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScanFailure {
    AlreadyStarted,
    ApplicationRegistrationFailed,
    InternalError,
    FeatureUnsupported,
    Unknown(i32),
}

impl ScanFailure {
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => Self::AlreadyStarted,
            2 => Self::ApplicationRegistrationFailed,
            3 => Self::InternalError,
            4 => Self::FeatureUnsupported,
            other => Self::Unknown(other),
        }
    }

    pub fn code(self) -> i32 {
        match self {
            Self::AlreadyStarted => 1,
            Self::ApplicationRegistrationFailed => 2,
            Self::InternalError => 3,
            Self::FeatureUnsupported => 4,
            Self::Unknown(code) => code,
        }
    }

    fn text(self) -> &'static str {
        match self {
            Self::AlreadyStarted => "scanning already started",
            Self::ApplicationRegistrationFailed => "application registration failed",
            Self::InternalError => "internal error",
            Self::FeatureUnsupported => "feature unsupported",
            Self::Unknown(_) => "unknown",
        }
    }
}

impl fmt::Display for ScanFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.text(), self.code())
    }
}

/// Options for [`ScanSession::scan_with_options`].
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// How long to scan for.
    pub timeout: Timeout,
    /// Only forward advertisements that carry a Xiaomi sensor frame.
    pub sensors_only: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_SCAN_TIMEOUT,
            sensors_only: false,
        }
    }
}

impl ScanOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the scan duration.
    #[must_use]
    pub fn timeout(mut self, timeout: Timeout) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set whether to forward only sensor advertisements.
    #[must_use]
    pub fn sensors_only(mut self, sensors_only: bool) -> Self {
        self.sensors_only = sensors_only;
        self
    }
}

#[derive(Debug, Default)]
struct ScanState {
    active: bool,
    error: Option<String>,
    cancel: CancellationToken,
}

/// Cloneable handle that ends the running scan.
#[derive(Debug, Clone)]
pub struct ScanStopper {
    state: Arc<Mutex<ScanState>>,
}

impl ScanStopper {
    /// Wake the scan immediately, recording `error` if one is given.
    ///
    /// The first recorded error wins. Calls made while no scan is running
    /// are ignored.
    pub fn stop(&self, error: Option<String>) {
        let mut state = lock(&self.state);
        if !state.active {
            debug!(?error, "No scan running; ignoring stop");
            return;
        }
        if state.error.is_none() {
            state.error = error;
        }
        state.cancel.cancel();
    }

    /// Stop on behalf of the user.
    pub fn stop_by_user(&self) {
        self.stop(Some(STOPPED_BY_USER.to_string()));
    }
}

/// What a [`Scanner`] reports into while a scan runs.
#[derive(Clone)]
pub struct ScanCallback {
    on_found: Arc<dyn Fn(Advertisement) + Send + Sync>,
    stopper: ScanStopper,
}

impl ScanCallback {
    pub fn new<F>(on_found: F, stopper: ScanStopper) -> Self
    where
        F: Fn(Advertisement) + Send + Sync + 'static,
    {
        Self {
            on_found: Arc::new(on_found),
            stopper,
        }
    }

    /// Forward an advertisement. Duplicates are forwarded as-is.
    pub fn found(&self, advertisement: Advertisement) {
        (self.on_found)(advertisement);
    }

    /// Report a scan failure; ends the scan with its message.
    pub fn failed(&self, failure: ScanFailure) {
        warn!("Scan failed with {}", failure);
        self.stopper.stop(Some(failure.to_string()));
    }
}

impl fmt::Debug for ScanCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanCallback").finish_non_exhaustive()
    }
}

/// Resets the session when a scan ends, including by cancellation.
struct ActiveScan<'a> {
    state: &'a Mutex<ScanState>,
}

impl Drop for ActiveScan<'_> {
    fn drop(&mut self) {
        lock(self.state).active = false;
    }
}

/// One-at-a-time scan sessions over a [`Scanner`].
#[derive(Debug)]
pub struct ScanSession<S> {
    scanner: S,
    state: Arc<Mutex<ScanState>>,
}

impl<S: Scanner> ScanSession<S> {
    pub fn new(scanner: S) -> Self {
        Self {
            scanner,
            state: Arc::default(),
        }
    }

    pub fn scanner(&self) -> &S {
        &self.scanner
    }

    /// A handle that can stop the running scan from any task.
    pub fn stopper(&self) -> ScanStopper {
        ScanStopper {
            state: Arc::clone(&self.state),
        }
    }

    /// Stop the running scan. See [`ScanStopper::stop`].
    pub fn stop(&self, error: Option<String>) {
        self.stopper().stop(error);
    }

    pub fn is_scanning(&self) -> bool {
        lock(&self.state).active
    }

    /// Scan for up to `timeout`, forwarding every advertisement to
    /// `on_found`.
    ///
    /// Returns `None` when the scan ran to its timeout or was stopped
    /// without an error, else the recorded error message.
    #[tracing::instrument(level = "info", skip_all, fields(timeout = %timeout))]
    pub async fn scan<F>(&self, timeout: Timeout, on_found: F) -> Option<String>
    where
        F: Fn(Advertisement) + Send + Sync + 'static,
    {
        let cancel = {
            let mut state = lock(&self.state);
            if state.active {
                return Some(ScanFailure::AlreadyStarted.to_string());
            }
            state.active = true;
            state.error = None;
            state.cancel = CancellationToken::new();
            state.cancel.clone()
        };
        let _active = ActiveScan { state: &self.state };

        let callback = ScanCallback::new(on_found, self.stopper());
        let started = self.scanner.start_scan(callback).await;
        if let Some(message) = started.message() {
            warn!("Failed to start scanning: {}", message);
            self.stop(Some(message.to_string()));
        } else {
            info!("Scanning started with {} timeout", timeout);
        }

        tokio::select! {
            _ = cancel.cancelled() => debug!("Scan stopped"),
            _ = tokio::time::sleep(timeout.as_duration()) => debug!("Scan timeout elapsed"),
        }

        self.scanner.stop_scan().await;
        let error = lock(&self.state).error.take();
        info!(
            "Scanning completed with status {}",
            error.as_deref().unwrap_or("success")
        );
        error
    }

    /// Scan with [`ScanOptions`].
    pub async fn scan_with_options<F>(&self, options: ScanOptions, on_found: F) -> Option<String>
    where
        F: Fn(Advertisement) + Send + Sync + 'static,
    {
        if options.sensors_only {
            self.scan(options.timeout, move |adv: Advertisement| {
                if adv.sensor_payload().is_some() {
                    on_found(adv);
                }
            })
            .await
        } else {
            self.scan(options.timeout, on_found).await
        }
    }
}
