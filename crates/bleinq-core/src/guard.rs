//! Mutual exclusion for BLE requests.
//!
//! A peripheral handles one GATT request at a time. [`OperationGuard`]
//! records which request is in flight and rejects any other until the
//! first one finishes. [`OperationTicket`] releases the guard on drop, so a
//! request future that is cancelled mid-flight cannot leave it held.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use serde::Serialize;

/// The request currently holding an [`OperationGuard`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum CurrentOperation {
    #[default]
    None = 0,
    Connect = 1,
    Discover = 2,
    Read = 3,
    Disconnect = 4,
}

impl CurrentOperation {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Connect,
            2 => Self::Discover,
            3 => Self::Read,
            4 => Self::Disconnect,
            _ => Self::None,
        }
    }
}

impl fmt::Display for CurrentOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::Connect => "connect",
            Self::Discover => "discover",
            Self::Read => "read",
            Self::Disconnect => "disconnect",
        };
        f.write_str(name)
    }
}

/// Lock-free single-slot guard over the in-flight operation.
#[derive(Debug, Default)]
pub struct OperationGuard {
    current: AtomicU8,
}

impl OperationGuard {
    pub const fn new() -> Self {
        Self {
            current: AtomicU8::new(CurrentOperation::None as u8),
        }
    }

    /// The operation currently holding the guard.
    pub fn current(&self) -> CurrentOperation {
        CurrentOperation::from_u8(self.current.load(Ordering::Acquire))
    }

    /// Atomically claim the guard for `operation`.
    ///
    /// Returns `false` if another operation holds it. Claiming for
    /// [`CurrentOperation::None`] always fails.
    pub fn try_start(&self, operation: CurrentOperation) -> bool {
        if operation == CurrentOperation::None {
            return false;
        }
        self.current
            .compare_exchange(
                CurrentOperation::None as u8,
                operation as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Release the guard unconditionally.
    pub fn finish(&self) {
        self.current
            .store(CurrentOperation::None as u8, Ordering::Release);
    }

    /// Claim the guard and return a ticket that releases it on drop.
    pub fn acquire(&self, operation: CurrentOperation) -> Option<OperationTicket<'_>> {
        self.try_start(operation).then_some(OperationTicket {
            guard: self,
            operation,
        })
    }
}

/// Proof that the guard is held; releases it when dropped.
#[derive(Debug)]
#[must_use = "the guard is released as soon as the ticket is dropped"]
pub struct OperationTicket<'a> {
    guard: &'a OperationGuard,
    operation: CurrentOperation,
}

impl OperationTicket<'_> {
    pub fn operation(&self) -> CurrentOperation {
        self.operation
    }
}

impl Drop for OperationTicket<'_> {
    fn drop(&mut self) {
        self.guard.finish();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    use super::*;

    #[test]
    fn test_try_start_is_exclusive() {
        let guard = OperationGuard::new();
        assert_eq!(guard.current(), CurrentOperation::None);

        assert!(guard.try_start(CurrentOperation::Connect));
        assert_eq!(guard.current(), CurrentOperation::Connect);
        assert!(!guard.try_start(CurrentOperation::Read));
        assert!(!guard.try_start(CurrentOperation::Connect));

        guard.finish();
        assert_eq!(guard.current(), CurrentOperation::None);
        assert!(guard.try_start(CurrentOperation::Read));
    }

    #[test]
    fn test_cannot_start_none() {
        let guard = OperationGuard::new();
        assert!(!guard.try_start(CurrentOperation::None));
        assert_eq!(guard.current(), CurrentOperation::None);
    }

    #[test]
    fn test_ticket_releases_on_drop() {
        let guard = OperationGuard::new();
        {
            let ticket = guard.acquire(CurrentOperation::Discover).unwrap();
            assert_eq!(ticket.operation(), CurrentOperation::Discover);
            assert!(guard.acquire(CurrentOperation::Read).is_none());
        }
        assert_eq!(guard.current(), CurrentOperation::None);
        assert!(guard.acquire(CurrentOperation::Read).is_some());
    }

    #[test]
    fn test_concurrent_start_admits_one() {
        let guard = Arc::new(OperationGuard::new());
        let winners = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let guard = Arc::clone(&guard);
                let winners = Arc::clone(&winners);
                std::thread::spawn(move || {
                    if guard.try_start(CurrentOperation::Connect) {
                        winners.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(winners.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_display() {
        assert_eq!(CurrentOperation::Disconnect.to_string(), "disconnect");
        assert_eq!(CurrentOperation::None.to_string(), "none");
    }
}
