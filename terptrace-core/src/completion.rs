//! Single-shot completion handles for event outcomes
//!
//! Every event carries a [`Completion`]: a cloneable handle holding at most
//! one success callback and one failure callback. The transport collaborator
//! resolves the handle when the network call finishes; resolving takes both
//! slots, so the outcome is delivered exactly once even if a misbehaving
//! transport calls back multiple times.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

/// Outcome of a transmitted request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationStatus {
    Ok,
    Error,
}

/// Known transport failure kinds
///
/// Carried through the failure callback alongside the HTTP status code when
/// one is available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Request exceeded the configured timeout; no status code available
    Timeout,
    /// Could not reach the collection service
    Connection,
    /// Service answered with a non-success HTTP status
    Http,
    /// Service answered but the response could not be interpreted
    InvalidResponse,
}

/// Success callback: invoked with the terminal status.
pub type SuccessFn = Box<dyn FnOnce(OperationStatus) + Send + 'static>;

/// Failure callback: invoked with the terminal status, the error kind when
/// known, and the HTTP status code when available.
pub type FailureFn =
    Box<dyn FnOnce(OperationStatus, Option<TransportErrorKind>, Option<u16>) + Send + 'static>;

#[derive(Default)]
struct Slots {
    success: Option<SuccessFn>,
    failure: Option<FailureFn>,
}

/// Cloneable single-shot completion handle.
///
/// Clones share the same slots: the event keeps one, the queued request
/// carries another, and whichever resolution arrives first wins.
#[derive(Clone, Default)]
pub struct Completion {
    slots: Arc<Mutex<Slots>>,
}

impl Completion {
    /// Create an unarmed completion (fire-and-forget)
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the callback pair, replacing any previously registered pair.
    ///
    /// `None` in either slot means "no callback for that outcome".
    pub fn arm(&self, success: Option<SuccessFn>, failure: Option<FailureFn>) {
        let mut slots = self.lock();
        slots.success = success;
        slots.failure = failure;
    }

    /// Resolve with success. Subsequent resolutions are ignored.
    pub fn succeed(&self, status: OperationStatus) {
        let slots = std::mem::take(&mut *self.lock());
        if let Some(callback) = slots.success {
            callback(status);
        }
    }

    /// Resolve with failure. Subsequent resolutions are ignored.
    pub fn fail(
        &self,
        status: OperationStatus,
        kind: Option<TransportErrorKind>,
        code: Option<u16>,
    ) {
        let slots = std::mem::take(&mut *self.lock());
        if let Some(callback) = slots.failure {
            callback(status, kind, code);
        }
    }

    /// Whether either callback slot is still armed
    pub fn is_armed(&self) -> bool {
        let slots = self.lock();
        slots.success.is_some() || slots.failure.is_some()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Slots> {
        // A callback that panicked mid-resolve already gave up its slots.
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("armed", &self.is_armed())
            .finish()
    }
}
