//! Event abstraction
//!
//! Every reportable occurrence is a [`TelemetryEvent`]: a contract covering
//! identity, timing, payload access, context merging, and request
//! generation. Concrete event types implement it by composing an
//! [`EventCore`] that carries the shared state, rather than through an
//! inheritance chain.
//!
//! ## Lifecycle
//!
//! ```text
//! constructed → context validated → request generated → enqueued
//!             → (success | failure | aborted)
//! ```
//!
//! Construction generates the event's uuid (unless explicitly supplied) and
//! captures the occurrence timestamp; both are stable for the lifetime of
//! the event. The payload is owned at construction and only ever handed out
//! by shared reference, so nothing downstream can mutate it.

mod kinds;

pub use kinds::{ActionEvent, LabObservationEvent, PingEvent, ViewEvent};

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::completion::Completion;
use crate::context::Context;
use crate::error::Result;
use crate::request::{self, Request};

/// Operation designator: which remote method an event's request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RpcMethod {
    RecordView,
    RecordAction,
    RecordLabObservation,
    Ping,
}

impl RpcMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            RpcMethod::RecordView => "record_view",
            RpcMethod::RecordAction => "record_action",
            RpcMethod::RecordLabObservation => "record_lab_observation",
            RpcMethod::Ping => "ping",
        }
    }

    /// URL path suffix on the collection service
    pub fn path(&self) -> &'static str {
        match self {
            RpcMethod::RecordView => "/telemetry/views",
            RpcMethod::RecordAction => "/telemetry/actions",
            RpcMethod::RecordLabObservation => "/telemetry/lab-observations",
            RpcMethod::Ping => "/telemetry/ping",
        }
    }

    /// Default dispatch priority; lower values drain first.
    pub fn default_priority(&self) -> u32 {
        match self {
            RpcMethod::Ping => 0,
            RpcMethod::RecordAction => 10,
            RpcMethod::RecordView => 20,
            RpcMethod::RecordLabObservation => 30,
        }
    }
}

impl std::fmt::Display for RpcMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable event payload.
///
/// The value is owned at construction and only exposed by shared reference,
/// which replaces the original freeze-on-attach guard with ordinary
/// ownership.
#[derive(Debug, Clone)]
pub struct Payload(Arc<serde_json::Value>);

impl Payload {
    pub fn new(value: serde_json::Value) -> Self {
        Self(Arc::new(value))
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }
}

impl From<serde_json::Value> for Payload {
    fn from(value: serde_json::Value) -> Self {
        Self::new(value)
    }
}

/// Shared state composed into every concrete event type.
#[derive(Debug)]
pub struct EventCore {
    uuid: String,
    payload: Option<Payload>,
    occurred_at: Option<DateTime<Utc>>,
    local_context: Context,
    completion: Completion,
}

impl EventCore {
    /// Create a core with a fresh uuid and the construction time as the
    /// occurrence timestamp.
    pub fn new() -> Self {
        Self {
            uuid: Uuid::new_v4().to_string(),
            payload: None,
            occurred_at: Some(Utc::now()),
            local_context: Context::new(),
            completion: Completion::new(),
        }
    }

    /// Use an explicitly supplied identifier instead of a generated one
    pub fn with_uuid(mut self, uuid: impl Into<String>) -> Self {
        self.uuid = uuid.into();
        self
    }

    /// Attach a payload; it is frozen from this point on.
    pub fn with_payload(mut self, payload: impl Into<Payload>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    /// Override the occurrence timestamp captured at construction
    pub fn with_occurred_at(mut self, occurred_at: DateTime<Utc>) -> Self {
        self.occurred_at = Some(occurred_at);
        self
    }

    /// Attach the event-local context merged at dispatch time
    pub fn with_context(mut self, local_context: Context) -> Self {
        self.local_context = local_context;
        self
    }

    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    pub fn payload(&self) -> Option<&serde_json::Value> {
        self.payload.as_ref().map(Payload::as_value)
    }

    pub fn local_context(&self) -> &Context {
        &self.local_context
    }

    pub fn completion(&self) -> Completion {
        self.completion.clone()
    }

    /// Stored occurrence timestamp, falling back to `now` only when no
    /// valid timestamp was captured.
    pub fn render_occurrence(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.occurred_at.unwrap_or(now)
    }
}

impl Default for EventCore {
    fn default() -> Self {
        Self::new()
    }
}

/// Contract every concrete event type satisfies.
///
/// Only [`rpc_method`](TelemetryEvent::rpc_method) and
/// [`core`](TelemetryEvent::core) are required; the rest is shared default
/// behavior over the composed [`EventCore`].
pub trait TelemetryEvent {
    /// Which remote method this event targets. Pure and deterministic per
    /// concrete type.
    fn rpc_method(&self) -> RpcMethod;

    /// Composition hook for the shared event state
    fn core(&self) -> &EventCore;

    /// Stable identifier, generated once at construction
    fn uuid(&self) -> &str {
        self.core().uuid()
    }

    /// The frozen payload, or `None` for payload-less events
    fn render_payload(&self) -> Option<&serde_json::Value> {
        self.core().payload()
    }

    /// Occurrence timestamp; `now` is only used when no timestamp was
    /// captured at construction.
    fn render_occurrence(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.core().render_occurrence(now)
    }

    /// Merge the event-local context onto the ambient one and validate the
    /// result. The ambient context is never mutated.
    fn render_context(&self, ambient: &Context) -> Result<Context> {
        let merged = Context::merged(ambient, self.core().local_context());
        merged.validate()?;
        Ok(merged)
    }

    /// Build the transport-ready request for this event.
    ///
    /// Propagates [`Error::ContextValidation`](crate::Error::ContextValidation)
    /// from the merge step; on failure nothing has been queued.
    fn generate_rpc(&self, ambient: &Context) -> Result<Request> {
        request::build_request(self, ambient)
    }

    /// Shared handle the transport resolves exactly once
    fn completion(&self) -> Completion {
        self.core().completion()
    }
}
