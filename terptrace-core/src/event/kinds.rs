//! Concrete event types
//!
//! Each kind composes an [`EventCore`] and resolves its own
//! [`RpcMethod`]. Payloads are built at construction and frozen; local
//! context, explicit timestamps, and explicit identifiers are attached
//! through the builder-style setters.

use chrono::{DateTime, Utc};
use serde_json::json;

use crate::context::Context;

use super::{EventCore, RpcMethod, TelemetryEvent};

/// A screen or product view
#[derive(Debug)]
pub struct ViewEvent {
    core: EventCore,
}

impl ViewEvent {
    pub fn new(screen: impl Into<String>) -> Self {
        Self {
            core: EventCore::new().with_payload(json!({ "screen": screen.into() })),
        }
    }

    pub fn with_context(mut self, local: Context) -> Self {
        self.core = self.core.with_context(local);
        self
    }

    pub fn with_occurred_at(mut self, occurred_at: DateTime<Utc>) -> Self {
        self.core = self.core.with_occurred_at(occurred_at);
        self
    }

    pub fn with_uuid(mut self, uuid: impl Into<String>) -> Self {
        self.core = self.core.with_uuid(uuid);
        self
    }
}

impl TelemetryEvent for ViewEvent {
    fn rpc_method(&self) -> RpcMethod {
        RpcMethod::RecordView
    }

    fn core(&self) -> &EventCore {
        &self.core
    }
}

/// A user action (tap, search, add-to-cart, ...)
#[derive(Debug)]
pub struct ActionEvent {
    core: EventCore,
}

impl ActionEvent {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            core: EventCore::new().with_payload(json!({ "action": action.into() })),
        }
    }

    /// Action with a target (product id, screen element, ...)
    pub fn with_target(action: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            core: EventCore::new().with_payload(json!({
                "action": action.into(),
                "target": target.into(),
            })),
        }
    }

    pub fn with_context(mut self, local: Context) -> Self {
        self.core = self.core.with_context(local);
        self
    }

    pub fn with_occurred_at(mut self, occurred_at: DateTime<Utc>) -> Self {
        self.core = self.core.with_occurred_at(occurred_at);
        self
    }

    pub fn with_uuid(mut self, uuid: impl Into<String>) -> Self {
        self.core = self.core.with_uuid(uuid);
        self
    }
}

impl TelemetryEvent for ActionEvent {
    fn rpc_method(&self) -> RpcMethod {
        RpcMethod::RecordAction
    }

    fn core(&self) -> &EventCore {
        &self.core
    }
}

/// A lab-test observation for a product.
///
/// The observation value is free-form structured data (feelings, taste
/// notes, potency readings); the enumerated vocabularies live with the
/// application, not here.
#[derive(Debug)]
pub struct LabObservationEvent {
    core: EventCore,
}

impl LabObservationEvent {
    pub fn new(product_id: impl Into<String>, observation: serde_json::Value) -> Self {
        Self {
            core: EventCore::new().with_payload(json!({
                "product_id": product_id.into(),
                "observation": observation,
            })),
        }
    }

    pub fn with_context(mut self, local: Context) -> Self {
        self.core = self.core.with_context(local);
        self
    }

    pub fn with_occurred_at(mut self, occurred_at: DateTime<Utc>) -> Self {
        self.core = self.core.with_occurred_at(occurred_at);
        self
    }

    pub fn with_uuid(mut self, uuid: impl Into<String>) -> Self {
        self.core = self.core.with_uuid(uuid);
        self
    }
}

impl TelemetryEvent for LabObservationEvent {
    fn rpc_method(&self) -> RpcMethod {
        RpcMethod::RecordLabObservation
    }

    fn core(&self) -> &EventCore {
        &self.core
    }
}

/// Diagnostic round-trip issued during boot; carries no payload.
#[derive(Debug, Default)]
pub struct PingEvent {
    core: EventCore,
}

impl PingEvent {
    pub fn new() -> Self {
        Self {
            core: EventCore::new(),
        }
    }

    pub fn with_context(mut self, local: Context) -> Self {
        self.core = self.core.with_context(local);
        self
    }
}

impl TelemetryEvent for PingEvent {
    fn rpc_method(&self) -> RpcMethod {
        RpcMethod::Ping
    }

    fn core(&self) -> &EventCore {
        &self.core
    }
}
