//! # terptrace-core
//!
//! Client-side telemetry emission pipeline for terptrace.
//!
//! Application code constructs typed events (a view, an action, a lab-test
//! observation); the pipeline merges each event's local context onto the
//! ambient context, builds a transport-ready request, and queues it for
//! priority-ordered, best-effort transmission to the collection service.
//! Completion is signaled back through per-event callbacks, delivered
//! exactly once.
//!
//! ## Architecture
//!
//! ```text
//! event → context merge/validate → request build → dispatch queue
//!       → transport collaborator → success/failure callback
//! ```
//!
//! Delivery is fire-and-forget: the queue never blocks producers, nothing
//! is persisted across restarts, and aborts are best-effort.
//!
//! ## Example
//!
//! ```rust,no_run
//! use terptrace_core::{init, InitOptions, ViewEvent};
//!
//! let mut pipeline = init(
//!     InitOptions {
//!         partner_code: "greenhouse".into(),
//!         location_code: "denver-01".into(),
//!         api_key: "tt_live_xxxx".into(),
//!         endpoint: None,
//!     },
//!     |_| {},
//! )
//! .expect("bootstrap failed");
//!
//! pipeline.ambient_mut().fingerprint = Some("device-123".into());
//! pipeline.ambient_mut().group = Some("session-abc".into());
//!
//! pipeline.send(&ViewEvent::new("product-shelf")).expect("dispatch failed");
//! ```

// Re-export commonly used items at the crate root
pub use completion::{Completion, FailureFn, OperationStatus, SuccessFn, TransportErrorKind};
pub use config::{Config, TelemetryConfig};
pub use context::Context;
pub use error::{Error, Result};
pub use event::{
    ActionEvent, EventCore, LabObservationEvent, Payload, PingEvent, RpcMethod, TelemetryEvent,
    ViewEvent,
};
pub use pipeline::{init, BootOutcome, InitOptions, OptOutStore, Pipeline, DEFAULT_ENDPOINT};
pub use queue::{DispatchQueue, QueuedRequest};
pub use request::{build_request, encoded_context, Request};
pub use transport::{HttpTransport, Transport};

// Public modules
pub mod completion;
pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod logging;
pub mod pipeline;
pub mod queue;
pub mod request;
pub mod transport;
