//! Pipeline facade
//!
//! Owns the ambient [`Context`] and the [`DispatchQueue`], and ties the
//! event abstraction to the transport boundary: `dispatch`/`send` validate
//! and enqueue, `drain` releases bounded batches to a [`Transport`], and
//! `boot` runs the opt-out gate, the diagnostic ping, and the startup
//! drain in order.
//!
//! Everything here runs synchronously on the caller's thread; asynchrony
//! only appears inside the transport collaborator.

use crate::completion::{FailureFn, SuccessFn};
use crate::config::TelemetryConfig;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::event::TelemetryEvent;
use crate::queue::DispatchQueue;
use crate::transport::Transport;

/// Persisted opt-out flag, owned elsewhere.
///
/// Read on every triggering call; the pipeline never caches the answer.
pub trait OptOutStore {
    fn did_opt_out(&self) -> bool;
}

/// Result of a [`Pipeline::boot`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootOutcome {
    /// User opted out; nothing was pinged or transmitted
    OptedOut,
    /// Diagnostic ping failed; startup events stay queued
    PingFailed,
    /// Ping succeeded and the startup events were handed to the transport
    Booted { delivered: usize },
}

/// Bootstrap options for [`init`]
#[derive(Debug, Clone)]
pub struct InitOptions {
    pub partner_code: String,
    pub location_code: String,
    pub api_key: String,
    /// Override for the default collection endpoint
    pub endpoint: Option<String>,
}

/// Default collection-service endpoint
pub const DEFAULT_ENDPOINT: &str = "https://collect.terptrace.dev";

/// Bootstrap entry point.
///
/// Validates partner and location codes, applies the endpoint override,
/// builds the pipeline with an ambient context seeded from the options,
/// and invokes `on_ready` with the configured pipeline before returning it.
pub fn init<F>(options: InitOptions, on_ready: F) -> Result<Pipeline>
where
    F: FnOnce(&Pipeline),
{
    if options.partner_code.trim().is_empty() {
        return Err(Error::Config("partner_code must be non-empty".to_string()));
    }
    if options.location_code.trim().is_empty() {
        return Err(Error::Config("location_code must be non-empty".to_string()));
    }

    let config = TelemetryConfig {
        endpoint: Some(
            options
                .endpoint
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
        ),
        api_key: Some(options.api_key),
        partner_code: Some(options.partner_code.clone()),
        location_code: Some(options.location_code.clone()),
        ..Default::default()
    };
    config.validate()?;

    let ambient = Context::new()
        .with_attr("partner", options.partner_code)
        .with_attr("location", options.location_code);

    let pipeline = Pipeline::new(config, ambient);
    on_ready(&pipeline);
    Ok(pipeline)
}

/// The event-to-request pipeline.
pub struct Pipeline {
    config: TelemetryConfig,
    ambient: Context,
    queue: DispatchQueue,
}

impl Pipeline {
    /// Create a pipeline owning the given ambient context
    pub fn new(config: TelemetryConfig, ambient: Context) -> Self {
        let queue = DispatchQueue::new(config.batch_size);
        Self {
            config,
            ambient,
            queue,
        }
    }

    /// The process-wide ambient context
    pub fn ambient(&self) -> &Context {
        &self.ambient
    }

    /// Mutable access for late-bound ambient values (fingerprint, group)
    pub fn ambient_mut(&mut self) -> &mut Context {
        &mut self.ambient
    }

    /// Collection-service configuration, for building a transport
    pub fn config(&self) -> &TelemetryConfig {
        &self.config
    }

    /// Requests currently awaiting transmission
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Register callbacks, build the request, and enqueue it at the
    /// event's default priority.
    ///
    /// Context validation failures propagate synchronously and nothing is
    /// queued; transport failures arrive later through the failure
    /// callback.
    pub fn dispatch<E: TelemetryEvent>(
        &mut self,
        event: &E,
        success: Option<SuccessFn>,
        failure: Option<FailureFn>,
    ) -> Result<()> {
        self.dispatch_with_priority(event, event.rpc_method().default_priority(), success, failure)
    }

    /// [`dispatch`](Pipeline::dispatch) with an explicit queue priority;
    /// lower values drain first.
    pub fn dispatch_with_priority<E: TelemetryEvent>(
        &mut self,
        event: &E,
        priority: u32,
        success: Option<SuccessFn>,
        failure: Option<FailureFn>,
    ) -> Result<()> {
        event.completion().arm(success, failure);
        let request = event.generate_rpc(&self.ambient)?;
        self.queue.enqueue(priority, request);
        Ok(())
    }

    /// Fire-and-forget dispatch with no callbacks
    pub fn send<E: TelemetryEvent>(&mut self, event: &E) -> Result<()> {
        self.dispatch(event, None, None)
    }

    /// Release up to `amount` queued requests (default: the configured
    /// batch size) to the transport, in priority order. Returns the number
    /// handed off.
    ///
    /// Draining into an [`HttpTransport`](crate::transport::HttpTransport)
    /// spawns a tokio task per delivery, so it must run inside a tokio
    /// runtime; outside one each delivery fails through its failure
    /// callback.
    pub fn drain(&mut self, transport: &dyn Transport, amount: Option<usize>) -> usize {
        self.queue
            .dequeue(|item| transport.deliver(item.into_request()), amount)
    }

    /// Best-effort abort of an event's in-flight delivery.
    ///
    /// Never retracts a request still sitting in the queue or already
    /// completed; only cancels a correlated transport operation.
    pub fn abort<E: TelemetryEvent>(&self, event: &E, transport: &dyn Transport) -> bool {
        transport.abort(event.uuid())
    }

    /// Boot sequence: opt-out gate, diagnostic ping, then startup drain.
    ///
    /// The opt-out flag is read here on every call, never cached. When the
    /// ping fails the startup events are held in the queue for a later
    /// boot or drain.
    pub async fn boot(
        &mut self,
        transport: &dyn Transport,
        opt_out: &dyn OptOutStore,
    ) -> Result<BootOutcome> {
        if opt_out.did_opt_out() {
            tracing::info!("telemetry opt-out is set; skipping boot");
            return Ok(BootOutcome::OptedOut);
        }

        if !transport.ping().await? {
            tracing::warn!("collection service ping failed; startup events held");
            return Ok(BootOutcome::PingFailed);
        }

        let mut delivered = 0;
        while !self.queue.is_empty() {
            delivered += self.drain(transport, None);
        }
        tracing::info!(delivered, "boot complete");
        Ok(BootOutcome::Booted { delivered })
    }
}
