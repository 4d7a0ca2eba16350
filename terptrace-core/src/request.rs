//! Request construction
//!
//! Turns a validated event plus the ambient context into a transport-ready
//! [`Request`]: a JSON body carrying the payload fields, the event
//! identity, and the merged context under the reserved `context` key.
//!
//! A secondary base64 encoding of the merged context is produced purely for
//! size diagnostics; JSON remains the transmitted form unless a caller
//! opts into binary transport explicitly via [`encoded_context`].

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::Utc;
use serde_json::json;

use crate::completion::Completion;
use crate::context::Context;
use crate::error::Result;
use crate::event::{RpcMethod, TelemetryEvent};

/// Encode in chunks whose length is a multiple of 3 so the concatenated
/// output stays valid base64 without internal padding.
const ENCODE_CHUNK_BYTES: usize = 3 * 1024;

/// Reserved body key for the merged context
pub const CONTEXT_KEY: &str = "context";

/// Transport-ready representation of a single event.
///
/// Immutable after enqueue; the completion handle is shared with the
/// originating event.
#[derive(Debug, Clone)]
pub struct Request {
    /// Identifier copied from the originating event
    pub uuid: String,
    /// Operation designator resolved by the event
    pub method: RpcMethod,
    /// JSON body: payload fields plus `uuid`, `occurred_at`, and `context`
    pub body: serde_json::Value,
    /// Merged, validated context
    pub context: Context,
    /// Resolved exactly once by the transport collaborator
    pub completion: Completion,
}

/// Build a request from an event and the ambient context.
///
/// Fails with [`Error::ContextValidation`](crate::Error::ContextValidation)
/// when the merged context is missing required fields; nothing is queued on
/// failure.
pub fn build_request<E: TelemetryEvent + ?Sized>(event: &E, ambient: &Context) -> Result<Request> {
    let context = event.render_context(ambient)?;
    let occurred_at = event.render_occurrence(Utc::now());

    let mut body = match event.render_payload() {
        Some(payload) if payload.is_object() => payload.clone(),
        Some(payload) => json!({ "value": payload.clone() }),
        None => json!({}),
    };

    let context_value = serde_json::to_value(&context)?;
    if let Some(fields) = body.as_object_mut() {
        fields.insert("uuid".to_string(), json!(event.uuid()));
        fields.insert("occurred_at".to_string(), json!(occurred_at));
        fields.insert(CONTEXT_KEY.to_string(), context_value);
    }

    log_context_sizes(&context);

    Ok(Request {
        uuid: event.uuid().to_string(),
        method: event.rpc_method(),
        body,
        context,
        completion: event.completion(),
    })
}

/// Base64 encoding of the serialized context, produced in fixed-size
/// chunks. Diagnostic by default; also the body callers use when they opt
/// into binary transport.
pub fn encoded_context(context: &Context) -> Result<String> {
    let raw = serde_json::to_vec(context)?;
    let mut encoded = String::with_capacity(raw.len() / 3 * 4 + 4);
    for chunk in raw.chunks(ENCODE_CHUNK_BYTES) {
        encoded.push_str(&STANDARD.encode(chunk));
    }
    Ok(encoded)
}

/// Size comparison between the JSON and base64 context encodings.
/// Telemetry about the telemetry; failures never block the request.
fn log_context_sizes(context: &Context) {
    let json_bytes = match serde_json::to_vec(context) {
        Ok(raw) => raw.len(),
        Err(_) => return,
    };
    if let Ok(encoded) = encoded_context(context) {
        tracing::debug!(
            json_bytes,
            encoded_bytes = encoded.len(),
            "context encoding size comparison"
        );
    }
}
