//! Transport boundary
//!
//! The pipeline hands prepared requests to a [`Transport`] collaborator and
//! never looks at them again; the outcome comes back through the request's
//! completion handle, resolved exactly once. Retry and backoff policy live
//! on this side of the boundary (or in application code), never in the
//! queue or the events.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use tokio::sync::oneshot;
use tokio::task::AbortHandle;

use crate::completion::{OperationStatus, TransportErrorKind};
use crate::config::TelemetryConfig;
use crate::error::{Error, Result};
use crate::event::RpcMethod;
use crate::request::Request;

/// Collaborator performing the actual network call.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Diagnostic round-trip to the collection service
    async fn ping(&self) -> Result<bool>;

    /// Fire-and-forget delivery. Implementations must resolve the request's
    /// completion exactly once: `succeed(Ok)` or
    /// `fail(Error, kind, http-code)`, with kind/code `None` when
    /// unavailable.
    fn deliver(&self, request: Request);

    /// Best-effort cancellation of an in-flight delivery correlated by
    /// event uuid. Advisory only; returns whether a delivery was found.
    fn abort(&self, uuid: &str) -> bool;
}

/// HTTP transport posting JSON bodies to the collection service.
///
/// Each delivery runs as its own tokio task, tracked by event uuid so
/// [`abort`](Transport::abort) can cancel it while still in flight. One
/// attempt per delivery; best-effort by design.
pub struct HttpTransport {
    http_client: reqwest::Client,
    base_url: String,
    in_flight: Arc<Mutex<HashMap<String, AbortHandle>>>,
}

impl HttpTransport {
    /// Create a transport from configuration
    ///
    /// Returns an error if the configuration is invalid or missing required fields.
    pub fn new(config: &TelemetryConfig) -> Result<Self> {
        config.validate()?;

        let base_url = config
            .endpoint
            .clone()
            .ok_or_else(|| Error::Config("telemetry.endpoint is required".to_string()))?
            .trim_end_matches('/')
            .to_string();

        // Build default headers
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(api_key) = &config.api_key {
            let auth_value = format!("Bearer {}", api_key);
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&auth_value)
                    .map_err(|e| Error::Config(format!("invalid api_key: {}", e)))?,
            );
        }

        if let Some(partner_code) = &config.partner_code {
            headers.insert(
                "X-Partner-Code",
                HeaderValue::from_str(partner_code)
                    .map_err(|e| Error::Config(format!("invalid partner_code: {}", e)))?,
            );
        }

        if let Some(location_code) = &config.location_code {
            headers.insert(
                "X-Location-Code",
                HeaderValue::from_str(location_code)
                    .map_err(|e| Error::Config(format!("invalid location_code: {}", e)))?,
            );
        }

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Number of deliveries currently tracked as in flight
    pub fn in_flight_count(&self) -> usize {
        lock_in_flight(&self.in_flight).len()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn ping(&self) -> Result<bool> {
        let url = format!("{}{}", self.base_url, RpcMethod::Ping.path());

        match self
            .http_client
            .post(&url)
            .json(&serde_json::json!({}))
            .send()
            .await
        {
            Ok(response) => Ok(response.status().is_success()),
            Err(e) => {
                tracing::warn!(error = %e, "ping failed");
                Ok(false)
            }
        }
    }

    /// Requires a tokio runtime on the calling thread; without one the
    /// delivery is dropped and reported through the failure callback as a
    /// connection failure.
    fn deliver(&self, request: Request) {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                tracing::warn!(uuid = %request.uuid, "no tokio runtime available; delivery dropped");
                request.completion.fail(
                    OperationStatus::Error,
                    Some(TransportErrorKind::Connection),
                    None,
                );
                return;
            }
        };

        let url = format!("{}{}", self.base_url, request.method.path());
        let client = self.http_client.clone();
        let in_flight = Arc::clone(&self.in_flight);

        let Request {
            uuid,
            method,
            body,
            completion,
            ..
        } = request;
        let task_uuid = uuid.clone();

        // The task waits for its abort handle to be registered before doing
        // anything, so its own cleanup below cannot race the insert.
        let (registered_tx, registered_rx) = oneshot::channel::<()>();

        let handle = runtime.spawn(async move {
            let _ = registered_rx.await;
            let outcome = client.post(&url).json(&body).send().await;
            match outcome {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        tracing::debug!(uuid = %task_uuid, method = %method, "delivered");
                        completion.succeed(OperationStatus::Ok);
                    } else {
                        tracing::warn!(uuid = %task_uuid, method = %method, code = status.as_u16(), "delivery rejected");
                        completion.fail(
                            OperationStatus::Error,
                            Some(TransportErrorKind::Http),
                            Some(status.as_u16()),
                        );
                    }
                }
                Err(e) if e.is_timeout() => {
                    tracing::warn!(uuid = %task_uuid, method = %method, "delivery timed out");
                    completion.fail(
                        OperationStatus::Error,
                        Some(TransportErrorKind::Timeout),
                        None,
                    );
                }
                Err(e) => {
                    tracing::warn!(uuid = %task_uuid, method = %method, error = %e, "delivery failed");
                    completion.fail(
                        OperationStatus::Error,
                        Some(TransportErrorKind::Connection),
                        None,
                    );
                }
            }
            lock_in_flight(&in_flight).remove(&task_uuid);
        });

        lock_in_flight(&self.in_flight).insert(uuid, handle.abort_handle());
        let _ = registered_tx.send(());
    }

    fn abort(&self, uuid: &str) -> bool {
        match lock_in_flight(&self.in_flight).remove(uuid) {
            Some(handle) => {
                handle.abort();
                tracing::debug!(uuid, "delivery abort requested");
                true
            }
            None => false,
        }
    }
}

fn lock_in_flight<'a>(
    in_flight: &'a Arc<Mutex<HashMap<String, AbortHandle>>>,
) -> std::sync::MutexGuard<'a, HashMap<String, AbortHandle>> {
    in_flight.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::event::{TelemetryEvent, ViewEvent};
    use crate::request::build_request;

    fn valid_config() -> TelemetryConfig {
        TelemetryConfig {
            endpoint: Some("https://collect.example.com".to_string()),
            api_key: Some("tt_live_test".to_string()),
            partner_code: Some("greenhouse".to_string()),
            location_code: Some("denver-01".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_transport_requires_valid_config() {
        let config = TelemetryConfig::default();
        assert!(HttpTransport::new(&config).is_err());
    }

    #[test]
    fn test_transport_with_valid_config() {
        assert!(HttpTransport::new(&valid_config()).is_ok());
    }

    #[test]
    fn test_abort_unknown_uuid_is_false() {
        let transport = HttpTransport::new(&valid_config()).unwrap();
        assert!(!transport.abort("no-such-delivery"));
        assert_eq!(transport.in_flight_count(), 0);
    }

    fn prepared_request(event: &ViewEvent) -> Request {
        let ambient = Context::new()
            .with_fingerprint("device-123")
            .with_group("session-abc");
        build_request(event, &ambient).unwrap()
    }

    #[test]
    fn test_deliver_without_runtime_fails_through_callback() {
        let transport = HttpTransport::new(&valid_config()).unwrap();

        let event = ViewEvent::new("shelf");
        let seen = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&seen);
        event.completion().arm(
            None,
            Some(Box::new(move |status, kind, code| {
                *slot.lock().unwrap() = Some((status, kind, code));
            })),
        );

        transport.deliver(prepared_request(&event));

        let observed = seen.lock().unwrap().take().unwrap();
        assert_eq!(
            observed,
            (
                OperationStatus::Error,
                Some(TransportErrorKind::Connection),
                None
            )
        );
        assert_eq!(transport.in_flight_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_finished_delivery_clears_in_flight_entry() {
        // Nothing listens here, so the delivery fails fast.
        let config = TelemetryConfig {
            endpoint: Some("http://127.0.0.1:9".to_string()),
            timeout_secs: 2,
            ..valid_config()
        };
        let transport = HttpTransport::new(&config).unwrap();

        let event = ViewEvent::new("shelf");
        let (done_tx, done_rx) = oneshot::channel::<()>();
        event.completion().arm(
            None,
            Some(Box::new(move |_, _, _| {
                let _ = done_tx.send(());
            })),
        );

        transport.deliver(prepared_request(&event));
        done_rx.await.unwrap();

        // Cleanup runs right after the callback, in the same task.
        for _ in 0..100 {
            if transport.in_flight_count() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(transport.in_flight_count(), 0);
        assert!(!transport.abort(event.uuid()));
    }
}
