//! Integration tests for the terptrace emission pipeline
//!
//! Exercise the end-to-end flow (event → context merge → request → queue →
//! transport → callback) against a mock transport, including the boot
//! sequence with its opt-out gate.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use terptrace_core::{
    ActionEvent, BootOutcome, Context, LabObservationEvent, OperationStatus, OptOutStore,
    Pipeline, Request, Result, TelemetryConfig, TelemetryEvent, Transport, TransportErrorKind,
    ViewEvent,
};

/// How the mock resolves each delivered request's completion
#[derive(Clone, Copy)]
enum Resolution {
    Succeed,
    FailHttp(u16),
    /// Misbehaving transport: resolves success, then failure, then success
    /// again for the same request.
    DoubleResolve,
    /// Never resolves (request considered still in flight)
    Hold,
}

struct MockTransport {
    ping_ok: bool,
    resolution: Resolution,
    ping_calls: AtomicUsize,
    delivered: Mutex<Vec<Request>>,
}

impl MockTransport {
    fn new(ping_ok: bool, resolution: Resolution) -> Self {
        Self {
            ping_ok,
            resolution,
            ping_calls: AtomicUsize::new(0),
            delivered: Mutex::new(Vec::new()),
        }
    }

    fn delivered_uuids(&self) -> Vec<String> {
        self.delivered
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.uuid.clone())
            .collect()
    }

    fn ping_count(&self) -> usize {
        self.ping_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn ping(&self) -> Result<bool> {
        self.ping_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.ping_ok)
    }

    fn deliver(&self, request: Request) {
        let completion = request.completion.clone();
        self.delivered.lock().unwrap().push(request);

        match self.resolution {
            Resolution::Succeed => completion.succeed(OperationStatus::Ok),
            Resolution::FailHttp(code) => completion.fail(
                OperationStatus::Error,
                Some(TransportErrorKind::Http),
                Some(code),
            ),
            Resolution::DoubleResolve => {
                completion.succeed(OperationStatus::Ok);
                completion.fail(
                    OperationStatus::Error,
                    Some(TransportErrorKind::Http),
                    Some(500),
                );
                completion.succeed(OperationStatus::Ok);
            }
            Resolution::Hold => {}
        }
    }

    fn abort(&self, uuid: &str) -> bool {
        self.delivered_uuids().iter().any(|u| u == uuid)
    }
}

struct FixedOptOut(bool);

impl OptOutStore for FixedOptOut {
    fn did_opt_out(&self) -> bool {
        self.0
    }
}

fn pipeline_with_batch(batch_size: usize) -> Pipeline {
    let config = TelemetryConfig {
        endpoint: Some("https://collect.example.com".to_string()),
        api_key: Some("tt_live_test".to_string()),
        partner_code: Some("greenhouse".to_string()),
        location_code: Some("denver-01".to_string()),
        batch_size,
        ..Default::default()
    };
    let ambient = Context::new()
        .with_fingerprint("device-123")
        .with_group("session-abc")
        .with_attr("partner", "greenhouse");
    Pipeline::new(config, ambient)
}

// ============================================
// Dispatch and callback flow
// ============================================

#[test]
fn test_dispatch_drain_invokes_success_callback_once() {
    let mut pipeline = pipeline_with_batch(10);
    let transport = MockTransport::new(true, Resolution::Succeed);

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    let event = ViewEvent::new("product-shelf");
    pipeline
        .dispatch(
            &event,
            Some(Box::new(move |status| {
                assert_eq!(status, OperationStatus::Ok);
                counter.fetch_add(1, Ordering::SeqCst);
            })),
            None,
        )
        .unwrap();

    assert_eq!(pipeline.drain(&transport, None), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(transport.delivered_uuids(), vec![event.uuid().to_string()]);
}

#[test]
fn test_failure_callback_receives_kind_and_code() {
    let mut pipeline = pipeline_with_batch(10);
    let transport = MockTransport::new(true, Resolution::FailHttp(503));

    let seen = Arc::new(Mutex::new(None));
    let slot = Arc::clone(&seen);

    let event = ActionEvent::new("add_to_cart");
    pipeline
        .dispatch(
            &event,
            None,
            Some(Box::new(move |status, kind, code| {
                *slot.lock().unwrap() = Some((status, kind, code));
            })),
        )
        .unwrap();

    pipeline.drain(&transport, None);

    let observed = seen.lock().unwrap().take().unwrap();
    assert_eq!(
        observed,
        (
            OperationStatus::Error,
            Some(TransportErrorKind::Http),
            Some(503)
        )
    );
}

#[test]
fn test_misbehaving_transport_still_delivers_outcome_once() {
    let mut pipeline = pipeline_with_batch(10);
    let transport = MockTransport::new(true, Resolution::DoubleResolve);

    let successes = Arc::new(AtomicUsize::new(0));
    let failures = Arc::new(AtomicUsize::new(0));
    let s = Arc::clone(&successes);
    let f = Arc::clone(&failures);

    let event = ViewEvent::new("product-shelf");
    pipeline
        .dispatch(
            &event,
            Some(Box::new(move |_| {
                s.fetch_add(1, Ordering::SeqCst);
            })),
            Some(Box::new(move |_, _, _| {
                f.fetch_add(1, Ordering::SeqCst);
            })),
        )
        .unwrap();

    pipeline.drain(&transport, None);

    assert_eq!(successes.load(Ordering::SeqCst), 1);
    assert_eq!(failures.load(Ordering::SeqCst), 0);
}

#[test]
fn test_validation_failure_never_reaches_transport() {
    let mut pipeline = pipeline_with_batch(10);
    pipeline.ambient_mut().fingerprint = None;
    let transport = MockTransport::new(true, Resolution::Succeed);

    let event = ViewEvent::new("product-shelf");
    assert!(pipeline.send(&event).is_err());

    assert_eq!(pipeline.drain(&transport, None), 0);
    assert!(transport.delivered_uuids().is_empty());
}

// ============================================
// Priority and batching through the facade
// ============================================

#[test]
fn test_default_priorities_order_actions_before_observations() {
    let mut pipeline = pipeline_with_batch(10);
    let transport = MockTransport::new(true, Resolution::Succeed);

    let observation =
        LabObservationEvent::new("sku-42", serde_json::json!({ "feeling": "relaxed" }));
    let view = ViewEvent::new("product-shelf");
    let action = ActionEvent::new("search");

    pipeline.send(&observation).unwrap();
    pipeline.send(&view).unwrap();
    pipeline.send(&action).unwrap();

    pipeline.drain(&transport, Some(3));

    assert_eq!(
        transport.delivered_uuids(),
        vec![
            action.uuid().to_string(),
            view.uuid().to_string(),
            observation.uuid().to_string(),
        ]
    );
}

#[test]
fn test_drain_respects_batch_size() {
    let mut pipeline = pipeline_with_batch(3);
    let transport = MockTransport::new(true, Resolution::Succeed);

    for i in 0..7 {
        pipeline.send(&ViewEvent::new(format!("screen-{i}"))).unwrap();
    }

    assert_eq!(pipeline.drain(&transport, None), 3);
    assert_eq!(pipeline.drain(&transport, None), 3);
    assert_eq!(pipeline.drain(&transport, None), 1);
    assert_eq!(pipeline.drain(&transport, None), 0);
    assert_eq!(transport.delivered_uuids().len(), 7);
}

// ============================================
// Boot sequence
// ============================================

#[tokio::test]
async fn test_boot_opt_out_short_circuits() {
    let mut pipeline = pipeline_with_batch(10);
    let transport = MockTransport::new(true, Resolution::Succeed);

    pipeline.send(&ViewEvent::new("startup")).unwrap();

    let outcome = pipeline
        .boot(&transport, &FixedOptOut(true))
        .await
        .unwrap();

    assert_eq!(outcome, BootOutcome::OptedOut);
    assert_eq!(transport.ping_count(), 0);
    assert!(transport.delivered_uuids().is_empty());
    assert_eq!(pipeline.pending(), 1);
}

#[tokio::test]
async fn test_boot_pings_then_sends_startup_events() {
    let mut pipeline = pipeline_with_batch(2);
    let transport = MockTransport::new(true, Resolution::Succeed);

    pipeline.send(&ViewEvent::new("startup-1")).unwrap();
    pipeline.send(&ViewEvent::new("startup-2")).unwrap();
    pipeline.send(&ActionEvent::new("launch")).unwrap();

    let outcome = pipeline
        .boot(&transport, &FixedOptOut(false))
        .await
        .unwrap();

    assert_eq!(outcome, BootOutcome::Booted { delivered: 3 });
    assert_eq!(transport.ping_count(), 1);
    assert_eq!(transport.delivered_uuids().len(), 3);
    assert_eq!(pipeline.pending(), 0);
}

#[tokio::test]
async fn test_boot_holds_events_when_ping_fails() {
    let mut pipeline = pipeline_with_batch(10);
    let transport = MockTransport::new(false, Resolution::Succeed);

    pipeline.send(&ViewEvent::new("startup")).unwrap();

    let outcome = pipeline
        .boot(&transport, &FixedOptOut(false))
        .await
        .unwrap();

    assert_eq!(outcome, BootOutcome::PingFailed);
    assert_eq!(transport.ping_count(), 1);
    assert!(transport.delivered_uuids().is_empty());
    assert_eq!(pipeline.pending(), 1);
}

#[tokio::test]
async fn test_opt_out_read_on_each_boot() {
    let mut pipeline = pipeline_with_batch(10);
    let transport = MockTransport::new(true, Resolution::Succeed);

    assert_eq!(
        pipeline.boot(&transport, &FixedOptOut(true)).await.unwrap(),
        BootOutcome::OptedOut
    );
    // Flag cleared elsewhere; the next boot must see the new value.
    assert_eq!(
        pipeline
            .boot(&transport, &FixedOptOut(false))
            .await
            .unwrap(),
        BootOutcome::Booted { delivered: 0 }
    );
}

// ============================================
// Abort correlation
// ============================================

#[test]
fn test_abort_correlates_by_uuid() {
    let mut pipeline = pipeline_with_batch(10);
    let transport = MockTransport::new(true, Resolution::Hold);

    let event = ViewEvent::new("product-shelf");
    pipeline.send(&event).unwrap();

    // Still queued: nothing in flight to abort.
    assert!(!pipeline.abort(&event, &transport));

    pipeline.drain(&transport, None);
    assert!(pipeline.abort(&event, &transport));
}
