//! Priority-ordered dispatch queue
//!
//! In-memory holding area for prepared requests awaiting transmission.
//! Lower priority values drain first; equal priorities drain in stable
//! insertion order via a monotonic sequence counter. Enqueue is synchronous
//! and unconditional; there is no backpressure and nothing blocks waiting
//! for more items.
//!
//! All operations run on the caller's thread of control; the queue is not
//! shared across threads and carries no internal locking.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use crate::request::Request;

/// A request waiting its turn in the queue. Immutable after enqueue.
#[derive(Debug)]
pub struct QueuedRequest {
    priority: u32,
    seq: u64,
    request: Request,
}

impl QueuedRequest {
    pub fn priority(&self) -> u32 {
        self.priority
    }

    pub fn uuid(&self) -> &str {
        &self.request.uuid
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Hand the request off, consuming the queue entry
    pub fn into_request(self) -> Request {
        self.request
    }
}

impl PartialEq for QueuedRequest {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for QueuedRequest {}

impl PartialOrd for QueuedRequest {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedRequest {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.priority, self.seq).cmp(&(other.priority, other.seq))
    }
}

/// Min-priority queue of prepared requests.
#[derive(Debug)]
pub struct DispatchQueue {
    heap: BinaryHeap<Reverse<QueuedRequest>>,
    next_seq: u64,
    batch_size: usize,
}

impl DispatchQueue {
    /// Create a queue whose default drain amount is `batch_size`
    pub fn new(batch_size: usize) -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_seq: 0,
            batch_size: batch_size.max(1),
        }
    }

    /// Insert a request at the given priority. O(log n), unconditional;
    /// producers are never slowed by queue depth.
    pub fn enqueue(&mut self, priority: u32, request: Request) {
        let seq = self.next_seq;
        self.next_seq += 1;
        tracing::debug!(
            uuid = %request.uuid,
            method = %request.method,
            priority,
            depth = self.heap.len() + 1,
            "request accepted for dispatch"
        );
        self.heap.push(Reverse(QueuedRequest {
            priority,
            seq,
            request,
        }));
    }

    /// Remove up to `amount` items (default: the configured batch size) in
    /// priority order, invoking `mapper` once per removed item. Stops when
    /// the queue runs dry; never waits for more.
    pub fn dequeue<F>(&mut self, mut mapper: F, amount: Option<usize>) -> usize
    where
        F: FnMut(QueuedRequest),
    {
        let limit = amount.unwrap_or(self.batch_size);
        let mut removed = 0;
        while removed < limit {
            match self.heap.pop() {
                Some(Reverse(item)) => {
                    mapper(item);
                    removed += 1;
                }
                None => break,
            }
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::event::{TelemetryEvent, ViewEvent};
    use crate::request::build_request;

    fn ambient() -> Context {
        Context::new()
            .with_fingerprint("device-123")
            .with_group("session-abc")
    }

    fn request(uuid: &str) -> Request {
        let event = ViewEvent::new("shelf").with_uuid(uuid);
        build_request(&event, &ambient()).unwrap()
    }

    fn drain_uuids(queue: &mut DispatchQueue, amount: Option<usize>) -> Vec<String> {
        let mut out = Vec::new();
        queue.dequeue(|item| out.push(item.uuid().to_string()), amount);
        out
    }

    #[test]
    fn test_lower_priority_drains_first() {
        let mut queue = DispatchQueue::new(10);
        queue.enqueue(5, request("p5"));
        queue.enqueue(1, request("p1"));
        queue.enqueue(3, request("p3"));

        assert_eq!(drain_uuids(&mut queue, Some(3)), vec!["p1", "p3", "p5"]);
    }

    #[test]
    fn test_equal_priorities_drain_fifo() {
        let mut queue = DispatchQueue::new(10);
        queue.enqueue(7, request("first"));
        queue.enqueue(7, request("second"));
        queue.enqueue(7, request("third"));

        assert_eq!(
            drain_uuids(&mut queue, None),
            vec!["first", "second", "third"]
        );
    }

    #[test]
    fn test_batch_bound() {
        let mut queue = DispatchQueue::new(10);
        for i in 0..7 {
            queue.enqueue(1, request(&format!("evt-{i}")));
        }

        assert_eq!(drain_uuids(&mut queue, Some(3)).len(), 3);
        assert_eq!(drain_uuids(&mut queue, Some(3)).len(), 3);
        assert_eq!(drain_uuids(&mut queue, Some(3)).len(), 1);
        assert_eq!(drain_uuids(&mut queue, Some(3)).len(), 0);
    }

    #[test]
    fn test_default_amount_is_batch_size() {
        let mut queue = DispatchQueue::new(2);
        for i in 0..5 {
            queue.enqueue(1, request(&format!("evt-{i}")));
        }

        assert_eq!(drain_uuids(&mut queue, None).len(), 2);
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn test_queued_request_keyed_by_event_uuid() {
        let event = ViewEvent::new("shelf");
        let mut queue = DispatchQueue::new(10);
        queue.enqueue(1, build_request(&event, &ambient()).unwrap());

        let drained = drain_uuids(&mut queue, None);
        assert_eq!(drained, vec![event.uuid().to_string()]);
    }

    #[test]
    fn test_zero_batch_size_clamped_to_one() {
        let queue = DispatchQueue::new(0);
        assert_eq!(queue.batch_size(), 1);
    }
}
