use std::mem;

use crate::{
    error::DeliveryError,
    events::{payload::EventBatch, tracking_event::TrackingEvent},
};

/// Network seam used to dispatch batches. Implementations must not block
/// on the response: a request is dispatched and forgotten.
pub trait Transport {
    /// Whether a beacon-style transport (`navigator.sendBeacon`) exists.
    fn beacon_available(&self) -> bool;

    /// Hands `body` to the beacon transport. Returns false if the platform
    /// refused to queue it.
    fn send_beacon(&mut self, endpoint: &str, body: &str) -> bool;

    /// Dispatches an asynchronous JSON POST, best effort, no retry.
    fn post(&mut self, endpoint: &str, body: &str) -> Result<(), DeliveryError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMethod {
    Beacon,
    Request,
}

/// Result of one flush. Failures are reported here for observability only;
/// the events are gone either way.
#[derive(Debug)]
pub enum FlushOutcome {
    /// Nothing was queued.
    Empty,
    /// Tracking is disabled; the queue was left untouched.
    Skipped,
    Sent {
        method: DeliveryMethod,
        events: usize,
    },
    Failed {
        events: usize,
        error: DeliveryError,
    },
}

impl FlushOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, FlushOutcome::Sent { .. })
    }
}

/// Pending events in emission order.
#[derive(Debug, Default)]
pub struct DeliveryQueue {
    pending: Vec<TrackingEvent>,
}

impl DeliveryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an event. Returns true if its type asks for an immediate
    /// flush.
    pub fn enqueue(&mut self, event: TrackingEvent) -> bool {
        let priority = event.event_type.is_priority();
        self.pending.push(event);
        priority
    }

    /// Swaps the pending events for an empty queue and returns them as one
    /// batch, or `None` if nothing is pending.
    pub fn take_batch(&mut self) -> Option<EventBatch> {
        if self.pending.is_empty() {
            return None;
        }
        Some(EventBatch::new(mem::take(&mut self.pending)))
    }

    pub fn pending(&self) -> &[TrackingEvent] {
        &self.pending
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Sends one batch, preferring the beacon transport and falling back to a
/// plain request when no beacon is available or it was refused.
pub fn deliver<T: Transport + ?Sized>(
    transport: &mut T,
    endpoint: &str,
    batch: &EventBatch,
) -> Result<DeliveryMethod, DeliveryError> {
    let body = batch.to_json()?;

    if transport.beacon_available() && transport.send_beacon(endpoint, &body)
    {
        return Ok(DeliveryMethod::Beacon);
    }

    transport.post(endpoint, &body)?;
    Ok(DeliveryMethod::Request)
}
