use serde::{Deserialize, Serialize};

use crate::events::tracking_event::TrackingEvent;

/// Canonical wire format sent by the tracker: `{"events": [...]}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventBatch {
    pub events: Vec<TrackingEvent>,
}

impl EventBatch {
    pub fn new(events: Vec<TrackingEvent>) -> Self {
        Self { events }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Body accepted by the collection endpoint: a batch, or a single event from
/// simpler senders.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum CollectPayload {
    Batch(EventBatch),
    Single(Box<TrackingEvent>),
}

impl CollectPayload {
    pub fn from_slice(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }

    pub fn into_events(self) -> Vec<TrackingEvent> {
        match self {
            CollectPayload::Batch(batch) => batch.events,
            CollectPayload::Single(event) => vec![*event],
        }
    }
}
