use chrono::{DateTime, Utc};

use crate::events::{traits::RelevantEventSelector, tracking_event::TrackingEvent};

/// Selects every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllEvents;

impl RelevantEventSelector for AllEvents {
    fn is_relevant_event(&self, _event: &TrackingEvent) -> bool {
        true
    }
}

/// Selects events whose timestamp falls in `[start, end)`.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeWindowSelector {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindowSelector {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }
}

impl RelevantEventSelector for TimeWindowSelector {
    fn is_relevant_event(&self, event: &TrackingEvent) -> bool {
        event.timestamp >= self.start && event.timestamp < self.end
    }
}
