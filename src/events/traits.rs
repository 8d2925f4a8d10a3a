use crate::events::tracking_event::TrackingEvent;

/// Selector that can tag relevant events one by one, e.g. by time window or
/// event type. Can carry some immutable state.
pub trait RelevantEventSelector {
    /// Checks whether a single event is relevant. Storage implementations
    /// can also implement their own bulk retrieval on top of this.
    fn is_relevant_event(&self, event: &TrackingEvent) -> bool;
}

/// Interface to store collected events and retrieve them per site.
pub trait EventStorage {
    type RelevantEventSelector: RelevantEventSelector;
    type Error;

    /// Stores a new event under its `domain`.
    fn add_event(&mut self, event: TrackingEvent) -> Result<(), Self::Error>;

    /// Stores a batch in order. Returns the number of stored events.
    fn add_events(
        &mut self,
        events: Vec<TrackingEvent>,
    ) -> Result<usize, Self::Error> {
        let count = events.len();
        for event in events {
            self.add_event(event)?;
        }
        Ok(count)
    }

    /// Retrieves the relevant events for a site, in arrival order. `None`
    /// if nothing was ever collected for `domain`.
    fn get_relevant_events(
        &self,
        domain: &str,
        relevant_event_selector: &Self::RelevantEventSelector,
    ) -> Result<Option<Vec<TrackingEvent>>, Self::Error>;
}
