use std::{collections::HashMap, marker::PhantomData};

use crate::events::{
    traits::{EventStorage, RelevantEventSelector},
    tracking_event::TrackingEvent,
};

/// A simple in-memory event storage. Stores a mapping of domain to the
/// events collected for it, in arrival order. Clones events when asked to
/// retrieve them.
#[derive(Debug)]
pub struct HashMapEventStorage<RES: RelevantEventSelector> {
    domains: HashMap<String, Vec<TrackingEvent>>,
    _phantom: PhantomData<RES>,
}

impl<RES: RelevantEventSelector> Default for HashMapEventStorage<RES> {
    fn default() -> Self {
        Self::new()
    }
}

impl<RES: RelevantEventSelector> HashMapEventStorage<RES> {
    pub fn new() -> Self {
        Self {
            domains: HashMap::new(),
            _phantom: PhantomData,
        }
    }

    pub fn domains(&self) -> impl Iterator<Item = &str> {
        self.domains.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.domains.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<RES> EventStorage for HashMapEventStorage<RES>
where
    RES: RelevantEventSelector,
{
    type RelevantEventSelector = RES;
    type Error = anyhow::Error;

    fn add_event(&mut self, event: TrackingEvent) -> Result<(), Self::Error> {
        if event.domain.is_empty() {
            anyhow::bail!(
                "event {} has no domain",
                event.event_type.as_str()
            );
        }
        self.domains
            .entry(event.domain.clone())
            .or_default()
            .push(event);
        Ok(())
    }

    fn get_relevant_events(
        &self,
        domain: &str,
        selector: &RES,
    ) -> Result<Option<Vec<TrackingEvent>>, Self::Error> {
        let events = self.domains.get(domain).map(|events| {
            events
                .iter()
                .filter(|event| selector.is_relevant_event(event))
                .cloned()
                .collect()
        });
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{
        selectors::AllEvents,
        tracking_event::{EventData, EventType},
    };

    fn event(domain: &str, event_type: EventType) -> TrackingEvent {
        TrackingEvent {
            event_type,
            page_url: "https://example.com/".to_string(),
            page_title: String::new(),
            referrer: String::new(),
            session_id: "sess_1".to_string(),
            user_id: "user_1".to_string(),
            domain: domain.to_string(),
            event_data: EventData::new(),
            timestamp: Default::default(),
            context: Default::default(),
        }
    }

    #[test]
    fn test_hash_map_event_storage() {
        let mut storage = HashMapEventStorage::<AllEvents>::new();
        storage
            .add_events(vec![
                event("a.com", EventType::Pageview),
                event("b.com", EventType::Pageview),
                event("a.com", EventType::Click),
            ])
            .unwrap();
        assert_eq!(storage.len(), 3);

        let events = storage
            .get_relevant_events("a.com", &AllEvents)
            .unwrap()
            .unwrap();
        let types: Vec<_> = events.iter().map(|e| e.event_type).collect();
        assert_eq!(types, vec![EventType::Pageview, EventType::Click]);

        // Domain never seen
        assert!(storage
            .get_relevant_events("c.com", &AllEvents)
            .unwrap()
            .is_none());

        // Events without a domain are rejected
        assert!(storage.add_event(event("", EventType::Click)).is_err());
    }
}
