//! Event model shared by the tracker and the collection endpoint, and the
//! storage seam collected events are kept behind.

pub mod hashmap_event_storage;
pub mod payload;
pub mod selectors;
pub mod traits;
pub mod tracking_event;
