//! Visitor/session identity and the persisted privacy preference, kept
//! behind the browser storage seam.

pub mod hashmap_storage;
pub mod resolver;
pub mod traits;
