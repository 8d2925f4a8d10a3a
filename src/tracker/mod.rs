//! Client-side tracker: captures page activity, keeps it in a delivery
//! queue and ships it to the collection endpoint in batches.
//!
//! The page is reached only through the [`platform::Browser`],
//! [`crate::identity::traits::KeyValueStore`], [`delivery::Transport`] and
//! [`crate::clock::Clock`] seams, so the same state machine runs behind a
//! WebAssembly shim, a native host or the in-memory [`headless`] platform.

pub mod capture;
pub mod delivery;
pub mod headless;
#[cfg(feature = "http")]
pub mod http_transport;
pub mod navigation;
pub mod page_tracker;
pub mod platform;
pub mod timers;
