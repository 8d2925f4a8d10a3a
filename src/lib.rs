//! Privacy-respecting web analytics.
//!
//! The [`tracker`] runs in the visited page: it resolves a visitor and
//! session identity, turns page activity into [`events`] and ships them in
//! batches to a collection endpoint. The optional `server` feature provides
//! that endpoint plus the dashboard queries answered by [`aggregation`].
//!
//! Tracking never fails the host page: delivery and storage problems are
//! logged (with `debug_logging`) and dropped. Opt-out and Do-Not-Track stop
//! all capture and network activity.

pub mod aggregation;
pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod identity;
mod logging;
#[cfg(feature = "server")]
pub mod server;
pub mod tracker;
