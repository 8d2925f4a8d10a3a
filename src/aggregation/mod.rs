//! Dashboard queries: the reporting API seam, report types and the service
//! turning raw report rows into dashboard sections.

pub mod event_store_api;
pub mod report;
pub mod service;
pub mod traits;
