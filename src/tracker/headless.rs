//! In-memory platform for driving a tracker without a browser: server-side
//! rendering hosts, replay tools and tests.

use crate::{
    error::DeliveryError,
    events::{
        payload::EventBatch,
        tracking_event::{DeviceContext, TrackingEvent},
    },
    tracker::{
        delivery::{DeliveryMethod, Transport},
        platform::{Browser, Location, ReadyState},
    },
};

/// A page that only exists in memory. Navigations are recorded and applied
/// to the location.
#[derive(Debug, Clone)]
pub struct HeadlessBrowser {
    location: Location,
    title: String,
    referrer: String,
    do_not_track: bool,
    ready_state: ReadyState,
    device: DeviceContext,
    navigations: Vec<String>,
}

impl HeadlessBrowser {
    pub fn new(href: &str) -> Self {
        Self {
            location: Location::parse(href),
            title: String::new(),
            referrer: String::new(),
            do_not_track: false,
            ready_state: ReadyState::Complete,
            device: DeviceContext::default(),
            navigations: Vec::new(),
        }
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }

    pub fn with_referrer(mut self, referrer: &str) -> Self {
        self.referrer = referrer.to_string();
        self
    }

    pub fn with_do_not_track(mut self, do_not_track: bool) -> Self {
        self.do_not_track = do_not_track;
        self
    }

    pub fn with_ready_state(mut self, ready_state: ReadyState) -> Self {
        self.ready_state = ready_state;
        self
    }

    pub fn with_device(mut self, device: DeviceContext) -> Self {
        self.device = device;
        self
    }

    /// Changes the URL without a navigation, like `history.pushState`.
    pub fn set_location(&mut self, href: &str) {
        self.location = Location::parse(href);
    }

    pub fn set_title(&mut self, title: &str) {
        self.title = title.to_string();
    }

    pub fn set_ready_state(&mut self, ready_state: ReadyState) {
        self.ready_state = ready_state;
    }

    /// Full navigations performed through [`Browser::navigate`].
    pub fn navigations(&self) -> &[String] {
        &self.navigations
    }
}

impl Browser for HeadlessBrowser {
    fn location(&self) -> Location {
        self.location.clone()
    }

    fn title(&self) -> String {
        self.title.clone()
    }

    fn referrer(&self) -> String {
        self.referrer.clone()
    }

    fn do_not_track(&self) -> bool {
        self.do_not_track
    }

    fn ready_state(&self) -> ReadyState {
        self.ready_state
    }

    fn device_context(&self) -> DeviceContext {
        self.device.clone()
    }

    fn navigate(&mut self, href: &str) {
        self.navigations.push(href.to_string());
        self.location = Location::parse(href);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SentRequest {
    pub method: DeliveryMethod,
    pub endpoint: String,
    pub body: String,
}

impl SentRequest {
    pub fn batch(&self) -> Option<EventBatch> {
        serde_json::from_str(&self.body).ok()
    }
}

/// Transport that keeps every dispatched body instead of sending it.
#[derive(Debug, Clone)]
pub struct RecordingTransport {
    beacon_available: bool,
    reject_beacons: bool,
    fail_requests: bool,
    sent: Vec<SentRequest>,
}

impl Default for RecordingTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self {
            beacon_available: true,
            reject_beacons: false,
            fail_requests: false,
            sent: Vec::new(),
        }
    }

    pub fn without_beacon() -> Self {
        Self {
            beacon_available: false,
            ..Self::new()
        }
    }

    pub fn rejecting_beacons(mut self) -> Self {
        self.reject_beacons = true;
        self
    }

    pub fn failing_requests(mut self) -> Self {
        self.fail_requests = true;
        self
    }

    pub fn sent(&self) -> &[SentRequest] {
        &self.sent
    }

    /// All delivered events, across batches, in dispatch order.
    pub fn events(&self) -> Vec<TrackingEvent> {
        self.sent
            .iter()
            .filter_map(SentRequest::batch)
            .flat_map(|batch| batch.events)
            .collect()
    }

    pub fn clear(&mut self) {
        self.sent.clear();
    }
}

impl Transport for RecordingTransport {
    fn beacon_available(&self) -> bool {
        self.beacon_available
    }

    fn send_beacon(&mut self, endpoint: &str, body: &str) -> bool {
        if self.reject_beacons {
            return false;
        }
        self.sent.push(SentRequest {
            method: DeliveryMethod::Beacon,
            endpoint: endpoint.to_string(),
            body: body.to_string(),
        });
        true
    }

    fn post(&mut self, endpoint: &str, body: &str) -> Result<(), DeliveryError> {
        if self.fail_requests {
            return Err(DeliveryError::Request {
                endpoint: endpoint.to_string(),
                reason: "network unreachable".to_string(),
            });
        }
        self.sent.push(SentRequest {
            method: DeliveryMethod::Request,
            endpoint: endpoint.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_parse() {
        let location =
            Location::parse("https://user@shop.example.com:8443/cart?x=1#top");
        assert_eq!(location.hostname, "shop.example.com");
        assert_eq!(location.pathname, "/cart");

        let mut browser = HeadlessBrowser::new("https://example.com/a");
        browser.navigate("https://elsewhere.org/");
        assert_eq!(browser.location().hostname, "elsewhere.org");
        assert_eq!(browser.navigations(), ["https://elsewhere.org/"]);
    }
}
