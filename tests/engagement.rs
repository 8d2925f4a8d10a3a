use zpanalytics::{
    clock::ManualClock,
    config::TrackingConfig,
    events::tracking_event::{EventType, EventValue, TrackingEvent},
    identity::hashmap_storage::HashMapStorage,
    tracker::{
        capture::{ClickDisposition, ClickTarget, FormTarget, ScrollMetrics},
        headless::{HeadlessBrowser, RecordingTransport},
        page_tracker::Tracker,
    },
};

type TestTracker =
    Tracker<HashMapStorage, RecordingTransport, HeadlessBrowser, ManualClock>;

fn page_load(config: TrackingConfig) -> (TestTracker, ManualClock) {
    let clock = ManualClock::new(1_717_000_000_000);
    let mut tracker = Tracker::new(
        config,
        HashMapStorage::new(),
        RecordingTransport::new(),
        HeadlessBrowser::new("https://example.com/article"),
        clock.clone(),
    )
    .unwrap();
    tracker.start().unwrap();
    (tracker, clock)
}

fn of_type(events: &[TrackingEvent], event_type: EventType) -> Vec<TrackingEvent> {
    events
        .iter()
        .filter(|e| e.event_type == event_type)
        .cloned()
        .collect()
}

fn int(event: &TrackingEvent, key: &str) -> Option<i64> {
    event.data(key).and_then(EventValue::as_i64)
}

fn scroll_to(percent: f64) -> ScrollMetrics {
    ScrollMetrics::new(percent / 100.0 * 2000.0, 3000.0, 1000.0)
}

#[test]
fn main() {
    scroll_depth();
    time_on_page();
    outbound_links();
    forms_and_visibility();
}

fn scroll_depth() {
    let (mut tracker, clock) = page_load(TrackingConfig::new("example.com"));

    for percent in [30.0, 60.0, 95.0] {
        tracker.handle_scroll(scroll_to(percent));
        clock.advance(150);
        tracker.run_timers();
    }
    // Scrolling back up and down again re-fires nothing.
    tracker.handle_scroll(scroll_to(10.0));
    clock.advance(150);
    tracker.run_timers();
    tracker.handle_scroll(scroll_to(100.0));
    clock.advance(150);
    tracker.run_timers();

    assert!(tracker.flush().is_sent());
    let scrolls = of_type(&tracker.transport().events(), EventType::Scroll);
    let depths: Vec<_> = scrolls.iter().map(|e| int(e, "depth")).collect();
    assert_eq!(depths, vec![Some(25), Some(50), Some(75), Some(90)]);
    let max_depths: Vec<_> = scrolls.iter().map(|e| int(e, "max_depth")).collect();
    assert_eq!(max_depths, vec![Some(30), Some(60), Some(95), Some(95)]);

    // A burst of scroll events is evaluated once, at its last position.
    let (mut tracker, clock) = page_load(TrackingConfig::new("example.com"));
    for percent in [10.0, 20.0, 55.0] {
        tracker.handle_scroll(scroll_to(percent));
        clock.advance(40);
        assert_eq!(tracker.run_timers(), 0);
    }
    clock.advance(60);
    assert_eq!(tracker.run_timers(), 1);
    let queued: Vec<_> = tracker
        .queued_events()
        .iter()
        .map(|e| int(e, "depth"))
        .collect();
    assert_eq!(queued, vec![Some(25), Some(50)]);
}

fn time_on_page() {
    for (seconds, expected) in [(5, None), (15, Some(false)), (35, Some(true))] {
        let (mut tracker, clock) = page_load(TrackingConfig::new("example.com"));
        clock.advance(seconds * 1000);
        tracker.handle_unload();

        let reports = of_type(&tracker.transport().events(), EventType::TimeOnPage);
        match expected {
            None => assert!(reports.is_empty(), "{seconds}s should not report"),
            Some(engaged) => {
                assert_eq!(reports.len(), 1);
                assert_eq!(int(&reports[0], "duration"), Some(seconds));
                assert_eq!(
                    reports[0].data("engaged").and_then(EventValue::as_bool),
                    Some(engaged)
                );
            }
        }

        // A second unload never reports again.
        clock.advance(60_000);
        tracker.handle_unload();
        let reports = of_type(&tracker.transport().events(), EventType::TimeOnPage);
        assert!(reports.len() <= 1);
    }
}

fn outbound_links() {
    let (mut tracker, clock) = page_load(TrackingConfig::new("example.com"));
    tracker.transport_mut().clear();

    let link = ClickTarget::link("https://partner.org/offer", "partner.org")
        .with_text("  Partner offer ")
        .with_class_name("cta external");
    assert_eq!(tracker.handle_click(&link), ClickDisposition::Deferred);

    // The click was dispatched before any navigation happened.
    let clicks = of_type(&tracker.transport().events(), EventType::Click);
    assert_eq!(clicks.len(), 1);
    assert_eq!(clicks[0].data("outbound").and_then(EventValue::as_bool), Some(true));
    assert_eq!(clicks[0].data("text").and_then(EventValue::as_str), Some("Partner offer"));
    assert_eq!(
        clicks[0].data("classes").and_then(EventValue::as_str),
        Some("cta external")
    );
    assert!(tracker.browser().navigations().is_empty());

    clock.advance(99);
    tracker.run_timers();
    assert!(tracker.browser().navigations().is_empty());
    clock.advance(1);
    tracker.run_timers();
    assert_eq!(tracker.browser().navigations(), ["https://partner.org/offer"]);

    // Internal links proceed and carry no outbound flag.
    let (mut tracker, _) = page_load(TrackingConfig::new("example.com"));
    let internal = ClickTarget::link("https://example.com/pricing", "example.com");
    assert_eq!(tracker.handle_click(&internal), ClickDisposition::Proceed);
    assert!(tracker.queued_events()[0].data("outbound").is_none());

    // Without outbound tracking the browser navigates on its own.
    let (mut tracker, clock) =
        page_load(TrackingConfig::new("example.com").with_track_outbound(false));
    assert_eq!(tracker.handle_click(&link), ClickDisposition::Proceed);
    assert_eq!(tracker.queued_events().len(), 1);
    clock.advance(1_000);
    tracker.run_timers();
    assert!(tracker.browser().navigations().is_empty());
}

fn forms_and_visibility() {
    let (mut tracker, clock) = page_load(TrackingConfig::new("example.com"));
    tracker.transport_mut().clear();

    // Form submissions are sent right away.
    tracker.handle_submit(&FormTarget {
        id: Some("newsletter".to_string()),
        action: Some("/subscribe".to_string()),
        method: Some("post".to_string()),
    });
    let forms = of_type(&tracker.transport().events(), EventType::FormSubmit);
    assert_eq!(forms.len(), 1);
    assert_eq!(forms[0].data("form_method").and_then(EventValue::as_str), Some("POST"));

    // Hiding the page reports blur and the time on page, once.
    clock.advance(12_000);
    tracker.handle_visibility_change(true);
    tracker.handle_visibility_change(false);
    clock.advance(40_000);
    tracker.handle_visibility_change(true);
    tracker.handle_unload();

    let events = tracker.transport().events();
    let blurs = of_type(&events, EventType::PageBlur);
    assert_eq!(blurs.len(), 2);
    assert_eq!(int(&blurs[0], "session_duration"), Some(12_000));
    assert_eq!(int(&blurs[1], "session_duration"), Some(52_000));
    assert_eq!(of_type(&events, EventType::PageFocus).len(), 1);
    let reports = of_type(&events, EventType::TimeOnPage);
    assert_eq!(reports.len(), 1);
    assert_eq!(int(&reports[0], "duration"), Some(12));

    // Form tracking can be turned off.
    let (mut tracker, _) =
        page_load(TrackingConfig::new("example.com").with_track_forms(false));
    tracker.handle_submit(&FormTarget {
        id: None,
        action: None,
        method: None,
    });
    assert!(of_type(&tracker.transport().events(), EventType::FormSubmit).is_empty());
    assert!(tracker.queued_events().is_empty());
}
