use rand::{rngs::StdRng, SeedableRng};
use serde::Serialize;

use crate::{
    clock::Clock,
    config::TrackingConfig,
    error::{ConfigurationError, TrackerError},
    events::tracking_event::{EventData, EventType, EventValue, TrackingEvent},
    identity::{
        resolver::{
            read_opt_out, resolve_identity, write_opt_out, IdentityResolution,
            VisitorIdentity,
        },
        traits::KeyValueStore,
    },
    logging::debug_log,
    tracker::{
        capture::{
            click_data, form_data, scroll_data, time_on_page_data,
            ClickDisposition, ClickTarget, EngagementTimer, FormTarget,
            ScrollDepthTracker, ScrollMetrics, OUTBOUND_NAVIGATION_DELAY_MS,
            SCROLL_DEBOUNCE_MS,
        },
        delivery::{deliver, DeliveryQueue, FlushOutcome, Transport},
        navigation::{NavigationSignal, NavigationWatcher},
        platform::{Browser, ReadyState},
        timers::{TimerQueue, TimerTask},
    },
};

/// Lifecycle of a tracker within one page load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerState {
    Uninitialized,
    Initializing,
    Active,
    /// Turned off at runtime; nothing is captured or sent.
    Disabled,
    /// Opt-out flag or Do-Not-Track found at start. Terminal for this page
    /// load.
    OptedOut,
}

/// Returned by [`Tracker::get_session`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub session_id: Option<String>,
    pub user_id: Option<String>,
    pub domain: String,
}

/// Page-load tracker, generic over its platform seams.
///
/// Single-threaded: the host forwards DOM signals (`handle_*`), calls
/// [`Tracker::run_timers`] when [`Tracker::next_timer_deadline`] passes, and
/// exposes the public API methods to the page. All mutable tracking state
/// lives here; nothing is global.
pub struct Tracker<S, T, B, C>
where
    S: KeyValueStore,
    T: Transport,
    B: Browser,
    C: Clock,
{
    config: TrackingConfig,
    storage: S,
    transport: T,
    browser: B,
    clock: C,
    rng: StdRng,

    state: TrackerState,
    identity: Option<VisitorIdentity>,
    /// Opt-out requested while storage could not persist it.
    opted_out_in_memory: bool,
    listeners_installed: bool,
    page_view_pending: bool,
    page_views: u32,

    queue: DeliveryQueue,
    timers: TimerQueue,
    navigation: NavigationWatcher,
    scroll: ScrollDepthTracker,
    pending_scroll: Option<ScrollMetrics>,
    engagement: EngagementTimer,
}

impl<S, T, B, C> Tracker<S, T, B, C>
where
    S: KeyValueStore,
    T: Transport,
    B: Browser,
    C: Clock,
{
    /// Creates a tracker in the `Uninitialized` state. Fails fast on an
    /// invalid configuration.
    pub fn new(
        config: TrackingConfig,
        storage: S,
        transport: T,
        browser: B,
        clock: C,
    ) -> Result<Self, ConfigurationError> {
        config.validate()?;
        let now = clock.now_millis();
        let initial_path = browser.location().pathname;

        Ok(Self {
            config,
            storage,
            transport,
            browser,
            clock,
            rng: StdRng::from_entropy(),
            state: TrackerState::Uninitialized,
            identity: None,
            opted_out_in_memory: false,
            listeners_installed: false,
            page_view_pending: false,
            page_views: 0,
            queue: DeliveryQueue::new(),
            timers: TimerQueue::new(),
            navigation: NavigationWatcher::new(initial_path),
            scroll: ScrollDepthTracker::new(),
            pending_scroll: None,
            engagement: EngagementTimer::new(now),
        })
    }

    /// Replaces the id generator's randomness, e.g. with a seeded one.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    /// Resolves the identity, arms the periodic flush and, with auto
    /// tracking, installs listeners and captures the initial page view.
    pub fn start(&mut self) -> Result<TrackerState, TrackerError> {
        if self.state != TrackerState::Uninitialized {
            return Err(TrackerError::AlreadyStarted);
        }
        self.state = TrackerState::Initializing;

        let now = self.clock.now_millis();
        self.engagement = EngagementTimer::new(now);
        self.navigation = NavigationWatcher::new(self.browser.location().pathname);
        self.scroll = ScrollDepthTracker::new();
        self.page_views = 0;

        let resolution = resolve_identity(
            &self.config,
            &mut self.storage,
            self.browser.do_not_track(),
            now,
            &mut self.rng,
        );
        match resolution {
            IdentityResolution::Suppressed(reason) => {
                debug_log!(self.debug(), "tracking suppressed: {reason:?}");
                self.state = TrackerState::OptedOut;
                return Ok(self.state);
            }
            IdentityResolution::Resolved(identity) => {
                self.identity = Some(identity);
            }
        }

        self.state = TrackerState::Active;
        self.timers
            .schedule(now + self.flush_interval(), TimerTask::Flush);

        if self.config.auto_track {
            self.listeners_installed = true;
            if self.browser.ready_state() == ReadyState::Loading {
                self.page_view_pending = true;
            } else {
                self.track_page_view();
            }
        }

        debug_log!(self.debug(), "analytics initialized: {:?}", self.config);
        Ok(self.state)
    }

    /// Makes a last delivery attempt and tears everything down. The tracker
    /// can be started again afterwards. Navigations held back by
    /// [`Tracker::handle_click`] are performed now rather than dropped.
    pub fn stop(&mut self) -> FlushOutcome {
        let outcome = self.flush();
        for task in self.timers.drain() {
            if let TimerTask::Navigate(href) = task {
                self.browser.navigate(&href);
            }
        }
        self.listeners_installed = false;
        self.page_view_pending = false;
        self.pending_scroll = None;
        self.identity = None;
        self.state = TrackerState::Uninitialized;
        outcome
    }

    // Public runtime API

    /// Emits a custom event named `event_name`.
    pub fn track(&mut self, event_name: &str, data: EventData) -> bool {
        let mut event_data = EventData::new();
        event_data.insert("event_name".to_string(), event_name.into());
        event_data.extend(data);
        self.capture_event(EventType::Custom, event_data)
    }

    /// Emits a manual page view, defaulting to the current URL and title.
    pub fn page(&mut self, url: Option<&str>, title: Option<&str>) -> bool {
        self.capture_page_view(url, title)
    }

    /// Resumes tracking after [`Tracker::disable`]. Has no effect while
    /// the visitor is opted out; only [`Tracker::opt_in`] lifts that.
    pub fn enable(&mut self) {
        if self.has_opted_out() {
            debug_log!(self.debug(), "visitor opted out, not enabling");
            return;
        }
        if self.state == TrackerState::Disabled {
            self.state = TrackerState::Active;
            debug_log!(self.debug(), "tracking enabled");
        }
    }

    pub fn disable(&mut self) {
        if self.state == TrackerState::Active {
            self.state = TrackerState::Disabled;
            debug_log!(self.debug(), "tracking disabled");
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.state == TrackerState::Active
    }

    /// Stops tracking and persists the preference. Already queued events
    /// stay queued but are not sent while opted out.
    pub fn opt_out(&mut self) {
        self.disable();
        self.opted_out_in_memory = true;
        if let Err(e) = write_opt_out(&mut self.storage, true) {
            debug_log!(self.debug(), "cannot persist opt-out: {e}");
        }
        debug_log!(self.debug(), "user opted out of tracking");
    }

    pub fn opt_in(&mut self) {
        self.opted_out_in_memory = false;
        if let Err(e) = write_opt_out(&mut self.storage, false) {
            debug_log!(self.debug(), "cannot clear opt-out: {e}");
        }
        self.enable();
        debug_log!(self.debug(), "user opted in to tracking");
    }

    pub fn has_opted_out(&self) -> bool {
        self.opted_out_in_memory
            || read_opt_out(&self.storage).unwrap_or(false)
    }

    pub fn get_session(&self) -> SessionInfo {
        SessionInfo {
            session_id: self.identity.as_ref().map(|i| i.session_id.clone()),
            user_id: self.identity.as_ref().map(|i| i.visitor_id.clone()),
            domain: self.config.domain.clone(),
        }
    }

    // Capture

    /// Builds an event for the current page and enqueues it. Returns false
    /// when tracking is not active. Priority events are flushed right away.
    pub fn capture_event(&mut self, event_type: EventType, data: EventData) -> bool {
        self.enqueue_event(event_type, data, None, None)
    }

    fn capture_page_view(&mut self, url: Option<&str>, title: Option<&str>) -> bool {
        if !self.is_capturing() {
            return false;
        }
        self.page_views += 1;
        let mut data = EventData::new();
        data.insert("page_views".to_string(), self.page_views.into());
        self.enqueue_event(EventType::Pageview, data, url, title)
    }

    fn track_page_view(&mut self) -> bool {
        self.capture_page_view(None, None)
    }

    fn enqueue_event(
        &mut self,
        event_type: EventType,
        data: EventData,
        page_url: Option<&str>,
        page_title: Option<&str>,
    ) -> bool {
        let Some(identity) = self.identity.as_ref().filter(|_| self.is_active())
        else {
            debug_log!(
                self.debug(),
                "tracking disabled, skipping {} event",
                event_type.as_str()
            );
            return false;
        };

        let event = TrackingEvent {
            event_type,
            page_url: page_url
                .map(str::to_string)
                .unwrap_or_else(|| self.browser.location().href),
            page_title: page_title
                .map(str::to_string)
                .unwrap_or_else(|| self.browser.title()),
            referrer: self.browser.referrer(),
            session_id: identity.session_id.clone(),
            user_id: identity.visitor_id.clone(),
            domain: self.config.domain.clone(),
            event_data: data,
            timestamp: self.clock.now(),
            context: self.browser.device_context(),
        };

        debug_log!(self.debug(), "captured {} event", event_type.as_str());
        if self.queue.enqueue(event) {
            self.flush();
        }
        true
    }

    /// Sends everything queued as one batch. Never fails: delivery errors
    /// are logged and the events dropped.
    pub fn flush(&mut self) -> FlushOutcome {
        if !self.is_active() {
            return FlushOutcome::Skipped;
        }
        let Some(batch) = self.queue.take_batch() else {
            return FlushOutcome::Empty;
        };

        let events = batch.events.len();
        match deliver(
            &mut self.transport,
            &self.config.collection_endpoint,
            &batch,
        ) {
            Ok(method) => {
                debug_log!(self.debug(), "sent {events} events via {method:?}");
                FlushOutcome::Sent { method, events }
            }
            Err(error) => {
                debug_log!(self.debug(), "failed to send {events} events: {error}");
                FlushOutcome::Failed { events, error }
            }
        }
    }

    // DOM signals

    /// `DOMContentLoaded`: captures the initial page view if it waited for
    /// the document.
    pub fn handle_dom_ready(&mut self) {
        if self.page_view_pending {
            self.page_view_pending = false;
            self.track_page_view();
        }
    }

    /// Delegated click on a link or button. Outbound links are held back
    /// when `track_outbound` is set: the click is captured and flushed
    /// first, and navigation continues after a short delay.
    pub fn handle_click(&mut self, target: &ClickTarget) -> ClickDisposition {
        if !self.listeners_installed || !self.is_capturing() {
            return ClickDisposition::Proceed;
        }

        let current_hostname = self.browser.location().hostname;
        let outbound = target.is_outbound(&current_hostname);
        self.capture_event(EventType::Click, click_data(target, outbound));

        match target.href.as_ref() {
            Some(href) if outbound && self.config.track_outbound => {
                self.flush();
                let due_at = self.clock.now_millis() + OUTBOUND_NAVIGATION_DELAY_MS;
                self.timers
                    .schedule(due_at, TimerTask::Navigate(href.clone()));
                ClickDisposition::Deferred
            }
            _ => ClickDisposition::Proceed,
        }
    }

    /// Form submission. Never blocks the submit.
    pub fn handle_submit(&mut self, form: &FormTarget) {
        if self.listeners_installed && self.config.track_forms {
            self.capture_event(EventType::FormSubmit, form_data(form));
        }
    }

    /// Raw scroll event. Evaluated once the page stopped scrolling for
    /// [`SCROLL_DEBOUNCE_MS`].
    pub fn handle_scroll(&mut self, metrics: ScrollMetrics) {
        if !self.listeners_installed {
            return;
        }
        self.pending_scroll = Some(metrics);
        let due_at = self.clock.now_millis() + SCROLL_DEBOUNCE_MS;
        self.timers.reschedule(due_at, TimerTask::ScrollSettled);
    }

    /// `visibilitychange`. Hiding the page reports blur and, once, the time
    /// on page.
    pub fn handle_visibility_change(&mut self, hidden: bool) {
        if !self.listeners_installed {
            return;
        }
        if hidden {
            let elapsed = self.engagement.elapsed_millis(self.clock.now_millis());
            let mut data = EventData::new();
            data.insert("session_duration".to_string(), EventValue::from(elapsed));
            self.capture_event(EventType::PageBlur, data);
            self.report_time_on_page();
        } else {
            self.capture_event(EventType::PageFocus, EventData::new());
        }
    }

    /// `beforeunload`/`pagehide`: reports time on page and makes the last
    /// delivery attempt.
    pub fn handle_unload(&mut self) -> FlushOutcome {
        if self.listeners_installed {
            self.report_time_on_page();
        }
        self.flush()
    }

    /// Client-side route change.
    pub fn handle_navigation(&mut self, signal: NavigationSignal) {
        if signal.is_deferred() {
            let now = self.clock.now_millis();
            self.timers.schedule(now, TimerTask::NavigationCheck);
        } else {
            self.check_navigation();
        }
    }

    // Timers

    pub fn next_timer_deadline(&self) -> Option<i64> {
        self.timers.next_deadline()
    }

    /// Runs every timer task due at the current time. Returns how many ran.
    pub fn run_timers(&mut self) -> usize {
        let now = self.clock.now_millis();
        let mut ran = 0;
        while let Some(task) = self.timers.pop_due(now) {
            ran += 1;
            match task {
                TimerTask::Flush => {
                    self.flush();
                    self.timers
                        .schedule(now + self.flush_interval(), TimerTask::Flush);
                }
                TimerTask::ScrollSettled => self.evaluate_scroll(),
                TimerTask::NavigationCheck => self.check_navigation(),
                TimerTask::Navigate(href) => self.browser.navigate(&href),
            }
        }
        ran
    }

    fn evaluate_scroll(&mut self) {
        let Some(metrics) = self.pending_scroll.take() else {
            return;
        };
        if !self.is_capturing() {
            return;
        }
        let Some(percent) = metrics.percent() else {
            return;
        };
        for checkpoint in self.scroll.observe(percent) {
            self.capture_event(EventType::Scroll, scroll_data(checkpoint, percent));
        }
    }

    fn check_navigation(&mut self) {
        let pathname = self.browser.location().pathname;
        if self.navigation.observe(&pathname) && self.config.auto_track {
            debug_log!(self.debug(), "navigation to {pathname}");
            self.track_page_view();
        }
    }

    fn report_time_on_page(&mut self) {
        if !self.is_capturing() {
            return;
        }
        let now = self.clock.now_millis();
        if let Some(time_on_page) = self.engagement.measure(now) {
            self.capture_event(EventType::TimeOnPage, time_on_page_data(time_on_page));
        }
    }

    // Accessors

    pub fn state(&self) -> TrackerState {
        self.state
    }

    pub fn config(&self) -> &TrackingConfig {
        &self.config
    }

    pub fn identity(&self) -> Option<&VisitorIdentity> {
        self.identity.as_ref()
    }

    pub fn queued_events(&self) -> &[TrackingEvent] {
        self.queue.pending()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn browser(&self) -> &B {
        &self.browser
    }

    pub fn browser_mut(&mut self) -> &mut B {
        &mut self.browser
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    fn is_active(&self) -> bool {
        self.state == TrackerState::Active
    }

    fn is_capturing(&self) -> bool {
        self.is_active() && self.identity.is_some()
    }

    fn debug(&self) -> bool {
        self.config.debug_logging
    }

    fn flush_interval(&self) -> i64 {
        i64::try_from(self.config.flush_interval_ms).unwrap_or(i64::MAX / 2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        clock::ManualClock,
        identity::hashmap_storage::HashMapStorage,
        tracker::{
            delivery::DeliveryMethod,
            headless::{HeadlessBrowser, RecordingTransport},
        },
    };

    type TestTracker =
        Tracker<HashMapStorage, RecordingTransport, HeadlessBrowser, ManualClock>;

    fn page_load(config: TrackingConfig, browser: HeadlessBrowser) -> (TestTracker, ManualClock) {
        let clock = ManualClock::new(1_700_000_000_000);
        let tracker = Tracker::new(
            config,
            HashMapStorage::new(),
            RecordingTransport::new(),
            browser,
            clock.clone(),
        )
        .unwrap()
        .with_rng(StdRng::seed_from_u64(42));
        (tracker, clock)
    }

    #[test]
    fn test_start_sends_initial_page_view() {
        let (mut tracker, _) = page_load(
            TrackingConfig::new("example.com"),
            HeadlessBrowser::new("https://example.com/").with_title("Home"),
        );
        assert_eq!(tracker.start().unwrap(), TrackerState::Active);
        assert!(matches!(tracker.start(), Err(TrackerError::AlreadyStarted)));

        let sent = tracker.transport().sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].method, DeliveryMethod::Beacon);
        assert_eq!(sent[0].endpoint, "/api/analytics/track");

        let events = tracker.transport().events();
        assert_eq!(events[0].event_type, EventType::Pageview);
        assert_eq!(events[0].page_title, "Home");
        assert_eq!(events[0].data("page_views"), Some(&EventValue::Integer(1)));
    }

    #[test]
    fn test_page_view_waits_for_dom_ready() {
        let (mut tracker, _) = page_load(
            TrackingConfig::new("example.com"),
            HeadlessBrowser::new("https://example.com/")
                .with_ready_state(ReadyState::Loading),
        );
        tracker.start().unwrap();
        assert!(tracker.transport().sent().is_empty());

        tracker.handle_dom_ready();
        tracker.handle_dom_ready();
        assert_eq!(tracker.transport().events().len(), 1);
    }

    #[test]
    fn test_periodic_flush_batches_low_priority_events() {
        let (mut tracker, clock) = page_load(
            TrackingConfig::new("example.com"),
            HeadlessBrowser::new("https://example.com/"),
        );
        tracker.start().unwrap();
        tracker.transport_mut().clear();

        tracker.handle_click(&ClickTarget::button().with_text("Buy"));
        tracker.track("signup_started", EventData::new());
        assert_eq!(tracker.queued_events().len(), 2);
        assert_eq!(tracker.next_timer_deadline(), Some(1_700_000_005_000));

        clock.advance(4_999);
        assert_eq!(tracker.run_timers(), 0);
        clock.advance(1);
        assert_eq!(tracker.run_timers(), 1);

        let sent = tracker.transport().sent();
        assert_eq!(sent.len(), 1);
        let types: Vec<_> = sent[0]
            .batch()
            .unwrap()
            .events
            .iter()
            .map(|e| e.event_type)
            .collect();
        assert_eq!(types, vec![EventType::Click, EventType::Custom]);
        assert_eq!(tracker.next_timer_deadline(), Some(1_700_000_010_000));
    }

    #[test]
    fn test_delivery_failure_drops_events() {
        let clock = ManualClock::new(0);
        let mut tracker = Tracker::new(
            TrackingConfig::new("example.com").with_debug_logging(true),
            HashMapStorage::new(),
            RecordingTransport::without_beacon().failing_requests(),
            HeadlessBrowser::new("https://example.com/"),
            clock,
        )
        .unwrap();
        tracker.start().unwrap();

        // The initial page view was attempted and dropped.
        assert!(tracker.queued_events().is_empty());
        tracker.track("retry_me", EventData::new());
        assert!(matches!(
            tracker.flush(),
            FlushOutcome::Failed { events: 1, .. }
        ));
        assert!(matches!(tracker.flush(), FlushOutcome::Empty));
    }

    #[test]
    fn test_stop_flushes_and_resets() {
        let (mut tracker, _) = page_load(
            TrackingConfig::new("example.com"),
            HeadlessBrowser::new("https://example.com/"),
        );
        tracker.start().unwrap();
        tracker.track("bye", EventData::new());
        assert!(tracker.stop().is_sent());
        assert_eq!(tracker.state(), TrackerState::Uninitialized);
        assert_eq!(tracker.next_timer_deadline(), None);
        assert!(!tracker.track("after_stop", EventData::new()));
    }

    #[test]
    fn test_stop_performs_held_back_navigation() {
        let (mut tracker, clock) = page_load(
            TrackingConfig::new("example.com"),
            HeadlessBrowser::new("https://example.com/"),
        );
        tracker.start().unwrap();

        let link = ClickTarget::link("https://partner.org/", "partner.org");
        assert_eq!(tracker.handle_click(&link), ClickDisposition::Deferred);
        assert!(tracker.browser().navigations().is_empty());

        tracker.stop();
        assert_eq!(tracker.browser().navigations(), ["https://partner.org/"]);

        // Nothing is left to fire later.
        clock.advance(500);
        assert_eq!(tracker.run_timers(), 0);
        assert_eq!(tracker.browser().navigations().len(), 1);
    }

    #[test]
    fn test_get_session() {
        let (mut tracker, _) = page_load(
            TrackingConfig::new("example.com"),
            HeadlessBrowser::new("https://example.com/"),
        );
        assert_eq!(tracker.get_session().session_id, None);
        tracker.start().unwrap();

        let session = tracker.get_session();
        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["domain"], "example.com");
        assert_eq!(
            json["sessionId"].as_str(),
            tracker.identity().map(|i| i.session_id.as_str())
        );
        assert!(json["userId"].as_str().unwrap().starts_with("user_"));
    }
}
