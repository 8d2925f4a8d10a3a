use crate::events::tracking_event::{EventData, EventValue};

/// Scroll-depth percentages reported once each per page load.
pub const SCROLL_CHECKPOINTS: [i64; 4] = [25, 50, 75, 90];
/// Quiet period before a burst of scroll events is evaluated.
pub const SCROLL_DEBOUNCE_MS: i64 = 100;
/// Delay before continuing an outbound navigation held back for capture.
pub const OUTBOUND_NAVIGATION_DELAY_MS: i64 = 100;
/// Time-on-page below or at this many seconds is not reported.
pub const MIN_TIME_ON_PAGE_SECS: i64 = 10;
/// Time-on-page above this many seconds counts as engaged.
pub const ENGAGED_TIME_ON_PAGE_SECS: i64 = 30;

const MAX_ELEMENT_TEXT_CHARS: usize = 100;

/// Nearest `a` or `button` ancestor of a click target, as resolved by the
/// host's delegated listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClickTarget {
    pub tag_name: String,
    pub text: String,
    pub href: Option<String>,
    /// Hostname of `href`, as the browser resolved it.
    pub hostname: Option<String>,
    pub id: Option<String>,
    pub class_name: Option<String>,
}

impl ClickTarget {
    pub fn link(href: &str, hostname: &str) -> Self {
        Self {
            tag_name: "A".to_string(),
            text: String::new(),
            href: Some(href.to_string()),
            hostname: Some(hostname.to_string()),
            id: None,
            class_name: None,
        }
    }

    pub fn button() -> Self {
        Self {
            tag_name: "BUTTON".to_string(),
            text: String::new(),
            href: None,
            hostname: None,
            id: None,
            class_name: None,
        }
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn with_class_name(mut self, class_name: &str) -> Self {
        self.class_name = Some(class_name.to_string());
        self
    }

    /// A link whose hostname differs from the current page's.
    pub fn is_outbound(&self, current_hostname: &str) -> bool {
        match (&self.href, &self.hostname) {
            (Some(_), Some(hostname)) => hostname != current_hostname,
            _ => false,
        }
    }
}

/// What the host should do with the click after the tracker saw it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickDisposition {
    /// Let the browser handle the click normally.
    Proceed,
    /// Call `preventDefault`; the tracker navigates after a short delay.
    Deferred,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormTarget {
    pub id: Option<String>,
    pub action: Option<String>,
    pub method: Option<String>,
}

/// Scroll position read when the listener fires.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollMetrics {
    pub scroll_top: f64,
    pub scroll_height: f64,
    pub viewport_height: f64,
}

impl ScrollMetrics {
    pub fn new(scroll_top: f64, scroll_height: f64, viewport_height: f64) -> Self {
        Self {
            scroll_top,
            scroll_height,
            viewport_height,
        }
    }

    /// `round(scrollTop / (scrollHeight - viewportHeight) * 100)`, or `None`
    /// when the page cannot scroll.
    pub fn percent(&self) -> Option<i64> {
        let scrollable = self.scroll_height - self.viewport_height;
        if scrollable <= 0.0 || !scrollable.is_finite() {
            return None;
        }
        let percent = (self.scroll_top / scrollable * 100.0).round();
        percent.is_finite().then_some(percent as i64)
    }
}

/// Checkpoints still to report, and the deepest point reached so far.
#[derive(Debug, Clone)]
pub struct ScrollDepthTracker {
    max_depth: i64,
    remaining: Vec<i64>,
}

impl Default for ScrollDepthTracker {
    fn default() -> Self {
        Self {
            max_depth: 0,
            remaining: SCROLL_CHECKPOINTS.to_vec(),
        }
    }
}

impl ScrollDepthTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_depth(&self) -> i64 {
        self.max_depth
    }

    /// Records a scroll percentage and returns the checkpoints it crossed
    /// for the first time, ascending. Scrolling back up never re-arms a
    /// checkpoint.
    pub fn observe(&mut self, percent: i64) -> Vec<i64> {
        if percent <= self.max_depth {
            return Vec::new();
        }
        self.max_depth = percent;

        let (crossed, remaining): (Vec<i64>, Vec<i64>) = self
            .remaining
            .iter()
            .copied()
            .partition(|checkpoint| *checkpoint <= percent);
        self.remaining = remaining;
        crossed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeOnPage {
    pub seconds: i64,
    pub engaged: bool,
}

/// Measures time since page load, reporting it at most once.
#[derive(Debug, Clone)]
pub struct EngagementTimer {
    started_at: i64,
    reported: bool,
}

impl EngagementTimer {
    pub fn new(started_at: i64) -> Self {
        Self {
            started_at,
            reported: false,
        }
    }

    pub fn elapsed_millis(&self, now: i64) -> i64 {
        (now - self.started_at).max(0)
    }

    /// Returns the time on page if it is worth reporting and was not
    /// reported yet. Short visits stay unreported, so a later hide or
    /// unload can still report.
    pub fn measure(&mut self, now: i64) -> Option<TimeOnPage> {
        if self.reported {
            return None;
        }
        let seconds = (self.elapsed_millis(now) as f64 / 1000.0).round() as i64;
        if seconds <= MIN_TIME_ON_PAGE_SECS {
            return None;
        }
        self.reported = true;
        Some(TimeOnPage {
            seconds,
            engaged: seconds > ENGAGED_TIME_ON_PAGE_SECS,
        })
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.trim().chars().take(max).collect()
}

fn insert_opt(data: &mut EventData, key: &str, value: &Option<String>) {
    if let Some(value) = value.as_ref().filter(|v| !v.is_empty()) {
        data.insert(key.to_string(), EventValue::from(value.as_str()));
    }
}

pub fn click_data(target: &ClickTarget, outbound: bool) -> EventData {
    let mut data = EventData::new();
    data.insert("element".to_string(), target.tag_name.as_str().into());
    data.insert(
        "text".to_string(),
        truncate_chars(&target.text, MAX_ELEMENT_TEXT_CHARS).into(),
    );
    insert_opt(&mut data, "href", &target.href);
    insert_opt(&mut data, "id", &target.id);
    insert_opt(&mut data, "classes", &target.class_name);
    if outbound {
        data.insert("outbound".to_string(), true.into());
    }
    data
}

pub fn form_data(form: &FormTarget) -> EventData {
    let mut data = EventData::new();
    insert_opt(&mut data, "form_id", &form.id);
    insert_opt(&mut data, "form_action", &form.action);
    let method = form
        .method
        .as_deref()
        .filter(|m| !m.is_empty())
        .unwrap_or("GET")
        .to_ascii_uppercase();
    data.insert("form_method".to_string(), method.into());
    data
}

pub fn scroll_data(checkpoint: i64, max_depth: i64) -> EventData {
    let mut data = EventData::new();
    data.insert("depth".to_string(), checkpoint.into());
    data.insert("max_depth".to_string(), max_depth.into());
    data
}

pub fn time_on_page_data(time_on_page: TimeOnPage) -> EventData {
    let mut data = EventData::new();
    data.insert("duration".to_string(), time_on_page.seconds.into());
    data.insert("engaged".to_string(), time_on_page.engaged.into());
    data
}
