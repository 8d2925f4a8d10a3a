use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of a captured event, serialized as its snake_case wire name.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Pageview,
    Click,
    FormSubmit,
    Scroll,
    TimeOnPage,
    PageFocus,
    PageBlur,
    Custom,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Pageview => "pageview",
            EventType::Click => "click",
            EventType::FormSubmit => "form_submit",
            EventType::Scroll => "scroll",
            EventType::TimeOnPage => "time_on_page",
            EventType::PageFocus => "page_focus",
            EventType::PageBlur => "page_blur",
            EventType::Custom => "custom",
        }
    }

    /// Events that trigger a flush as soon as they are enqueued.
    pub fn is_priority(&self) -> bool {
        matches!(self, EventType::Pageview | EventType::FormSubmit)
    }

    /// Events that show the visitor interacted with the page, used to tell
    /// bounced sessions apart.
    pub fn is_interaction(&self) -> bool {
        matches!(
            self,
            EventType::Click
                | EventType::FormSubmit
                | EventType::Scroll
                | EventType::Custom
        )
    }
}

/// Scalar value in an event payload.
///
/// Untagged: integers deserialize as `Integer`, other numbers as `Float`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl EventValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            EventValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            EventValue::Bool(flag) => Some(*flag),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            EventValue::Integer(n) => Some(*n),
            EventValue::Float(n) if n.fract() == 0.0 => Some(*n as i64),
            _ => None,
        }
    }
}

impl From<bool> for EventValue {
    fn from(value: bool) -> Self {
        EventValue::Bool(value)
    }
}

impl From<i64> for EventValue {
    fn from(value: i64) -> Self {
        EventValue::Integer(value)
    }
}

impl From<i32> for EventValue {
    fn from(value: i32) -> Self {
        EventValue::Integer(value.into())
    }
}

impl From<u32> for EventValue {
    fn from(value: u32) -> Self {
        EventValue::Integer(value.into())
    }
}

impl From<f64> for EventValue {
    fn from(value: f64) -> Self {
        EventValue::Float(value)
    }
}

impl From<&str> for EventValue {
    fn from(value: &str) -> Self {
        EventValue::Text(value.to_string())
    }
}

impl From<String> for EventValue {
    fn from(value: String) -> Self {
        EventValue::Text(value)
    }
}

/// Event-specific payload. Ordered so the wire format is stable.
pub type EventData = BTreeMap<String, EventValue>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Ambient browser fields attached to every event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceContext {
    pub user_agent: String,
    pub language: String,
    pub screen: Dimensions,
    pub viewport: Dimensions,
    pub timezone: String,
    /// ISO country code, stamped by the collection endpoint when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

/// Device class derived from the user agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceCategory {
    Desktop,
    Mobile,
    Tablet,
}

impl DeviceCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceCategory::Desktop => "desktop",
            DeviceCategory::Mobile => "mobile",
            DeviceCategory::Tablet => "tablet",
        }
    }
}

impl DeviceContext {
    pub fn device_category(&self) -> DeviceCategory {
        let agent = self.user_agent.to_ascii_lowercase();
        if agent.contains("ipad") || agent.contains("tablet") {
            DeviceCategory::Tablet
        } else if agent.contains("mobi")
            || agent.contains("android")
            || agent.contains("iphone")
        {
            DeviceCategory::Mobile
        } else {
            DeviceCategory::Desktop
        }
    }

    /// Country code if stamped, else the region subtag of the language
    /// (`en-US` -> `US`).
    pub fn country_code(&self) -> Option<String> {
        if let Some(country) = self.country.as_ref().filter(|c| !c.is_empty())
        {
            return Some(country.to_ascii_uppercase());
        }
        self.language
            .split(['-', '_'])
            .nth(1)
            .filter(|region| region.len() == 2)
            .map(|region| region.to_ascii_uppercase())
    }
}

/// One captured event, as emitted by the tracker and stored by the
/// collection endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingEvent {
    pub event_type: EventType,
    #[serde(default)]
    pub page_url: String,
    #[serde(default)]
    pub page_title: String,
    #[serde(default)]
    pub referrer: String,
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub event_data: EventData,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub context: DeviceContext,
}

impl TrackingEvent {
    /// Path component of `page_url`, without query or fragment.
    pub fn page_path(&self) -> &str {
        url_path(&self.page_url)
    }

    pub fn data(&self, key: &str) -> Option<&EventValue> {
        self.event_data.get(key)
    }
}

/// Extracts the path from an absolute or relative URL.
pub fn url_path(url: &str) -> &str {
    let without_scheme = match url.find("://") {
        Some(index) => {
            let rest = &url[index + 3..];
            match rest.find('/') {
                Some(slash) => &rest[slash..],
                None => "/",
            }
        }
        None => url,
    };
    let end = without_scheme
        .find(['?', '#'])
        .unwrap_or(without_scheme.len());
    let path = &without_scheme[..end];
    if path.is_empty() {
        "/"
    } else {
        path
    }
}
