use thiserror::Error;

/// A required identifier or option is missing or malformed. Raised at
/// initialization, before any capture or network activity.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("missing required identifier: {0}")]
    MissingIdentifier(&'static str),

    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },
}

/// Failure while dispatching a batch. Recovered locally by the delivery
/// queue: logged in debug mode and dropped.
#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("no transport available for {0}")]
    Unavailable(String),

    #[error("failed to encode batch: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("request to {endpoint} failed: {reason}")]
    Request { endpoint: String, reason: String },

    #[error("collection endpoint answered HTTP {0}")]
    Status(u16),
}

/// Browser storage cannot be read or written, e.g. in private browsing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("browser storage unavailable: {reason}")]
pub struct StorageUnavailableError {
    pub reason: String,
}

impl StorageUnavailableError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Failure answering a dashboard query. Always carries enough context to
/// render an error state instead of zeros.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AggregationServiceError {
    #[error("property id is required")]
    MissingPropertyId,

    #[error("invalid date range: {0}")]
    InvalidDateRange(String),

    #[error("reporting API failed for property {property_id}: {message}")]
    Upstream {
        property_id: String,
        message: String,
    },

    #[error("malformed report for property {property_id}: {message}")]
    MalformedReport {
        property_id: String,
        message: String,
    },
}

impl AggregationServiceError {
    /// Property the failing query was routed to, when known.
    pub fn property_id(&self) -> Option<&str> {
        match self {
            Self::Upstream { property_id, .. }
            | Self::MalformedReport { property_id, .. } => Some(property_id),
            _ => None,
        }
    }
}

/// Errors returned by the tracker lifecycle.
#[derive(Error, Debug)]
pub enum TrackerError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("tracker already started")]
    AlreadyStarted,
}
