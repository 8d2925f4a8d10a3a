use std::collections::HashMap;

use crate::error::ConfigurationError;

pub const DEFAULT_COLLECTION_ENDPOINT: &str = "/api/analytics/track";
pub const DEFAULT_FLUSH_INTERVAL_MS: u64 = 5_000;

/// Tracker options, read once per page load from the embedding attributes of
/// the script tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingConfig {
    pub domain: String,
    pub collection_endpoint: String,
    pub auto_track: bool,
    pub track_outbound: bool,
    pub track_forms: bool,
    pub cookieless_mode: bool,
    pub debug_logging: bool,
    pub flush_interval_ms: u64,
}

impl TrackingConfig {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            collection_endpoint: DEFAULT_COLLECTION_ENDPOINT.to_string(),
            auto_track: true,
            track_outbound: true,
            track_forms: true,
            cookieless_mode: false,
            debug_logging: false,
            flush_interval_ms: DEFAULT_FLUSH_INTERVAL_MS,
        }
    }

    /// Parses embedding attributes. Keys may carry the `data-` prefix.
    /// `fallback_domain` (usually the page hostname) is used when no
    /// `domain` attribute is present.
    pub fn from_attributes(
        attributes: &HashMap<String, String>,
        fallback_domain: &str,
    ) -> Result<Self, ConfigurationError> {
        let attribute = |name: &str| -> Option<&str> {
            attributes
                .get(&format!("data-{name}"))
                .or_else(|| attributes.get(name))
                .map(|value| value.trim())
        };

        // Opt-out flags: anything but "false" keeps the feature on.
        let enabled_unless_false =
            |name: &str| attribute(name).map_or(true, |v| v != "false");
        let disabled_unless_true =
            |name: &str| attribute(name).is_some_and(|v| v == "true");

        let domain = attribute("domain")
            .filter(|d| !d.is_empty())
            .unwrap_or(fallback_domain)
            .to_string();

        let collection_endpoint = attribute("api-endpoint")
            .or_else(|| attribute("api"))
            .unwrap_or(DEFAULT_COLLECTION_ENDPOINT)
            .to_string();

        let flush_interval_ms = match attribute("flush-interval") {
            None => DEFAULT_FLUSH_INTERVAL_MS,
            Some(raw) => raw.parse::<u64>().map_err(|_| {
                ConfigurationError::InvalidValue {
                    key: "flush-interval".to_string(),
                    value: raw.to_string(),
                }
            })?,
        };

        let config = Self {
            domain,
            collection_endpoint,
            auto_track: enabled_unless_false("auto-track"),
            track_outbound: enabled_unless_false("track-outbound"),
            track_forms: enabled_unless_false("track-forms"),
            cookieless_mode: disabled_unless_true("cookieless"),
            debug_logging: disabled_unless_true("debug"),
            flush_interval_ms,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.domain.trim().is_empty() {
            return Err(ConfigurationError::MissingIdentifier("domain"));
        }
        if self.collection_endpoint.trim().is_empty() {
            return Err(ConfigurationError::MissingIdentifier("api-endpoint"));
        }
        if self.flush_interval_ms == 0 {
            return Err(ConfigurationError::InvalidValue {
                key: "flush-interval".to_string(),
                value: "0".to_string(),
            });
        }
        Ok(())
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.collection_endpoint = endpoint.into();
        self
    }

    pub fn with_auto_track(mut self, enabled: bool) -> Self {
        self.auto_track = enabled;
        self
    }

    pub fn with_track_outbound(mut self, enabled: bool) -> Self {
        self.track_outbound = enabled;
        self
    }

    pub fn with_track_forms(mut self, enabled: bool) -> Self {
        self.track_forms = enabled;
        self
    }

    pub fn with_cookieless_mode(mut self, enabled: bool) -> Self {
        self.cookieless_mode = enabled;
        self
    }

    pub fn with_debug_logging(mut self, enabled: bool) -> Self {
        self.debug_logging = enabled;
        self
    }

    pub fn with_flush_interval_ms(mut self, interval: u64) -> Self {
        self.flush_interval_ms = interval;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attributes(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_from_empty_attributes() {
        let config =
            TrackingConfig::from_attributes(&HashMap::new(), "example.com")
                .unwrap();
        assert_eq!(config, TrackingConfig::new("example.com"));
        assert!(config.auto_track && config.track_outbound);
        assert!(!config.cookieless_mode && !config.debug_logging);
    }

    #[test]
    fn test_prefixed_and_bare_attributes() {
        let config = TrackingConfig::from_attributes(
            &attributes(&[
                ("data-domain", "shop.example.com"),
                ("api-endpoint", "https://collect.example.com/track"),
                ("data-track-forms", "false"),
                ("cookieless", "true"),
                ("data-debug", "yes"),
                ("flush-interval", "2000"),
            ]),
            "ignored.example.com",
        )
        .unwrap();
        assert_eq!(config.domain, "shop.example.com");
        assert_eq!(
            config.collection_endpoint,
            "https://collect.example.com/track"
        );
        assert!(!config.track_forms);
        assert!(config.cookieless_mode);
        // Only the literal "true" turns debug on.
        assert!(!config.debug_logging);
        assert_eq!(config.flush_interval_ms, 2_000);
    }

    #[test]
    fn test_missing_identifiers_fail_fast() {
        let err = TrackingConfig::from_attributes(&HashMap::new(), "")
            .unwrap_err();
        assert_eq!(err, ConfigurationError::MissingIdentifier("domain"));

        let err = TrackingConfig::from_attributes(
            &attributes(&[("api-endpoint", " ")]),
            "example.com",
        )
        .unwrap_err();
        assert_eq!(err, ConfigurationError::MissingIdentifier("api-endpoint"));

        assert!(TrackingConfig::from_attributes(
            &attributes(&[("flush-interval", "soon")]),
            "example.com",
        )
        .is_err());
    }
}
