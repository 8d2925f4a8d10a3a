use std::{env, fmt::Display, path::PathBuf, str::FromStr};

use tracing::{info, warn};

use crate::error::ConfigurationError;

pub const DEFAULT_PORT: &str = "3000";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    /// Property answered when a request names neither a client nor a
    /// property.
    pub default_property_id: Option<String>,
    /// JSON array of client records loaded at startup.
    pub clients_file: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            default_property_id: None,
            clients_file: None,
        }
    }
}

impl ServerConfig {
    /// Reads `ZP_PORT`, `ZP_DEFAULT_PROPERTY_ID` and `ZP_CLIENTS_FILE`.
    pub fn load() -> Result<Self, ConfigurationError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigurationError> {
        Ok(Self {
            port: try_load(&lookup, "ZP_PORT", DEFAULT_PORT)?,
            default_property_id: optional(&lookup, "ZP_DEFAULT_PROPERTY_ID"),
            clients_file: optional(&lookup, "ZP_CLIENTS_FILE").map(PathBuf::from),
        })
    }
}

fn optional(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    let value = lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());
    if value.is_none() {
        info!("{key} not set");
    }
    value
}

fn try_load<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: &str,
) -> Result<T, ConfigurationError>
where
    T::Err: Display,
{
    let value = lookup(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });
    let parsed = value.trim().parse::<T>();
    parsed.map_err(|e| {
        warn!("Invalid {key} value: {e}");
        ConfigurationError::InvalidValue {
            key: key.to_string(),
            value,
        }
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ServerConfig::default());
    }

    #[test]
    fn test_load_values() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("ZP_PORT", "8080"),
            ("ZP_DEFAULT_PROPERTY_ID", "example.com"),
            ("ZP_CLIENTS_FILE", " "),
        ]))
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.default_property_id.as_deref(), Some("example.com"));
        assert_eq!(config.clients_file, None);

        assert_eq!(
            ServerConfig::from_lookup(lookup(&[("ZP_PORT", "http")])),
            Err(ConfigurationError::InvalidValue {
                key: "ZP_PORT".to_string(),
                value: "http".to_string(),
            })
        );
    }
}
