use reqwest::{header::CONTENT_TYPE, Client};
use tokio::runtime::Handle;

use crate::{error::DeliveryError, tracker::delivery::Transport};

/// Native transport posting batches with `reqwest` on a tokio runtime.
///
/// There is no beacon outside a browser, so every batch goes through
/// [`Transport::post`], which spawns the request and returns immediately.
/// Relative endpoints are resolved against `base_url`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    runtime: Handle,
    base_url: String,
    debug_logging: bool,
}

impl HttpTransport {
    /// Must be called from within a tokio runtime.
    pub fn new(base_url: &str) -> Result<Self, DeliveryError> {
        let runtime = Handle::try_current()
            .map_err(|e| DeliveryError::Unavailable(e.to_string()))?;
        Ok(Self::with_runtime(base_url, runtime))
    }

    pub fn with_runtime(base_url: &str, runtime: Handle) -> Self {
        Self {
            client: Client::new(),
            runtime,
            base_url: base_url.trim_end_matches('/').to_string(),
            debug_logging: false,
        }
    }

    pub fn with_debug_logging(mut self, enabled: bool) -> Self {
        self.debug_logging = enabled;
        self
    }

    pub fn url_for(&self, endpoint: &str) -> String {
        if endpoint.contains("://") {
            endpoint.to_string()
        } else {
            format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
        }
    }
}

impl Transport for HttpTransport {
    fn beacon_available(&self) -> bool {
        false
    }

    fn send_beacon(&mut self, _endpoint: &str, _body: &str) -> bool {
        false
    }

    fn post(&mut self, endpoint: &str, body: &str) -> Result<(), DeliveryError> {
        let url = self.url_for(endpoint);
        let request = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .body(body.to_string());
        let debug_logging = self.debug_logging;

        self.runtime.spawn(async move {
            match request.send().await {
                Ok(response) if !response.status().is_success() => {
                    let error = DeliveryError::Status(response.status().as_u16());
                    if debug_logging {
                        tracing::debug!(target: "zpanalytics", "{url}: {error}");
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    if debug_logging {
                        tracing::debug!(
                            target: "zpanalytics",
                            "request to {url} failed: {e}"
                        );
                    }
                }
            }
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_url_for_joins_relative_endpoints() {
        let transport = HttpTransport::new("https://stats.example.com/").unwrap();
        assert_eq!(
            transport.url_for("/api/analytics/track"),
            "https://stats.example.com/api/analytics/track"
        );
        assert_eq!(
            transport.url_for("https://other.example.com/collect"),
            "https://other.example.com/collect"
        );
        assert!(!transport.beacon_available());
    }
}
