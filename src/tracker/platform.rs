use crate::events::tracking_event::{url_path, DeviceContext};

/// The parts of `window.location` the tracker reads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Location {
    pub href: String,
    pub hostname: String,
    pub pathname: String,
}

impl Location {
    /// Splits an absolute URL into its parts. Relative inputs are treated
    /// as paths on an empty host.
    pub fn parse(href: &str) -> Self {
        let (hostname, pathname) = match href.split_once("://") {
            Some((_, rest)) => {
                let host_end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
                let authority = &rest[..host_end];
                let host = authority
                    .rsplit_once('@')
                    .map_or(authority, |(_, host)| host);
                let host = split_host(host);
                let path = url_path(href);
                (host.to_string(), path.to_string())
            }
            None => (String::new(), url_path(href).to_string()),
        };
        Self {
            href: href.to_string(),
            hostname,
            pathname,
        }
    }
}

/// Drops the port from `host[:port]`. Bracketed IPv6 literals keep their
/// brackets, as `location.hostname` does.
fn split_host(host: &str) -> &str {
    if host.starts_with('[') {
        return match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        };
    }
    host.split(':').next().unwrap_or(host)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    Loading,
    Interactive,
    Complete,
}

/// Host page seam: everything the tracker reads from or does to the page
/// besides storage and network.
pub trait Browser {
    fn location(&self) -> Location;

    fn title(&self) -> String;

    fn referrer(&self) -> String;

    /// `navigator.doNotTrack == "1"`.
    fn do_not_track(&self) -> bool;

    fn ready_state(&self) -> ReadyState;

    fn device_context(&self) -> DeviceContext;

    /// Performs a navigation the tracker deferred (outbound links).
    fn navigate(&mut self, href: &str);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_hosts() {
        let location = Location::parse("http://[::1]:8080/admin?x=1");
        assert_eq!(location.hostname, "[::1]");
        assert_eq!(location.pathname, "/admin");

        assert_eq!(Location::parse("https://[2001:db8::7]/").hostname, "[2001:db8::7]");
        assert_eq!(Location::parse("http://localhost:3000").hostname, "localhost");
        assert_eq!(Location::parse("https://example.com").pathname, "/");

        let relative = Location::parse("/docs#intro");
        assert_eq!(relative.hostname, "");
        assert_eq!(relative.pathname, "/docs");
    }
}
