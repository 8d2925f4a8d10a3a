/// Client-side route change reported by the host.
///
/// Hosts produce these either by subscribing to a native navigation
/// notification or, where none exists, by wrapping `history.pushState` and
/// `history.replaceState` and listening for `popstate`. The tracker only
/// sees the signal, so the wrapping can be swapped or mocked freely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationSignal {
    PushState,
    ReplaceState,
    /// Browser back/forward.
    PopState,
}

impl NavigationSignal {
    /// History mutations are checked on the next turn, after the host's
    /// original call completed. Back/forward is checked immediately.
    pub fn is_deferred(&self) -> bool {
        matches!(
            self,
            NavigationSignal::PushState | NavigationSignal::ReplaceState
        )
    }
}

/// Remembers the last seen path and reports each distinct change once.
/// Only the path counts: query and hash changes are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationWatcher {
    current_path: String,
}

impl NavigationWatcher {
    pub fn new(initial_path: impl Into<String>) -> Self {
        Self {
            current_path: initial_path.into(),
        }
    }

    pub fn current_path(&self) -> &str {
        &self.current_path
    }

    /// Records `pathname`. Returns true if it differs from the last path.
    pub fn observe(&mut self, pathname: &str) -> bool {
        if pathname == self.current_path {
            return false;
        }
        self.current_path = pathname.to_string();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watcher_fires_once_per_distinct_path() {
        let mut watcher = NavigationWatcher::new("/a");
        assert!(!watcher.observe("/a"));
        assert!(watcher.observe("/b"));
        assert!(!watcher.observe("/b"));
        assert!(watcher.observe("/a"));
        assert_eq!(watcher.current_path(), "/a");
    }
}
