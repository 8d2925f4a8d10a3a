use std::fmt::Display;

/// Lifetime of a storage area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageScope {
    /// Cleared when the browsing context ends (sessionStorage).
    Session,
    /// Persists across sessions until cleared (localStorage).
    Local,
}

/// Trait for the browser's key/value storage areas.
///
/// Every operation can fail, e.g. when storage is disabled in private
/// browsing. Callers are expected to degrade rather than give up.
pub trait KeyValueStore {
    type Error: Display;

    fn get_item(
        &self,
        scope: StorageScope,
        key: &str,
    ) -> Result<Option<String>, Self::Error>;

    fn set_item(
        &mut self,
        scope: StorageScope,
        key: &str,
        value: &str,
    ) -> Result<(), Self::Error>;

    fn remove_item(
        &mut self,
        scope: StorageScope,
        key: &str,
    ) -> Result<(), Self::Error>;
}
