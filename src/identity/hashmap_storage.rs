use std::{cell::RefCell, collections::HashMap, rc::Rc};

use crate::{
    error::StorageUnavailableError,
    identity::traits::{KeyValueStore, StorageScope},
};

type Areas = HashMap<(StorageScope, String), String>;

/// Simple implementation of KeyValueStore using a HashMap.
///
/// Clones share the same areas, the way two scripts on a page share the
/// browser's storage. Can be switched to "unavailable" to behave like
/// storage in a locked-down private window.
#[derive(Debug, Clone, Default)]
pub struct HashMapStorage {
    areas: Rc<RefCell<Areas>>,
    unavailable: bool,
}

impl HashMapStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage where every read and write fails.
    pub fn unavailable() -> Self {
        Self {
            areas: Rc::default(),
            unavailable: true,
        }
    }

    /// Drops the short-lived area, as when the tab is closed.
    pub fn end_browsing_context(&self) {
        self.areas
            .borrow_mut()
            .retain(|(scope, _), _| *scope != StorageScope::Session);
    }

    /// Drops everything, as when the visitor clears site data.
    pub fn clear(&self) {
        self.areas.borrow_mut().clear();
    }

    fn check_available(&self) -> Result<(), StorageUnavailableError> {
        if self.unavailable {
            return Err(StorageUnavailableError::new("storage is disabled"));
        }
        Ok(())
    }
}

impl KeyValueStore for HashMapStorage {
    type Error = StorageUnavailableError;

    fn get_item(
        &self,
        scope: StorageScope,
        key: &str,
    ) -> Result<Option<String>, Self::Error> {
        self.check_available()?;
        Ok(self
            .areas
            .borrow()
            .get(&(scope, key.to_string()))
            .cloned())
    }

    fn set_item(
        &mut self,
        scope: StorageScope,
        key: &str,
        value: &str,
    ) -> Result<(), Self::Error> {
        self.check_available()?;
        self.areas
            .borrow_mut()
            .insert((scope, key.to_string()), value.to_string());
        Ok(())
    }

    fn remove_item(
        &mut self,
        scope: StorageScope,
        key: &str,
    ) -> Result<(), Self::Error> {
        self.check_available()?;
        self.areas.borrow_mut().remove(&(scope, key.to_string()));
        Ok(())
    }
}
