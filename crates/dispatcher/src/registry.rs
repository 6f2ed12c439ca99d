//! DispatcherRegistry - explicit list of known dispatcher implementations
//!
//! Nothing is discovered implicitly: built-ins come from [`DispatcherRegistry::builtin`]
//! and anything else must be passed to [`DispatcherRegistry::register`].

use std::fmt;

use tracing::debug;

use contracts::BlobDispatcher;

use crate::dispatchers::{FileDispatcher, LogDispatcher, NetworkDispatcher};
use crate::error::DispatcherError;

/// Registered dispatchers, in registration order
#[derive(Default)]
pub struct DispatcherRegistry {
    dispatchers: Vec<Box<dyn BlobDispatcher>>,
}

impl DispatcherRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in `log`, `file` and `network` dispatchers
    pub fn builtin() -> Self {
        let dispatchers: Vec<Box<dyn BlobDispatcher>> = vec![
            Box::new(LogDispatcher::new()),
            Box::new(FileDispatcher::new()),
            Box::new(NetworkDispatcher::new()),
        ];
        Self { dispatchers }
    }

    /// Register a dispatcher
    ///
    /// # Errors
    /// Fails if a dispatcher with the same name (ignoring case) is already
    /// registered; the registry is left unchanged.
    pub fn register(&mut self, dispatcher: Box<dyn BlobDispatcher>) -> Result<(), DispatcherError> {
        if self.get(dispatcher.name()).is_some() {
            return Err(DispatcherError::DuplicateDispatcher {
                name: dispatcher.name().to_string(),
            });
        }
        debug!(dispatcher = %dispatcher.name(), "Dispatcher registered");
        self.dispatchers.push(dispatcher);
        Ok(())
    }

    /// Builder-style `register`
    pub fn with(mut self, dispatcher: Box<dyn BlobDispatcher>) -> Result<Self, DispatcherError> {
        self.register(dispatcher)?;
        Ok(self)
    }

    /// Look up a dispatcher by name, ignoring case
    pub fn get(&self, name: &str) -> Option<&dyn BlobDispatcher> {
        self.dispatchers
            .iter()
            .find(|d| names_match(d.name(), name))
            .map(|d| d.as_ref())
    }

    /// (name, dispatcher) pairs in registration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &dyn BlobDispatcher)> {
        self.dispatchers.iter().map(|d| (d.name(), d.as_ref()))
    }

    /// Registered names in registration order
    pub fn names(&self) -> Vec<&str> {
        self.dispatchers.iter().map(|d| d.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.dispatchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dispatchers.is_empty()
    }

    pub(crate) fn into_dispatchers(self) -> Vec<Box<dyn BlobDispatcher>> {
        self.dispatchers
    }
}

impl fmt::Debug for DispatcherRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatcherRegistry")
            .field("dispatchers", &self.names())
            .finish()
    }
}

/// Case-insensitive name comparison used for registration and selection
pub(crate) fn names_match(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockDispatcher;

    #[test]
    fn test_builtin_names() {
        let registry = DispatcherRegistry::builtin();
        assert_eq!(registry.names(), vec!["log", "file", "network"]);
    }

    #[test]
    fn test_lookup_ignores_case() {
        let registry = DispatcherRegistry::builtin();
        assert!(registry.get("FILE").is_some());
        assert!(registry.get("Network").is_some());
        assert!(registry.get("s3").is_none());
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let mut registry = DispatcherRegistry::new();
        registry
            .register(Box::new(MockDispatcher::new("Remote")))
            .unwrap();

        let result = registry.register(Box::new(MockDispatcher::new("remote")));
        assert!(matches!(
            result,
            Err(DispatcherError::DuplicateDispatcher { ref name }) if name == "remote"
        ));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.names(), vec!["Remote"]);
    }

    #[test]
    fn test_registration_order_preserved() {
        let registry = DispatcherRegistry::new()
            .with(Box::new(MockDispatcher::new("b")))
            .and_then(|r| r.with(Box::new(MockDispatcher::new("a"))))
            .unwrap();
        let names: Vec<&str> = registry.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["b", "a"]);
    }
}
