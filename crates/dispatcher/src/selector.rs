//! Dispatcher selection: registry x configuration -> activation plan

use std::fmt;

use tracing::{debug, info, instrument, warn};

use contracts::{BlobDispatcher, DispatcherConfig};

use crate::error::DispatcherError;
use crate::registry::{names_match, DispatcherRegistry};

/// Dispatchers chosen for activation, paired with their configuration blocks
///
/// Order follows the registry, which fixes the fan-out order.
pub struct Selection {
    matches: Vec<(Box<dyn BlobDispatcher>, DispatcherConfig)>,
    skipped: Vec<String>,
    unknown_keys: Vec<String>,
}

impl Selection {
    /// Names of the dispatchers that will be activated, in order
    pub fn active_names(&self) -> Vec<&str> {
        self.matches.iter().map(|(d, _)| d.name()).collect()
    }

    /// Registered dispatchers with no configuration block
    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }

    /// Configuration keys that matched no registered dispatcher
    pub fn unknown_keys(&self) -> &[String] {
        &self.unknown_keys
    }

    pub(crate) fn into_matches(self) -> Vec<(Box<dyn BlobDispatcher>, DispatcherConfig)> {
        self.matches
    }
}

impl fmt::Debug for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Selection")
            .field("active", &self.active_names())
            .field("skipped", &self.skipped)
            .field("unknown_keys", &self.unknown_keys)
            .finish()
    }
}

/// Match registered dispatchers against configuration keys, ignoring case
///
/// Unconfigured dispatchers are dropped and unknown keys are ignored; neither
/// is an error.
///
/// # Errors
/// - two keys match the same dispatcher
/// - nothing matched at all
#[instrument(
    name = "dispatcher_select",
    skip(registry, configs),
    fields(registered = registry.len(), configured = configs.len())
)]
pub fn select(
    registry: DispatcherRegistry,
    configs: &[DispatcherConfig],
) -> Result<Selection, DispatcherError> {
    let mut matches = Vec::new();
    let mut skipped = Vec::new();

    for dispatcher in registry.into_dispatchers() {
        let mut candidates = configs
            .iter()
            .filter(|c| names_match(c.name(), dispatcher.name()));

        match (candidates.next(), candidates.next()) {
            (Some(config), None) => {
                debug!(dispatcher = %dispatcher.name(), key = %config.name(), "Dispatcher selected");
                matches.push((dispatcher, config.clone()));
            }
            (Some(first), Some(second)) => {
                let mut keys = vec![first.name().to_string(), second.name().to_string()];
                keys.extend(candidates.map(|c| c.name().to_string()));
                return Err(DispatcherError::AmbiguousConfiguration {
                    dispatcher: dispatcher.name().to_string(),
                    keys,
                });
            }
            (None, _) => {
                debug!(dispatcher = %dispatcher.name(), "Dispatcher not configured, skipping");
                skipped.push(dispatcher.name().to_string());
            }
        }
    }

    let unknown_keys: Vec<String> = configs
        .iter()
        .filter(|c| !matches.iter().any(|(d, _)| names_match(d.name(), c.name())))
        .map(|c| c.name().to_string())
        .collect();

    for key in &unknown_keys {
        warn!(key = %key, "Configured dispatcher is not registered, ignoring");
    }

    if matches.is_empty() {
        return Err(DispatcherError::NoDispatchersConfigured);
    }

    let selection = Selection {
        matches,
        skipped,
        unknown_keys,
    };
    info!(active = ?selection.active_names(), "Dispatchers selected");
    Ok(selection)
}
