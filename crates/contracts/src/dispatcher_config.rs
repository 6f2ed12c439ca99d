//! DispatcherConfig - per-dispatcher configuration block

use serde_json::{Map, Value};

use crate::ContractError;

/// Raw parameter table as it appears under `dispatchers.<name>`
pub type DispatcherParams = Map<String, Value>;

/// Configuration handed to `BlobDispatcher::initialize`.
///
/// The contents are opaque to the agent; each dispatcher pulls what it needs
/// through the typed accessors, which report errors against the exact
/// configuration path.
#[derive(Debug, Clone, Default)]
pub struct DispatcherConfig {
    /// Configuration key as written by the operator
    name: String,
    params: DispatcherParams,
}

impl DispatcherConfig {
    pub fn new(name: impl Into<String>, params: DispatcherParams) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }

    /// Configuration key this block was read from
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Optional string parameter
    pub fn get_str(&self, key: &str) -> Result<Option<&str>, ContractError> {
        match self.params.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(other) => Err(self.invalid(key, format!("expected string, got {other}"))),
        }
    }

    /// Required string parameter
    pub fn require_str(&self, key: &str) -> Result<&str, ContractError> {
        self.get_str(key)?
            .ok_or_else(|| self.invalid(key, "missing required parameter"))
    }

    /// Optional unsigned integer parameter (numeric strings are accepted)
    pub fn get_u64(&self, key: &str) -> Result<Option<u64>, ContractError> {
        match self.params.get(key) {
            None => Ok(None),
            Some(Value::Number(n)) => n
                .as_u64()
                .map(Some)
                .ok_or_else(|| self.invalid(key, format!("expected unsigned integer, got {n}"))),
            Some(Value::String(s)) => s
                .parse()
                .map(Some)
                .map_err(|_| self.invalid(key, format!("expected unsigned integer, got '{s}'"))),
            Some(other) => Err(self.invalid(key, format!("expected unsigned integer, got {other}"))),
        }
    }

    /// Optional boolean parameter
    pub fn get_bool(&self, key: &str) -> Result<Option<bool>, ContractError> {
        match self.params.get(key) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(Value::String(s)) => match s.to_ascii_lowercase().as_str() {
                "true" => Ok(Some(true)),
                "false" => Ok(Some(false)),
                _ => Err(self.invalid(key, format!("expected boolean, got '{s}'"))),
            },
            Some(other) => Err(self.invalid(key, format!("expected boolean, got {other}"))),
        }
    }

    fn invalid(&self, key: &str, message: impl Into<String>) -> ContractError {
        ContractError::config_validation(format!("dispatchers.{}.{}", self.name, key), message)
    }
}
