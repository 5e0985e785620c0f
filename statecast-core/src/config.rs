//! Store configuration

use serde::{Deserialize, Serialize};

/// What `subscribe` does when a live subscriber already holds the name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateNamePolicy {
    /// Fail with [`StoreError::DuplicateSubscriptionName`](crate::StoreError::DuplicateSubscriptionName).
    #[default]
    Reject,
    /// Evict the current holder; its pending notifications are dropped.
    Replace,
}

/// Store-level settings.
///
/// Can be built in code or loaded from JSON:
///
/// ```
/// use statecast_core::{DuplicateNamePolicy, StoreConfig};
///
/// let config = StoreConfig::from_json(r#"{ "duplicate_names": "replace" }"#).unwrap();
/// assert_eq!(config.duplicate_names, DuplicateNamePolicy::Replace);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub duplicate_names: DuplicateNamePolicy,
}

impl StoreConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn duplicate_names(mut self, policy: DuplicateNamePolicy) -> Self {
        self.duplicate_names = policy;
        self
    }

    /// Parse a config from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rejects_duplicates() {
        assert_eq!(StoreConfig::default().duplicate_names, DuplicateNamePolicy::Reject);
    }

    #[test]
    fn test_from_json_defaults_missing_fields() {
        let config = StoreConfig::from_json("{}").unwrap();
        assert_eq!(config, StoreConfig::default());
    }

    #[test]
    fn test_from_json_rejects_unknown_policy() {
        assert!(StoreConfig::from_json(r#"{ "duplicate_names": "merge" }"#).is_err());
    }

    #[test]
    fn test_builder() {
        let config = StoreConfig::new().duplicate_names(DuplicateNamePolicy::Replace);
        assert_eq!(config.duplicate_names, DuplicateNamePolicy::Replace);
    }
}
