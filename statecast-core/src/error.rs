//! Structural errors reported by the store.
//!
//! Domain failures are not errors here: reducers return them as state.

use thiserror::Error;

/// Errors surfaced synchronously to the caller of a store operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The reducer's outcome types do not match the action's companions.
    #[error(
        "reducer for action `{action}` declares outcome {found}, but the action expects {expected}"
    )]
    InvalidAction {
        action: &'static str,
        expected: String,
        found: String,
    },

    /// A live subscriber is already registered under this name.
    #[error("a live subscriber is already registered as '{name}'")]
    DuplicateSubscriptionName { name: String },

    /// Another live subscriber owns the emitter name this dispatch claims.
    #[error("emitter '{name}' is registered to a different subscriber")]
    DuplicateEmitter { name: String },

    /// The store's dispatch lane has shut down.
    #[error("store is closed")]
    Closed,

    /// No tokio runtime was running where the store was created.
    #[error("a store must be created inside a tokio runtime")]
    NoRuntime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let err = StoreError::DuplicateSubscriptionName {
            name: "sidebar".into(),
        };
        assert_eq!(
            err.to_string(),
            "a live subscriber is already registered as 'sidebar'"
        );

        let err = StoreError::InvalidAction {
            action: "Load",
            expected: "(String, u16)".into(),
            found: "((), ())".into(),
        };
        assert!(err.to_string().contains("`Load`"));
        assert!(err.to_string().contains("(String, u16)"));

        assert_eq!(
            StoreError::NoRuntime.to_string(),
            "a store must be created inside a tokio runtime"
        );
    }
}
