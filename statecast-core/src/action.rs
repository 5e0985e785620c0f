//! Action trait and outcome companion types

use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Trait for actions that can be dispatched to a store
///
/// Actions describe a single semantic event. They should be:
/// - Clone + PartialEq: envelopes hand the same action to middleware, logs and subscribers
/// - Debug: For logging and the action log summary
/// - Send + Sync + 'static: actions travel to the store's dispatch lane
///
/// Every action names two companion types describing what a successful and a
/// failed processing outcome look like. A store refuses to start when its
/// reducer declares different companions (see [`Store::new`](crate::Store::new)).
///
/// Use `#[derive(Action)]` from `statecast-macros` to auto-implement this trait.
pub trait Action: Clone + Debug + PartialEq + Send + Sync + 'static {
    /// Shape of a successful outcome.
    type Success: 'static;
    /// Shape of a failed outcome.
    type Failure: 'static;

    /// Get the action name for logging and filtering
    fn name(&self) -> &'static str;

    /// One-line description used by the action log. Defaults to `Debug`.
    fn summary(&self) -> String {
        format!("{:?}", self)
    }
}

/// Result of processing an action, stored in state as plain data.
///
/// Reducers never fail at the store level: a failure is just another state
/// value, delivered to subscribers through the normal update path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome<T, E> {
    Succeeded(T),
    Failed(E),
}

impl<T, E> Outcome<T, E> {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Succeeded(_))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }

    /// The success value, if any.
    pub fn success(&self) -> Option<&T> {
        match self {
            Outcome::Succeeded(value) => Some(value),
            Outcome::Failed(_) => None,
        }
    }

    /// The failure value, if any.
    pub fn failure(&self) -> Option<&E> {
        match self {
            Outcome::Succeeded(_) => None,
            Outcome::Failed(err) => Some(err),
        }
    }
}

impl<T, E> From<Result<T, E>> for Outcome<T, E> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Outcome::Succeeded(value),
            Err(err) => Outcome::Failed(err),
        }
    }
}
