//! Core traits and types for statecast
//!
//! This crate provides a unidirectional state store: named subscribers emit
//! actions, one reducer turns each action into a new immutable state, and the
//! store tells the subscribers in the action's destination scope about it.
//!
//! # Core Concepts
//!
//! - **Action**: Events that describe state changes, with success/failure companions
//! - **ActionEnvelop**: An action plus emitter, destination scope, payload and provenance
//! - **Store**: Owns the state; reduces envelopes one at a time on a single lane
//! - **Subscriber**: Named participant notified of updates, with a completion protocol
//!
//! # Basic Example
//!
//! ```ignore
//! use statecast_core::prelude::*;
//!
//! #[derive(Action, Clone, Debug, PartialEq)]
//! enum CounterAction {
//!     Increment,
//!     Decrement,
//! }
//!
//! #[derive(Clone, Debug, PartialEq, Default)]
//! struct Counter {
//!     count: i32,
//! }
//!
//! fn reducer(state: &Counter, action: &CounterAction) -> Counter {
//!     match action {
//!         CounterAction::Increment => Counter { count: state.count + 1 },
//!         CounterAction::Decrement => Counter { count: state.count - 1 },
//!     }
//! }
//!
//! let store = Store::new(Counter::default(), reducer)?;
//! let view = Arc::new(CounterView::new("A"));
//! store.subscribe(&view)?;
//! view.dispatch_to_store(CounterAction::Increment, &store)?;
//! ```
//!
//! # Loading Indicators
//!
//! A subscriber dispatching through `dispatch_to_store` / `dispatch_with` gets
//! `did_start_loading(silent)` before its envelope is queued. Every subscriber
//! in scope gets `did_finish_loading(state, silent)` once it completes its
//! update. Dispatches are quiet unless `is_action_silent` says otherwise, and
//! `silent` is always `true` for bystanders. Only the emitter can be told
//! otherwise, through the envelope payload:
//!
//! ```ignore
//! // the emitting view shows a spinner, everyone else updates quietly
//! view.dispatch_with(
//!     CounterAction::Increment,
//!     &store,
//!     DestScope::All,
//!     Some(Payload::silent(false)),
//! )?;
//! ```

pub mod action;
pub mod config;
pub mod debug;
pub mod envelop;
pub mod error;
mod mailbox;
mod registry;
pub mod store;
pub mod subscriber;
pub mod testing;

// Core trait exports
pub use action::{Action, Outcome};
pub use envelop::{ActionEnvelop, DebugInfo, DestScope, Payload};
pub use error::StoreError;

// Store exports
pub use config::{DuplicateNamePolicy, StoreConfig};
pub use store::{ComposedMiddleware, LoggingMiddleware, Middleware, NoopMiddleware, Reducer, Store};
pub use subscriber::{Completion, Subscriber, SubscriberExt};

// Debug exports
pub use debug::{
    ActionLog, ActionLogConfig, ActionLogEntry, ActionLoggerConfig, ActionLoggerMiddleware,
    SharedActionLog,
};

// Testing exports
pub use testing::{CompletionMode, Notification, RecordingSubscriber};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::action::{Action, Outcome};
    pub use crate::config::{DuplicateNamePolicy, StoreConfig};
    pub use crate::envelop::{ActionEnvelop, DebugInfo, DestScope, Payload};
    pub use crate::error::StoreError;
    pub use crate::store::{
        ComposedMiddleware, LoggingMiddleware, Middleware, NoopMiddleware, Reducer, Store,
    };
    pub use crate::subscriber::{Completion, Subscriber, SubscriberExt};
}
