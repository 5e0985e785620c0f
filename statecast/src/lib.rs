//! statecast: scoped action dispatch for interactive apps
//!
//! Like Redux, but every action carries who sent it and who should hear about
//! it. Named subscribers emit actions into a store, one pure reducer computes
//! the next immutable state, and only the subscribers in the action's
//! destination scope are told, each at its own pace.
//!
//! # Example
//! ```ignore
//! use statecast::prelude::*;
//!
//! #[derive(Action, Clone, Debug, PartialEq)]
//! enum CounterAction {
//!     Appeared,
//!     Increment,
//! }
//!
//! let store = Store::new(Counter::default(), reducer)?;
//! store.subscribe(&view)?;
//! store.dispatch(envelop!("A", CounterAction::Increment, DestScope::Emitter))?;
//! ```

// Re-export everything from core
pub use statecast_core::*;

// Re-export derive macros
pub use statecast_macros::Action;

/// Prelude for convenient imports
pub mod prelude {
    // Traits
    pub use statecast_core::{Action, Middleware, Reducer, Subscriber, SubscriberExt};

    // Envelopes
    pub use statecast_core::{envelop, ActionEnvelop, DebugInfo, DestScope, Payload};

    // Store
    pub use statecast_core::{
        Completion, ComposedMiddleware, DuplicateNamePolicy, LoggingMiddleware, NoopMiddleware,
        Outcome, Store, StoreConfig, StoreError,
    };

    // Debug
    pub use statecast_core::debug::{ActionLogConfig, ActionLoggerConfig, ActionLoggerMiddleware};

    // Derive macros
    pub use statecast_macros::Action;
}
