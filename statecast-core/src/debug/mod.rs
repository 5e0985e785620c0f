//! Diagnostics for dispatched envelopes
//!
//! - **Action Logging**: glob-filtered tracing of envelopes, with an optional
//!   in-memory ring buffer that keeps each dispatch's emitter, scope and
//!   source location for later inspection.
//!
//! ```ignore
//! use statecast::debug::{ActionLogConfig, ActionLoggerMiddleware};
//!
//! let middleware = ActionLoggerMiddleware::with_log(ActionLogConfig::default());
//! let log = middleware.log().unwrap();
//! let store = Store::with_middleware(state, reducer, StoreConfig::default(), middleware)?;
//!
//! // later
//! for entry in log.lock().recent(10) {
//!     println!("{} from {} at {}", entry.summary, entry.emitter, entry.origin);
//! }
//! ```

pub mod action_logger;

pub use action_logger::{
    glob_match, ActionLog, ActionLogConfig, ActionLogEntry, ActionLoggerConfig,
    ActionLoggerMiddleware, SharedActionLog,
};
