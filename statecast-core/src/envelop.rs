//! Action envelopes: an action plus its routing and provenance metadata
//!
//! Every dispatch wraps exactly one action in a fresh [`ActionEnvelop`]. The
//! envelope records who emitted the action, which subscribers should hear
//! about the resulting state, optional out-of-band flags, and where in the
//! source the dispatch came from.
//!
//! # Example
//!
//! ```ignore
//! use statecast_core::{envelop, DestScope, Payload};
//!
//! // Everyone hears about it
//! let env = envelop!("sidebar", Action::Refresh);
//!
//! // Only the emitter itself
//! let env = envelop!("sidebar", Action::Refresh, DestScope::Emitter);
//!
//! // A named subgroup, shown quietly
//! let env = envelop!("sidebar", Action::Refresh, DestScope::authorized(["list", "detail"]))
//!     .with_payload(Payload::silent(true));
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Action;

/// Which subscribers receive the state update produced by an envelope.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DestScope {
    /// Only the subscriber whose name equals the emitter.
    Emitter,
    /// Every registered subscriber.
    #[default]
    All,
    /// Only subscribers whose name is in the set.
    Authorized(BTreeSet<String>),
}

impl DestScope {
    /// Build an `Authorized` scope from any list of names.
    pub fn authorized<I, N>(names: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<String>,
    {
        DestScope::Authorized(names.into_iter().map(Into::into).collect())
    }

    /// Whether a subscriber named `candidate` should receive an update
    /// emitted by `emitter`.
    pub fn admits(&self, emitter: &str, candidate: &str) -> bool {
        match self {
            DestScope::Emitter => candidate == emitter,
            DestScope::All => true,
            DestScope::Authorized(names) => names.contains(candidate),
        }
    }
}

impl fmt::Display for DestScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DestScope::Emitter => write!(f, "emitter"),
            DestScope::All => write!(f, "all"),
            DestScope::Authorized(names) => {
                let names: Vec<&str> = names.iter().map(String::as_str).collect();
                write!(f, "authorized({})", names.join(","))
            }
        }
    }
}

/// Out-of-band flags carried next to an action.
///
/// `silent` is the only key the store itself reads. Anything else a host
/// wants to attach goes into `extras`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Payload {
    /// Explicit loading-indicator hint for the emitter's own subscriber.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub silent: Option<bool>,
    /// Free-form metadata, ignored by routing and reduction.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extras: BTreeMap<String, serde_json::Value>,
}

impl Payload {
    /// Payload carrying only an explicit silent flag.
    pub fn silent(silent: bool) -> Self {
        Self {
            silent: Some(silent),
            extras: BTreeMap::new(),
        }
    }

    /// Attach an extra key/value pair.
    pub fn with_extra(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.extras.insert(key.into(), value.into());
        self
    }

    /// Look up an extra value by key.
    pub fn extra(&self, key: &str) -> Option<&serde_json::Value> {
        self.extras.get(key)
    }
}

/// Where a dispatch originated. Diagnostics only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DebugInfo {
    pub file: &'static str,
    pub module: &'static str,
    pub line: u32,
}

impl DebugInfo {
    pub const fn new(file: &'static str, module: &'static str, line: u32) -> Self {
        Self { file, module, line }
    }

    /// Provenance for envelopes built without the [`envelop!`](crate::envelop) macro.
    pub const fn unknown() -> Self {
        Self {
            file: "<unknown>",
            module: "<unknown>",
            line: 0,
        }
    }

    /// Location of the nearest caller not marked `#[track_caller]`.
    ///
    /// Carries no module path; only the macro can see it.
    #[track_caller]
    pub fn caller() -> Self {
        let location = std::panic::Location::caller();
        Self {
            file: location.file(),
            module: "",
            line: location.line(),
        }
    }

    pub fn is_known(&self) -> bool {
        self.line != 0
    }
}

impl Default for DebugInfo {
    fn default() -> Self {
        Self::unknown()
    }
}

impl fmt::Display for DebugInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.module.is_empty() {
            write!(f, "{}:{}", self.file, self.line)
        } else {
            write!(f, "{}:{} ({})", self.file, self.line, self.module)
        }
    }
}

/// One dispatched action with its metadata.
///
/// Envelopes are immutable: the `with_*` builders consume the envelope and
/// return a new one, and there are no setters.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionEnvelop<A: Action> {
    emitter: String,
    action: A,
    dest_scope: DestScope,
    payload: Option<Payload>,
    debug_info: DebugInfo,
}

impl<A: Action> ActionEnvelop<A> {
    /// Wrap an action broadcast to every subscriber, with no payload.
    pub fn new(emitter: impl Into<String>, action: A) -> Self {
        Self {
            emitter: emitter.into(),
            action,
            dest_scope: DestScope::All,
            payload: None,
            debug_info: DebugInfo::unknown(),
        }
    }

    pub fn with_scope(self, dest_scope: DestScope) -> Self {
        Self { dest_scope, ..self }
    }

    pub fn with_payload(self, payload: Payload) -> Self {
        Self {
            payload: Some(payload),
            ..self
        }
    }

    /// Set the payload's silent flag, keeping any extras already attached.
    pub fn with_silent(self, silent: bool) -> Self {
        let mut payload = self.payload.clone().unwrap_or_default();
        payload.silent = Some(silent);
        self.with_payload(payload)
    }

    pub fn with_debug_info(self, debug_info: DebugInfo) -> Self {
        Self { debug_info, ..self }
    }

    pub fn emitter(&self) -> &str {
        &self.emitter
    }

    pub fn action(&self) -> &A {
        &self.action
    }

    pub fn dest_scope(&self) -> &DestScope {
        &self.dest_scope
    }

    pub fn payload(&self) -> Option<&Payload> {
        self.payload.as_ref()
    }

    pub fn debug_info(&self) -> &DebugInfo {
        &self.debug_info
    }

    /// Explicit silent flag from the payload, if one was given.
    pub fn explicit_silent(&self) -> Option<bool> {
        self.payload.as_ref().and_then(|p| p.silent)
    }

    /// Whether a subscriber named `name` is in this envelope's audience.
    pub fn is_addressed_to(&self, name: &str) -> bool {
        self.dest_scope.admits(&self.emitter, name)
    }

    /// Silent flag as seen by the subscriber named `receiver`.
    ///
    /// Always `true`, unless the receiver is the emitter and the payload
    /// carries an explicit flag, in which case that flag wins.
    pub fn resolve_silent(&self, receiver: &str) -> bool {
        if self.emitter == receiver {
            if let Some(silent) = self.explicit_silent() {
                return silent;
            }
        }
        true
    }
}

/// Build an [`ActionEnvelop`] stamped with the caller's file, module and line.
///
/// ```ignore
/// envelop!("toolbar", Action::Save);
/// envelop!("toolbar", Action::Save, DestScope::Emitter);
/// envelop!("toolbar", Action::Save, DestScope::Emitter, Payload::silent(false));
/// ```
#[macro_export]
macro_rules! envelop {
    ($emitter:expr, $action:expr) => {
        $crate::ActionEnvelop::new($emitter, $action).with_debug_info($crate::DebugInfo::new(
            file!(),
            module_path!(),
            line!(),
        ))
    };
    ($emitter:expr, $action:expr, $scope:expr) => {
        $crate::envelop!($emitter, $action).with_scope($scope)
    };
    ($emitter:expr, $action:expr, $scope:expr, $payload:expr) => {
        $crate::envelop!($emitter, $action, $scope).with_payload($payload)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    enum TestAction {
        Ping,
    }

    impl Action for TestAction {
        type Success = ();
        type Failure = ();

        fn name(&self) -> &'static str {
            "Ping"
        }
    }

    #[test]
    fn test_scope_emitter() {
        let scope = DestScope::Emitter;
        assert!(scope.admits("a", "a"));
        assert!(!scope.admits("a", "b"));
    }

    #[test]
    fn test_scope_all() {
        let scope = DestScope::All;
        assert!(scope.admits("a", "a"));
        assert!(scope.admits("a", "anyone"));
    }

    #[test]
    fn test_scope_authorized() {
        let scope = DestScope::authorized(["list", "detail"]);
        assert!(scope.admits("a", "list"));
        assert!(scope.admits("a", "detail"));
        // the emitter is not implicitly included
        assert!(!scope.admits("a", "a"));
        assert!(!scope.admits("a", "footer"));
    }

    #[test]
    fn test_scope_display() {
        assert_eq!(DestScope::All.to_string(), "all");
        assert_eq!(DestScope::Emitter.to_string(), "emitter");
        assert_eq!(
            DestScope::authorized(["b", "a"]).to_string(),
            "authorized(a,b)"
        );
    }

    #[test]
    fn test_new_defaults() {
        let env = ActionEnvelop::new("a", TestAction::Ping);
        assert_eq!(env.emitter(), "a");
        assert_eq!(env.dest_scope(), &DestScope::All);
        assert!(env.payload().is_none());
        assert!(!env.debug_info().is_known());
    }

    #[test]
    fn test_macro_captures_provenance() {
        let env = envelop!("a", TestAction::Ping, DestScope::Emitter);
        assert!(env.debug_info().is_known());
        assert!(env.debug_info().file.ends_with("envelop.rs"));
        assert!(env.debug_info().module.ends_with("envelop::tests"));
        assert_eq!(env.dest_scope(), &DestScope::Emitter);
    }

    #[track_caller]
    fn stamped() -> DebugInfo {
        DebugInfo::caller()
    }

    #[test]
    fn test_caller_reports_outer_call_site() {
        let line = line!() + 1;
        let info = stamped();
        assert!(info.is_known());
        assert!(info.file.ends_with("envelop.rs"));
        assert_eq!(info.line, line);
        assert_eq!(info.to_string(), format!("{}:{}", info.file, line));
    }

    #[test]
    fn test_with_silent_keeps_extras() {
        let env = ActionEnvelop::new("a", TestAction::Ping)
            .with_payload(Payload::default().with_extra("origin", "menu"))
            .with_silent(false);

        let payload = env.payload().unwrap();
        assert_eq!(payload.silent, Some(false));
        assert_eq!(payload.extra("origin"), Some(&serde_json::json!("menu")));
    }

    #[test]
    fn test_resolve_silent() {
        let loud = ActionEnvelop::new("a", TestAction::Ping).with_silent(false);
        assert!(!loud.resolve_silent("a"));
        assert!(loud.resolve_silent("b"));

        let quiet = ActionEnvelop::new("a", TestAction::Ping).with_silent(true);
        assert!(quiet.resolve_silent("a"));

        // no explicit flag: silent everywhere, even for the emitter
        let plain = ActionEnvelop::new("a", TestAction::Ping);
        assert!(plain.resolve_silent("a"));
        assert!(plain.resolve_silent("b"));
    }

    #[test]
    fn test_payload_serde_skips_empty_fields() {
        let json = serde_json::to_string(&Payload::silent(true)).unwrap();
        assert_eq!(json, r#"{"silent":true}"#);

        let parsed: Payload = serde_json::from_str(r#"{"extras":{"k":1}}"#).unwrap();
        assert_eq!(parsed.silent, None);
        assert_eq!(parsed.extra("k"), Some(&serde_json::json!(1)));
    }
}
