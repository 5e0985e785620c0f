//! Envelope logging with name filters and an optional in-memory history
//!
//! [`ActionLoggerMiddleware`] sits on the dispatch lane and emits one
//! `tracing` event per envelope whose action name passes the filter. With a
//! history attached it also appends an [`ActionLogEntry`] that keeps the
//! emitter, scope and dispatch site, and fills in `state_changed` once the
//! reducer has run.
//!
//! ```ignore
//! use statecast_core::debug::{ActionLogConfig, ActionLoggerConfig, ActionLoggerMiddleware};
//!
//! let filter = ActionLoggerConfig::new(Some("Load*,Save"), None);
//! let middleware = ActionLoggerMiddleware::with_log(ActionLogConfig::new(200, filter));
//! let history = middleware.log().unwrap();
//!
//! let store = Store::with_middleware(state, reducer, StoreConfig::default(), middleware)?;
//! // ...
//! for entry in history.lock().by_emitter("sidebar") {
//!     println!("#{} {} at {}", entry.sequence, entry.summary, entry.origin);
//! }
//! ```

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::envelop::{ActionEnvelop, DebugInfo};
use crate::store::Middleware;
use crate::Action;

/// Actions that fire too often to be worth logging by default.
const NOISY: [&str; 2] = ["Tick", "Render"];

/// Which action names get logged.
///
/// A name is logged when it matches at least one include pattern (or the
/// include list is empty) and matches no exclude pattern. Patterns are globs
/// where `*` spans any run of characters and `?` exactly one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionLoggerConfig {
    pub include_patterns: Vec<String>,
    pub exclude_patterns: Vec<String>,
}

impl Default for ActionLoggerConfig {
    fn default() -> Self {
        Self {
            include_patterns: Vec::new(),
            exclude_patterns: NOISY.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ActionLoggerConfig {
    /// Build a filter from comma-separated lists, as given on a command line.
    ///
    /// `None` for `exclude` keeps the default `Tick,Render` exclusions; pass
    /// `Some("")` to exclude nothing.
    ///
    /// ```
    /// use statecast_core::debug::ActionLoggerConfig;
    ///
    /// let config = ActionLoggerConfig::new(Some("Load*, Save"), None);
    /// assert!(config.should_log("LoadPage"));
    /// assert!(config.should_log("Save"));
    /// assert!(!config.should_log("Delete"));
    /// ```
    pub fn new(include: Option<&str>, exclude: Option<&str>) -> Self {
        let defaults = Self::default();
        Self {
            include_patterns: include.map(split_patterns).unwrap_or_default(),
            exclude_patterns: exclude
                .map(split_patterns)
                .unwrap_or(defaults.exclude_patterns),
        }
    }

    pub fn with_patterns(include: Vec<String>, exclude: Vec<String>) -> Self {
        Self {
            include_patterns: include,
            exclude_patterns: exclude,
        }
    }

    /// Filter that lets every action through.
    pub fn everything() -> Self {
        Self::with_patterns(Vec::new(), Vec::new())
    }

    pub fn should_log(&self, action_name: &str) -> bool {
        let included = self.include_patterns.is_empty()
            || self
                .include_patterns
                .iter()
                .any(|pattern| glob_match(pattern, action_name));
        included
            && !self
                .exclude_patterns
                .iter()
                .any(|pattern| glob_match(pattern, action_name))
    }
}

fn split_patterns(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|pattern| !pattern.is_empty())
        .map(String::from)
        .collect()
}

/// Glob match over whole strings; `*` spans any run, `?` one character.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    // (pattern index after the last `*`, text index it was tried at)
    let mut backtrack: Option<(usize, usize)> = None;
    let (mut p, mut t) = (0, 0);

    while t < text.len() {
        match pattern.get(p) {
            Some('*') => {
                backtrack = Some((p + 1, t));
                p += 1;
            }
            Some(&c) if c == '?' || c == text[t] => {
                p += 1;
                t += 1;
            }
            _ => match backtrack {
                // let the last star swallow one more character
                Some((star_p, star_t)) => {
                    backtrack = Some((star_p, star_t + 1));
                    p = star_p;
                    t = star_t + 1;
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|&c| c == '*')
}

/// One logged envelope.
#[derive(Debug, Clone)]
pub struct ActionLogEntry {
    pub name: &'static str,
    pub emitter: String,
    /// Destination scope as displayed, e.g. `authorized(detail,list)`.
    pub scope: String,
    pub summary: String,
    /// Where the envelope was built.
    pub origin: DebugInfo,
    pub timestamp: Instant,
    /// Position among logged envelopes, starting at 0. Filtered envelopes
    /// do not consume a number.
    pub sequence: u64,
    /// Filled in after the reducer ran; `None` until then.
    pub state_changed: Option<bool>,
}

impl ActionLogEntry {
    pub fn from_envelop<A: Action>(envelop: &ActionEnvelop<A>, sequence: u64) -> Self {
        Self {
            name: envelop.action().name(),
            emitter: envelop.emitter().to_string(),
            scope: envelop.dest_scope().to_string(),
            summary: envelop.action().summary(),
            origin: *envelop.debug_info(),
            timestamp: Instant::now(),
            sequence,
            state_changed: None,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.timestamp.elapsed()
    }
}

/// Size and filter of an [`ActionLog`].
#[derive(Debug, Clone)]
pub struct ActionLogConfig {
    pub capacity: usize,
    pub filter: ActionLoggerConfig,
}

impl Default for ActionLogConfig {
    fn default() -> Self {
        Self::new(100, ActionLoggerConfig::default())
    }
}

impl ActionLogConfig {
    pub fn new(capacity: usize, filter: ActionLoggerConfig) -> Self {
        Self { capacity, filter }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(capacity, ActionLoggerConfig::default())
    }
}

/// Bounded history of logged envelopes; the oldest entry is evicted first.
#[derive(Debug, Clone)]
pub struct ActionLog {
    entries: VecDeque<ActionLogEntry>,
    config: ActionLogConfig,
    next_sequence: u64,
}

/// Handle shared between the lane (writer) and readers such as a UI pane.
pub type SharedActionLog = Arc<Mutex<ActionLog>>;

impl Default for ActionLog {
    fn default() -> Self {
        Self::new(ActionLogConfig::default())
    }
}

impl ActionLog {
    pub fn new(config: ActionLogConfig) -> Self {
        Self {
            entries: VecDeque::with_capacity(config.capacity),
            config,
            next_sequence: 0,
        }
    }

    /// Append an entry for `envelop` unless the filter drops its action.
    pub fn log<A: Action>(&mut self, envelop: &ActionEnvelop<A>) -> Option<&ActionLogEntry> {
        if self.config.capacity == 0 || !self.config.filter.should_log(envelop.action().name()) {
            return None;
        }

        while self.entries.len() >= self.config.capacity {
            self.entries.pop_front();
        }
        self.entries
            .push_back(ActionLogEntry::from_envelop(envelop, self.next_sequence));
        self.next_sequence += 1;
        self.entries.back()
    }

    /// Record the reducer result on the newest entry.
    pub fn update_last_state_changed(&mut self, changed: bool) {
        if let Some(last) = self.entries.back_mut() {
            last.state_changed = Some(changed);
        }
    }

    /// Oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &ActionLogEntry> {
        self.entries.iter()
    }

    /// Newest first, at most `count`.
    pub fn recent(&self, count: usize) -> impl Iterator<Item = &ActionLogEntry> {
        self.entries.iter().rev().take(count)
    }

    /// Entries emitted by one subscriber, oldest first.
    pub fn by_emitter<'a>(
        &'a self,
        emitter: &'a str,
    ) -> impl Iterator<Item = &'a ActionLogEntry> + 'a {
        self.entries
            .iter()
            .filter(move |entry| entry.emitter == emitter)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn config(&self) -> &ActionLogConfig {
        &self.config
    }
}

/// Lane middleware that traces envelopes and optionally keeps a history.
#[derive(Debug, Clone)]
pub struct ActionLoggerMiddleware {
    filter: ActionLoggerConfig,
    log: Option<SharedActionLog>,
    /// Whether `before` appended an entry that `after` should complete.
    pending_entry: bool,
    active: bool,
}

impl ActionLoggerMiddleware {
    /// Trace only, no history.
    pub fn new(filter: ActionLoggerConfig) -> Self {
        Self {
            filter,
            log: None,
            pending_entry: false,
            active: true,
        }
    }

    /// Trace and keep a history; fetch it with [`log`](Self::log).
    pub fn with_log(config: ActionLogConfig) -> Self {
        Self {
            filter: config.filter.clone(),
            log: Some(Arc::new(Mutex::new(ActionLog::new(config)))),
            pending_entry: false,
            active: true,
        }
    }

    /// Turn every hook into a no-op, e.g. when a `--debug` flag is absent.
    pub fn active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn log(&self) -> Option<SharedActionLog> {
        self.log.clone()
    }

    pub fn filter(&self) -> &ActionLoggerConfig {
        &self.filter
    }
}

impl<A: Action> Middleware<A> for ActionLoggerMiddleware {
    fn before(&mut self, envelop: &ActionEnvelop<A>) {
        self.pending_entry = false;
        if !self.active {
            return;
        }

        let name = envelop.action().name();
        if self.filter.should_log(name) {
            tracing::debug!(
                action = %name,
                emitter = %envelop.emitter(),
                scope = %envelop.dest_scope(),
                origin = %envelop.debug_info(),
                "action"
            );
        }

        if let Some(log) = &self.log {
            self.pending_entry = log.lock().log(envelop).is_some();
        }
    }

    fn after(&mut self, _envelop: &ActionEnvelop<A>, state_changed: bool) {
        if !self.active || !self.pending_entry {
            return;
        }
        if let Some(log) = &self.log {
            log.lock().update_last_state_changed(state_changed);
        }
        self.pending_entry = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelop::DestScope;

    #[derive(Clone, Debug, PartialEq)]
    enum NavAction {
        Tick,
        Open(u8),
        LoadPage,
    }

    impl Action for NavAction {
        type Success = ();
        type Failure = ();

        fn name(&self) -> &'static str {
            match self {
                NavAction::Tick => "Tick",
                NavAction::Open(_) => "Open",
                NavAction::LoadPage => "LoadPage",
            }
        }
    }

    fn from(emitter: &str, action: NavAction) -> ActionEnvelop<NavAction> {
        ActionEnvelop::new(emitter, action)
    }

    #[test]
    fn test_glob_literals_and_wildcards() {
        assert!(glob_match("Open", "Open"));
        assert!(!glob_match("Open", "Opened"));
        assert!(glob_match("Load*", "LoadPage"));
        assert!(glob_match("Load*", "Load"));
        assert!(glob_match("*Page", "LoadPage"));
        assert!(glob_match("*oa*", "LoadPage"));
        assert!(!glob_match("Load*", "Reload"));
        assert!(glob_match("Op?n", "Open"));
        assert!(!glob_match("Op?n", "Opn"));
        assert!(glob_match("*", ""));
        assert!(!glob_match("?", ""));
    }

    #[test]
    fn test_glob_backtracks_across_repeats() {
        assert!(glob_match("*ab", "aab"));
        assert!(glob_match("a*b*c", "axxbyybzc"));
        assert!(!glob_match("a*b*c", "axxbyyb"));
    }

    #[test]
    fn test_filter_include_then_exclude() {
        let config = ActionLoggerConfig::new(Some("Load*,Open"), Some("LoadP*"));
        assert!(config.should_log("Open"));
        assert!(config.should_log("LoadMore"));
        assert!(!config.should_log("LoadPage"));
        assert!(!config.should_log("Tick"));
    }

    #[test]
    fn test_filter_defaults() {
        let config = ActionLoggerConfig::new(None, None);
        assert_eq!(config, ActionLoggerConfig::default());
        assert!(!config.should_log("Render"));
        assert!(config.should_log("Open"));

        let config = ActionLoggerConfig::new(None, Some(" "));
        assert!(config.should_log("Tick"));
    }

    #[test]
    fn test_entry_keeps_routing_and_origin() {
        let mut log = ActionLog::default();
        let envelop = crate::envelop!("sidebar", NavAction::Open(2), DestScope::Emitter);

        let entry = log.log(&envelop).cloned().unwrap();
        assert_eq!(entry.name, "Open");
        assert_eq!(entry.emitter, "sidebar");
        assert_eq!(entry.scope, "emitter");
        assert_eq!(entry.summary, "Open(2)");
        assert!(entry.origin.file.ends_with("action_logger.rs"));
        assert_eq!(entry.state_changed, None);
    }

    #[test]
    fn test_filtered_actions_take_no_sequence_number() {
        let mut log = ActionLog::default();
        log.log(&from("a", NavAction::Open(1)));
        assert!(log.log(&from("a", NavAction::Tick)).is_none());
        log.log(&from("a", NavAction::Open(2)));

        let sequences: Vec<u64> = log.entries().map(|entry| entry.sequence).collect();
        assert_eq!(sequences, vec![0, 1]);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut log = ActionLog::new(ActionLogConfig::new(2, ActionLoggerConfig::everything()));
        for n in 0..5 {
            log.log(&from("a", NavAction::Open(n)));
        }
        let kept: Vec<&str> = log.entries().map(|entry| entry.summary.as_str()).collect();
        assert_eq!(kept, vec!["Open(3)", "Open(4)"]);

        let mut off = ActionLog::new(ActionLogConfig::with_capacity(0));
        assert!(off.log(&from("a", NavAction::Open(0))).is_none());
    }

    #[test]
    fn test_recent_and_by_emitter() {
        let mut log = ActionLog::new(ActionLogConfig::new(10, ActionLoggerConfig::everything()));
        for emitter in ["list", "detail", "list", "footer"] {
            log.log(&from(emitter, NavAction::LoadPage));
        }

        let newest: Vec<&str> = log.recent(2).map(|entry| entry.emitter.as_str()).collect();
        assert_eq!(newest, vec!["footer", "list"]);
        assert_eq!(log.by_emitter("list").count(), 2);
        assert_eq!(log.by_emitter("nobody").count(), 0);
    }

    #[test]
    fn test_middleware_marks_only_its_own_entries() {
        let mut middleware = ActionLoggerMiddleware::with_log(ActionLogConfig::default());
        let shared = middleware.log().unwrap();

        let open = from("a", NavAction::Open(1));
        Middleware::before(&mut middleware, &open);
        Middleware::after(&mut middleware, &open, true);

        // filtered out, so the previous entry keeps its flag
        let tick = from("a", NavAction::Tick);
        Middleware::before(&mut middleware, &tick);
        Middleware::after(&mut middleware, &tick, false);

        let history = shared.lock();
        assert_eq!(history.len(), 1);
        assert_eq!(history.recent(1).next().unwrap().state_changed, Some(true));
    }

    #[test]
    fn test_inactive_middleware_keeps_nothing() {
        let mut middleware =
            ActionLoggerMiddleware::with_log(ActionLogConfig::default()).active(false);
        let open = from("a", NavAction::Open(1));
        Middleware::before(&mut middleware, &open);
        Middleware::after(&mut middleware, &open, true);
        assert!(middleware.log().unwrap().lock().is_empty());
        assert!(!middleware.is_active());
    }
}
