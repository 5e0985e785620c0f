//! Middleware and action log wired into a running store.

use std::sync::Arc;

use statecast::debug::{ActionLogConfig, ActionLoggerConfig, ActionLoggerMiddleware};
use statecast::{
    envelop, Action, ComposedMiddleware, DestScope, LoggingMiddleware, Store, StoreConfig,
    Subscriber, SubscriberExt,
};

#[derive(Action, Clone, Debug, PartialEq)]
enum Nav {
    Tick,
    Select(usize),
    Back,
}

fn reducer(state: &usize, action: &Nav) -> usize {
    match action {
        Nav::Tick => *state,
        Nav::Select(index) => *index,
        Nav::Back => state.saturating_sub(1),
    }
}

#[tokio::test]
async fn test_log_records_emitter_scope_and_origin() {
    let logger = ActionLoggerMiddleware::with_log(ActionLogConfig::default());
    let log = logger.log().unwrap();
    let store = Store::with_middleware(
        0usize,
        reducer,
        StoreConfig::default(),
        ComposedMiddleware::new()
            .add(LoggingMiddleware::verbose())
            .add(logger),
    )
    .unwrap();

    store
        .dispatch(envelop!("list", Nav::Select(3), DestScope::authorized(["detail"])))
        .unwrap();
    store.dispatch_action("clock", Nav::Tick).unwrap();
    store.dispatch_action("list", Nav::Select(3)).unwrap();
    store.settled().await;

    let log = log.lock();
    // Tick is excluded by default
    assert_eq!(log.len(), 2);

    let entries: Vec<_> = log.entries().collect();
    assert_eq!(entries[0].name, "Select");
    assert_eq!(entries[0].emitter, "list");
    assert_eq!(entries[0].scope, "authorized(detail)");
    assert_eq!(entries[0].summary, "Select(3)");
    assert!(entries[0].origin.file.ends_with("action_log.rs"));
    assert_eq!(entries[0].state_changed, Some(true));

    // stamped by `dispatch_action` itself, and reduced to the same state
    assert!(entries[1].origin.file.ends_with("action_log.rs"));
    assert!(entries[1].origin.line > entries[0].origin.line);
    assert_eq!(entries[1].state_changed, Some(false));
}

struct Toolbar;

impl Subscriber<usize, Nav> for Toolbar {
    fn subscription_name(&self) -> &str {
        "toolbar"
    }
}

#[tokio::test]
async fn test_subscriber_dispatch_records_call_site() {
    let logger = ActionLoggerMiddleware::with_log(ActionLogConfig::default());
    let log = logger.log().unwrap();
    let store = Store::with_middleware(5usize, reducer, StoreConfig::default(), logger).unwrap();
    let toolbar = Arc::new(Toolbar);
    store.subscribe(&toolbar).unwrap();

    let line = line!() + 1;
    toolbar.dispatch_to_store(Nav::Back, &store).unwrap();
    toolbar.dispatch_with(Nav::Select(1), &store, DestScope::Emitter, None).unwrap();
    store.settled().await;

    let log = log.lock();
    let origins: Vec<_> = log.entries().map(|e| e.origin).collect();
    assert_eq!(origins.len(), 2);
    for origin in &origins {
        assert!(origin.is_known());
        assert!(origin.file.ends_with("action_log.rs"));
    }
    assert_eq!(origins[0].line, line);
    assert_eq!(origins[1].line, line + 1);
}

#[tokio::test]
async fn test_log_capacity_and_include_filter() {
    let filter = ActionLoggerConfig::new(Some("Back"), None);
    let logger = ActionLoggerMiddleware::with_log(ActionLogConfig::new(2, filter));
    let log = logger.log().unwrap();
    let store = Store::with_middleware(10usize, reducer, StoreConfig::default(), logger).unwrap();

    for _ in 0..3 {
        store.dispatch_action("toolbar", Nav::Back).unwrap();
    }
    store.dispatch_action("toolbar", Nav::Select(1)).unwrap();
    store.settled().await;

    let log = log.lock();
    let sequences: Vec<u64> = log.entries().map(|e| e.sequence).collect();
    assert_eq!(sequences, vec![1, 2]);
    assert_eq!(log.by_emitter("toolbar").count(), 2);
    assert_eq!(*store.current_state(), 1);
}
