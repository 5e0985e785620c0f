//! Centralized state store with a single dispatch lane
//!
//! The store owns the current state as an `Arc<S>` and replaces it as a whole
//! value on every dispatch. Envelopes are queued onto one lane task per store
//! and processed strictly in the order they were dispatched:
//!
//! 1. middleware `before`
//! 2. `new = reducer.reduce(&old, action)`, then the state swap
//! 3. `state_did_update(source, old, new)` posted to every subscriber in scope
//! 4. middleware `after`
//!
//! `did_start_loading` is not part of the lane: the emitting subscriber runs
//! it itself before queuing (see [`SubscriberExt`](crate::SubscriberExt)).
//!
//! Each subscriber has its own mailbox, so a subscriber that is slow to call
//! its completion only delays itself. The lane never waits on subscribers.
//!
//! # Example
//! ```ignore
//! #[derive(Clone, Debug, PartialEq, Default)]
//! struct Counter {
//!     count: i32,
//! }
//!
//! #[derive(Action, Clone, Debug, PartialEq)]
//! enum CounterAction {
//!     Increment,
//! }
//!
//! fn reducer(state: &Counter, action: &CounterAction) -> Counter {
//!     match action {
//!         CounterAction::Increment => Counter { count: state.count + 1 },
//!     }
//! }
//!
//! let store = Store::new(Counter::default(), reducer)?;
//! store.dispatch(envelop!("toolbar", CounterAction::Increment))?;
//! store.settled().await;
//! assert_eq!(store.current_state().count, 1);
//! ```

use std::any::{type_name, TypeId};
use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::StoreConfig;
use crate::envelop::{ActionEnvelop, DebugInfo, DestScope, Payload};
use crate::error::StoreError;
use crate::mailbox::Delivery;
use crate::registry::{Registered, SubscriberRegistry};
use crate::subscriber::Subscriber;
use crate::Action;

/// Computes the next state from the current state and an action.
///
/// Must be pure and fast: no I/O, no blocking. A failed outcome is returned
/// as part of the new state, never as a panic.
///
/// Plain functions and closures `Fn(&S, &A) -> S` implement this trait with
/// the action's own outcome types. Implement it by hand to declare different
/// outcome types; [`Store::new`] then rejects the pairing.
pub trait Reducer<S, A: Action>: Send + Sync + 'static {
    type Success: 'static;
    type Failure: 'static;

    fn reduce(&self, state: &S, action: &A) -> S;
}

impl<S, A, F> Reducer<S, A> for F
where
    A: Action,
    F: Fn(&S, &A) -> S + Send + Sync + 'static,
{
    type Success = A::Success;
    type Failure = A::Failure;

    fn reduce(&self, state: &S, action: &A) -> S {
        self(state, action)
    }
}

type BoxedReduce<S, A> = Box<dyn Fn(&S, &A) -> S + Send + Sync>;

fn validate_reducer<S, A, R>() -> Result<(), StoreError>
where
    A: Action,
    R: Reducer<S, A>,
{
    let matches = TypeId::of::<R::Success>() == TypeId::of::<A::Success>()
        && TypeId::of::<R::Failure>() == TypeId::of::<A::Failure>();
    if matches {
        return Ok(());
    }
    Err(StoreError::InvalidAction {
        action: type_name::<A>(),
        expected: format!(
            "({}, {})",
            type_name::<A::Success>(),
            type_name::<A::Failure>()
        ),
        found: format!(
            "({}, {})",
            type_name::<R::Success>(),
            type_name::<R::Failure>()
        ),
    })
}

enum LaneMessage<A: Action> {
    Dispatch(ActionEnvelop<A>),
    Settle(oneshot::Sender<()>),
}

struct Shared<S, A: Action> {
    state: RwLock<Arc<S>>,
    registry: Mutex<SubscriberRegistry<S, A>>,
}

/// Handle to a store. Cheap to clone; all clones share one state and lane.
///
/// The lane stops when [`shutdown`](Store::shutdown) is called or when the
/// last handle is dropped, releasing every subscription.
pub struct Store<S, A: Action> {
    shared: Arc<Shared<S, A>>,
    lane_tx: mpsc::UnboundedSender<LaneMessage<A>>,
    cancel: CancellationToken,
}

impl<S, A: Action> Clone for Store<S, A> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
            lane_tx: self.lane_tx.clone(),
            cancel: self.cancel.clone(),
        }
    }
}

impl<S, A> fmt::Debug for Store<S, A>
where
    S: Send + Sync + 'static,
    A: Action,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("subscribers", &self.shared.registry.lock().len())
            .field("closed", &self.cancel.is_cancelled())
            .finish()
    }
}

impl<S, A> Store<S, A>
where
    S: PartialEq + Send + Sync + 'static,
    A: Action,
{
    /// Create a store with the default config.
    ///
    /// Fails with [`StoreError::InvalidAction`] when the reducer's outcome
    /// types differ from the action's, and with [`StoreError::NoRuntime`]
    /// outside a tokio runtime. The store keeps a handle to that runtime, so
    /// later calls may come from any thread.
    pub fn new<R>(state: S, reducer: R) -> Result<Self, StoreError>
    where
        R: Reducer<S, A>,
    {
        Self::with_config(state, reducer, StoreConfig::default())
    }

    pub fn with_config<R>(state: S, reducer: R, config: StoreConfig) -> Result<Self, StoreError>
    where
        R: Reducer<S, A>,
    {
        Self::with_middleware(state, reducer, config, NoopMiddleware)
    }

    /// Create a store whose lane runs `middleware` around every reduce step.
    pub fn with_middleware<R, M>(
        state: S,
        reducer: R,
        config: StoreConfig,
        middleware: M,
    ) -> Result<Self, StoreError>
    where
        R: Reducer<S, A>,
        M: Middleware<A>,
    {
        validate_reducer::<S, A, R>()?;
        let runtime = Handle::try_current().map_err(|_| StoreError::NoRuntime)?;

        let shared = Arc::new(Shared {
            state: RwLock::new(Arc::new(state)),
            registry: Mutex::new(SubscriberRegistry::new(
                config.duplicate_names,
                runtime.clone(),
            )),
        });
        let (lane_tx, lane_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let reduce: BoxedReduce<S, A> =
            Box::new(move |state: &S, action: &A| reducer.reduce(state, action));

        runtime.spawn(run_lane(
            shared.clone(),
            reduce,
            Box::new(middleware),
            lane_rx,
            cancel.clone(),
        ));

        Ok(Self {
            shared,
            lane_tx,
            cancel,
        })
    }

    /// Queue an envelope on the dispatch lane.
    ///
    /// Returns as soon as the envelope is queued; use
    /// [`settled`](Store::settled) to wait for it to be reduced.
    pub fn dispatch(&self, envelop: ActionEnvelop<A>) -> Result<(), StoreError> {
        if self.cancel.is_cancelled() {
            return Err(StoreError::Closed);
        }
        self.lane_tx
            .send(LaneMessage::Dispatch(envelop))
            .map_err(|_| StoreError::Closed)
    }

    /// Dispatch `action` from `emitter` to every subscriber, stamped with
    /// the caller's location.
    #[track_caller]
    pub fn dispatch_action(&self, emitter: impl Into<String>, action: A) -> Result<(), StoreError> {
        self.dispatch(ActionEnvelop::new(emitter, action).with_debug_info(DebugInfo::caller()))
    }

    /// Dispatch with an explicit scope and optional payload.
    #[track_caller]
    pub fn dispatch_to(
        &self,
        emitter: impl Into<String>,
        action: A,
        scope: DestScope,
        payload: Option<Payload>,
    ) -> Result<(), StoreError> {
        let envelop = ActionEnvelop::new(emitter, action)
            .with_scope(scope)
            .with_debug_info(DebugInfo::caller());
        let envelop = match payload {
            Some(payload) => envelop.with_payload(payload),
            None => envelop,
        };
        self.dispatch(envelop)
    }

    /// Register a subscriber under its `subscription_name`.
    ///
    /// Subscribing the same instance twice is a no-op. A different live
    /// subscriber with the same name is handled by the configured
    /// [`DuplicateNamePolicy`](crate::DuplicateNamePolicy).
    pub fn subscribe<T>(&self, subscriber: &Arc<T>) -> Result<(), StoreError>
    where
        T: Subscriber<S, A>,
    {
        if self.cancel.is_cancelled() {
            return Err(StoreError::Closed);
        }
        let outcome = self.shared.registry.lock().register(subscriber)?;
        if outcome != Registered::AlreadyRegistered {
            debug!(subscriber = %subscriber.subscription_name(), ?outcome, "subscribed");
        }
        Ok(())
    }

    /// Remove a subscriber. Unknown or already removed subscribers are ignored.
    ///
    /// Notifications still queued for it are dropped.
    pub fn unsubscribe<T>(&self, subscriber: &T)
    where
        T: Subscriber<S, A> + ?Sized,
    {
        let name = subscriber.subscription_name();
        let identity = subscriber as *const T as *const ();
        if self.shared.registry.lock().unregister(name, identity) {
            debug!(subscriber = %name, "unsubscribed");
        }
    }

    /// Latest committed state.
    pub fn current_state(&self) -> Arc<S> {
        self.shared.state.read().clone()
    }

    pub fn is_subscribed(&self, name: &str) -> bool {
        self.shared.registry.lock().is_registered(name)
    }

    /// Names of live subscribers, sorted.
    pub fn subscriber_names(&self) -> Vec<String> {
        self.shared.registry.lock().names()
    }

    /// Wait until every envelope dispatched before this call has been
    /// reduced and its notifications posted to subscriber mailboxes.
    ///
    /// Subscribers may still be working on them. Returns immediately once
    /// the store is closed.
    pub async fn settled(&self) {
        let (tx, rx) = oneshot::channel();
        if self.lane_tx.send(LaneMessage::Settle(tx)).is_ok() {
            let _ = rx.await;
        }
    }

    /// Stop the lane and release every subscription.
    ///
    /// Envelopes still queued are discarded. Later dispatches fail with
    /// [`StoreError::Closed`].
    pub fn shutdown(&self) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.cancel.cancel();
        self.shared.registry.lock().clear();
        debug!("store shut down");
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub(crate) fn owns_name_or_vacant(&self, name: &str, identity: *const ()) -> bool {
        self.shared
            .registry
            .lock()
            .owns_name_or_vacant(name, identity)
    }
}

async fn run_lane<S, A>(
    shared: Arc<Shared<S, A>>,
    reduce: BoxedReduce<S, A>,
    mut middleware: Box<dyn Middleware<A>>,
    mut rx: mpsc::UnboundedReceiver<LaneMessage<A>>,
    cancel: CancellationToken,
) where
    S: PartialEq + Send + Sync + 'static,
    A: Action,
{
    loop {
        let message = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            message = rx.recv() => match message {
                Some(message) => message,
                None => break,
            },
        };

        match message {
            LaneMessage::Dispatch(envelop) => {
                process_envelop(&shared, &reduce, middleware.as_mut(), envelop);
            }
            LaneMessage::Settle(done) => {
                let _ = done.send(());
            }
        }
    }

    shared.registry.lock().clear();
    debug!("dispatch lane stopped");
}

fn process_envelop<S, A>(
    shared: &Shared<S, A>,
    reduce: &BoxedReduce<S, A>,
    middleware: &mut dyn Middleware<A>,
    envelop: ActionEnvelop<A>,
) where
    S: PartialEq + Send + Sync + 'static,
    A: Action,
{
    let source = Arc::new(envelop);
    middleware.before(&source);

    let targets = shared.registry.lock().targets(&source);

    let old = shared.state.read().clone();
    let new = Arc::new(reduce(old.as_ref(), source.action()));
    let changed = *old != *new;
    *shared.state.write() = new.clone();

    debug!(
        action = %source.action().name(),
        emitter = %source.emitter(),
        scope = %source.dest_scope(),
        subscribers = targets.len(),
        changed,
        "state committed"
    );

    for target in &targets {
        target.post(Delivery::Update {
            source: source.clone(),
            old: old.clone(),
            new: new.clone(),
            silent: source.resolve_silent(target.name()),
        });
    }

    middleware.after(&source, changed);
}

/// Middleware trait for observing envelopes on the dispatch lane
///
/// Implement this trait to add logging, metrics or other cross-cutting
/// concerns to a store. Hooks run on the lane, in dispatch order.
pub trait Middleware<A: Action>: Send + 'static {
    /// Called before the reducer runs
    fn before(&mut self, envelop: &ActionEnvelop<A>);

    /// Called after the new state is committed and notifications are posted
    fn after(&mut self, envelop: &ActionEnvelop<A>, state_changed: bool);
}

/// A no-op middleware that does nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMiddleware;

impl<A: Action> Middleware<A> for NoopMiddleware {
    fn before(&mut self, _envelop: &ActionEnvelop<A>) {}
    fn after(&mut self, _envelop: &ActionEnvelop<A>, _state_changed: bool) {}
}

/// Middleware that logs envelopes through `tracing`
#[derive(Debug, Clone, Default)]
pub struct LoggingMiddleware {
    /// Whether to log before dispatch
    pub log_before: bool,
    /// Whether to log after dispatch
    pub log_after: bool,
}

impl LoggingMiddleware {
    /// Create a new logging middleware with default settings (log after only)
    pub fn new() -> Self {
        Self {
            log_before: false,
            log_after: true,
        }
    }

    /// Create a logging middleware that logs both before and after
    pub fn verbose() -> Self {
        Self {
            log_before: true,
            log_after: true,
        }
    }
}

impl<A: Action> Middleware<A> for LoggingMiddleware {
    fn before(&mut self, envelop: &ActionEnvelop<A>) {
        if self.log_before {
            tracing::debug!(
                action = %envelop.action().name(),
                emitter = %envelop.emitter(),
                origin = %envelop.debug_info(),
                "Dispatching action"
            );
        }
    }

    fn after(&mut self, envelop: &ActionEnvelop<A>, state_changed: bool) {
        if self.log_after {
            tracing::debug!(
                action = %envelop.action().name(),
                emitter = %envelop.emitter(),
                state_changed = state_changed,
                "Action processed"
            );
        }
    }
}

/// Compose multiple middleware into a single middleware
pub struct ComposedMiddleware<A: Action> {
    middlewares: Vec<Box<dyn Middleware<A>>>,
}

impl<A: Action> fmt::Debug for ComposedMiddleware<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComposedMiddleware")
            .field("middlewares_count", &self.middlewares.len())
            .finish()
    }
}

impl<A: Action> Default for ComposedMiddleware<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: Action> ComposedMiddleware<A> {
    /// Create a new composed middleware
    pub fn new() -> Self {
        Self {
            middlewares: Vec::new(),
        }
    }

    /// Add a middleware to the composition
    pub fn add<M: Middleware<A>>(mut self, middleware: M) -> Self {
        self.middlewares.push(Box::new(middleware));
        self
    }
}

impl<A: Action> Middleware<A> for ComposedMiddleware<A> {
    fn before(&mut self, envelop: &ActionEnvelop<A>) {
        for middleware in &mut self.middlewares {
            middleware.before(envelop);
        }
    }

    fn after(&mut self, envelop: &ActionEnvelop<A>, state_changed: bool) {
        // Call in reverse order for proper nesting
        for middleware in self.middlewares.iter_mut().rev() {
            middleware.after(envelop, state_changed);
        }
    }
}
