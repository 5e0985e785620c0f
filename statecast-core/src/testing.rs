//! Test utilities for statecast stores
//!
//! - [`RecordingSubscriber`]: a subscriber that records every hook call, with
//!   immediate, manual or discarded completions
//! - `wait_*` helpers that wake on each recorded hook instead of polling
//! - Assertion macros for checking recorded notifications
//!
//! # Example
//!
//! ```ignore
//! use statecast::testing::{Notification, RecordingSubscriber};
//! use statecast::{assert_notified, count_notified};
//!
//! let a = Arc::new(RecordingSubscriber::<Counter, CounterAction>::new("A"));
//! store.subscribe(&a)?;
//! a.dispatch_to_store(CounterAction::Increment, &store)?;
//!
//! assert!(a.wait_for_updates(1).await);
//! let seen = a.notifications();
//! assert_notified!(seen, Notification::Update { action: CounterAction::Increment, .. });
//! assert_eq!(count_notified!(seen, Notification::FinishLoading { .. }), 1);
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::envelop::ActionEnvelop;
use crate::subscriber::{Completion, Subscriber};
use crate::Action;

/// How long the `wait_*` helpers wait before giving up.
pub const DEFAULT_WAIT: Duration = Duration::from_secs(2);

/// One hook call observed by a [`RecordingSubscriber`].
pub enum Notification<S, A> {
    StartLoading {
        silent: bool,
    },
    Update {
        action: A,
        emitter: String,
        old: Arc<S>,
        new: Arc<S>,
    },
    FinishUpdate {
        action: A,
        new: Arc<S>,
    },
    FinishLoading {
        state: Arc<S>,
        silent: bool,
    },
}

impl<S, A: Clone> Clone for Notification<S, A> {
    fn clone(&self) -> Self {
        match self {
            Notification::StartLoading { silent } => Notification::StartLoading { silent: *silent },
            Notification::Update {
                action,
                emitter,
                old,
                new,
            } => Notification::Update {
                action: action.clone(),
                emitter: emitter.clone(),
                old: old.clone(),
                new: new.clone(),
            },
            Notification::FinishUpdate { action, new } => Notification::FinishUpdate {
                action: action.clone(),
                new: new.clone(),
            },
            Notification::FinishLoading { state, silent } => Notification::FinishLoading {
                state: state.clone(),
                silent: *silent,
            },
        }
    }
}

impl<S: fmt::Debug, A: fmt::Debug> fmt::Debug for Notification<S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notification::StartLoading { silent } => f
                .debug_struct("StartLoading")
                .field("silent", silent)
                .finish(),
            Notification::Update {
                action,
                emitter,
                old,
                new,
            } => f
                .debug_struct("Update")
                .field("action", action)
                .field("emitter", emitter)
                .field("old", old)
                .field("new", new)
                .finish(),
            Notification::FinishUpdate { action, new } => f
                .debug_struct("FinishUpdate")
                .field("action", action)
                .field("new", new)
                .finish(),
            Notification::FinishLoading { state, silent } => f
                .debug_struct("FinishLoading")
                .field("state", state)
                .field("silent", silent)
                .finish(),
        }
    }
}

impl<S, A> Notification<S, A> {
    pub fn is_update(&self) -> bool {
        matches!(self, Notification::Update { .. })
    }

    /// Short label, handy for comparing hook order.
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::StartLoading { .. } => "start_loading",
            Notification::Update { .. } => "update",
            Notification::FinishUpdate { .. } => "finish_update",
            Notification::FinishLoading { .. } => "finish_loading",
        }
    }
}

/// What a [`RecordingSubscriber`] does with the completion it is handed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompletionMode {
    /// Complete inside `state_did_update`.
    #[default]
    Immediate,
    /// Hold completions until [`RecordingSubscriber::release_one`] or
    /// [`RecordingSubscriber::release_all`].
    Manual,
    /// Drop completions without calling them.
    Discard,
}

/// Subscriber that records every hook call for later assertions.
pub struct RecordingSubscriber<S, A> {
    name: String,
    mode: CompletionMode,
    silent_actions: bool,
    notifications: Mutex<Vec<Notification<S, A>>>,
    pending: Mutex<VecDeque<Completion>>,
    changed: Notify,
}

impl<S, A> fmt::Debug for RecordingSubscriber<S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingSubscriber")
            .field("name", &self.name)
            .field("mode", &self.mode)
            .field("notifications", &self.notifications.lock().len())
            .field("pending", &self.pending.lock().len())
            .finish()
    }
}

impl<S, A> RecordingSubscriber<S, A>
where
    S: Send + Sync + 'static,
    A: Action,
{
    /// Recorder that completes every update immediately.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_mode(name, CompletionMode::Immediate)
    }

    /// Recorder that holds completions until released.
    pub fn manual(name: impl Into<String>) -> Self {
        Self::with_mode(name, CompletionMode::Manual)
    }

    pub fn with_mode(name: impl Into<String>, mode: CompletionMode) -> Self {
        Self {
            name: name.into(),
            mode,
            silent_actions: true,
            notifications: Mutex::new(Vec::new()),
            pending: Mutex::new(VecDeque::new()),
            changed: Notify::new(),
        }
    }

    /// Value returned from `is_action_silent` for every action; `true`
    /// unless set.
    pub fn silent_actions(mut self, silent: bool) -> Self {
        self.silent_actions = silent;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Everything recorded so far, oldest first.
    pub fn notifications(&self) -> Vec<Notification<S, A>> {
        self.notifications.lock().clone()
    }

    /// Take everything recorded so far.
    pub fn drain(&self) -> Vec<Notification<S, A>> {
        std::mem::take(&mut *self.notifications.lock())
    }

    /// Hook labels in call order.
    pub fn kinds(&self) -> Vec<&'static str> {
        self.notifications.lock().iter().map(Notification::kind).collect()
    }

    pub fn update_count(&self) -> usize {
        self.notifications
            .lock()
            .iter()
            .filter(|n| n.is_update())
            .count()
    }

    /// Completions held in [`CompletionMode::Manual`].
    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }

    /// Complete the oldest held update. Returns `false` if none was held.
    pub fn release_one(&self) -> bool {
        let completion = self.pending.lock().pop_front();
        match completion {
            Some(completion) => {
                completion.complete();
                true
            }
            None => false,
        }
    }

    /// Complete every held update, oldest first.
    pub fn release_all(&self) -> usize {
        let held: Vec<Completion> = self.pending.lock().drain(..).collect();
        let count = held.len();
        for completion in held {
            completion.complete();
        }
        count
    }

    /// Wait until `condition` holds for the recorded notifications.
    ///
    /// Returns `false` if it still does not hold after `timeout`.
    pub async fn wait_until<F>(&self, timeout: Duration, mut condition: F) -> bool
    where
        F: FnMut(&[Notification<S, A>]) -> bool,
    {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            // register before checking so a concurrent record is not missed
            notified.as_mut().enable();

            if condition(&self.notifications.lock()) {
                return true;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return condition(&self.notifications.lock());
            }
        }
    }

    /// Wait for at least `count` recorded notifications of any kind.
    pub async fn wait_for_count(&self, count: usize) -> bool {
        self.wait_until(DEFAULT_WAIT, |seen| seen.len() >= count)
            .await
    }

    /// Wait for at least `count` `state_did_update` calls.
    pub async fn wait_for_updates(&self, count: usize) -> bool {
        self.wait_until(DEFAULT_WAIT, |seen| {
            seen.iter().filter(|n| n.is_update()).count() >= count
        })
        .await
    }

    /// Wait for at least `count` `did_finish_loading` calls.
    pub async fn wait_for_finished(&self, count: usize) -> bool {
        self.wait_until(DEFAULT_WAIT, |seen| {
            seen.iter()
                .filter(|n| matches!(n, Notification::FinishLoading { .. }))
                .count()
                >= count
        })
        .await
    }

    fn record(&self, notification: Notification<S, A>) {
        self.notifications.lock().push(notification);
        self.changed.notify_waiters();
    }
}

impl<S, A> Subscriber<S, A> for RecordingSubscriber<S, A>
where
    S: Send + Sync + 'static,
    A: Action,
{
    fn subscription_name(&self) -> &str {
        &self.name
    }

    fn state_did_update(
        &self,
        source: &ActionEnvelop<A>,
        old: &Arc<S>,
        new: &Arc<S>,
        completion: Completion,
    ) {
        // held before recording, so a woken waiter always sees it pending
        match self.mode {
            CompletionMode::Immediate => completion.complete(),
            CompletionMode::Manual => self.pending.lock().push_back(completion),
            CompletionMode::Discard => drop(completion),
        }
        self.record(Notification::Update {
            action: source.action().clone(),
            emitter: source.emitter().to_string(),
            old: old.clone(),
            new: new.clone(),
        });
    }

    fn did_finish_state_update(&self, source: &ActionEnvelop<A>, _old: &Arc<S>, new: &Arc<S>) {
        self.record(Notification::FinishUpdate {
            action: source.action().clone(),
            new: new.clone(),
        });
    }

    fn did_start_loading(&self, silent: bool) {
        self.record(Notification::StartLoading { silent });
    }

    fn did_finish_loading(&self, state: &Arc<S>, silent: bool) {
        self.record(Notification::FinishLoading {
            state: state.clone(),
            silent,
        });
    }

    fn is_action_silent(&self, _action: &A) -> bool {
        self.silent_actions
    }
}

/// Assert that a notification matching a pattern was recorded.
///
/// # Example
///
/// ```ignore
/// use statecast::assert_notified;
///
/// let seen = recorder.notifications();
/// assert_notified!(seen, Notification::StartLoading { silent: false });
/// ```
#[macro_export]
macro_rules! assert_notified {
    ($notes:expr, $pattern:pat $(if $guard:expr)?) => {
        assert!(
            $notes.iter().any(|n| matches!(n, $pattern $(if $guard)?)),
            "Expected notification matching `{}`, but got: {:?}",
            stringify!($pattern),
            $notes
        );
    };
}

/// Assert that NO notification matching a pattern was recorded.
#[macro_export]
macro_rules! assert_not_notified {
    ($notes:expr, $pattern:pat $(if $guard:expr)?) => {
        assert!(
            !$notes.iter().any(|n| matches!(n, $pattern $(if $guard)?)),
            "Expected NO notification matching `{}`, but it was recorded: {:?}",
            stringify!($pattern),
            $notes
        );
    };
}

/// Count recorded notifications matching a pattern.
///
/// ```ignore
/// assert_eq!(count_notified!(seen, Notification::Update { .. }), 3);
/// ```
#[macro_export]
macro_rules! count_notified {
    ($notes:expr, $pattern:pat $(if $guard:expr)?) => {
        $notes.iter().filter(|n| matches!(n, $pattern $(if $guard)?)).count()
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;
    use crate::subscriber::SubscriberExt;

    #[derive(Clone, Debug, PartialEq)]
    enum TestAction {
        Bump,
        Noop,
    }

    impl Action for TestAction {
        type Success = ();
        type Failure = ();

        fn name(&self) -> &'static str {
            match self {
                TestAction::Bump => "Bump",
                TestAction::Noop => "Noop",
            }
        }
    }

    fn reducer(state: &u32, action: &TestAction) -> u32 {
        match action {
            TestAction::Bump => state + 1,
            TestAction::Noop => *state,
        }
    }

    #[tokio::test]
    async fn test_recorder_sees_hooks_in_order() {
        let store = Store::new(0u32, reducer).unwrap();
        let rec = Arc::new(RecordingSubscriber::<u32, TestAction>::new("rec"));
        store.subscribe(&rec).unwrap();

        rec.dispatch_to_store(TestAction::Bump, &store).unwrap();
        assert!(rec.wait_for_finished(1).await);

        assert_eq!(
            rec.kinds(),
            vec!["start_loading", "update", "finish_update", "finish_loading"]
        );
        let seen = rec.notifications();
        assert_notified!(seen, Notification::Update { action: TestAction::Bump, .. });
        assert_notified!(seen, Notification::FinishLoading { state, .. } if **state == 1);
        assert_not_notified!(seen, Notification::Update { action: TestAction::Noop, .. });
    }

    #[tokio::test]
    async fn test_manual_mode_holds_finish_hooks() {
        let store = Store::new(0u32, reducer).unwrap();
        let rec = Arc::new(RecordingSubscriber::<u32, TestAction>::manual("rec"));
        store.subscribe(&rec).unwrap();

        store.dispatch_action("other", TestAction::Bump).unwrap();
        store.dispatch_action("other", TestAction::Bump).unwrap();
        assert!(rec.wait_for_updates(1).await);

        // the second update waits behind the first completion
        assert_eq!(rec.update_count(), 1);
        assert_eq!(rec.pending(), 1);
        assert_eq!(count_notified!(rec.notifications(), Notification::FinishLoading { .. }), 0);

        assert!(rec.release_one());
        assert!(rec.wait_for_updates(2).await);
        assert_eq!(rec.release_all(), 1);
        assert!(rec.wait_for_finished(2).await);
        assert!(!rec.release_one());
    }

    #[tokio::test]
    async fn test_discard_mode_skips_finish_hooks() {
        let store = Store::new(0u32, reducer).unwrap();
        let rec = Arc::new(RecordingSubscriber::<u32, TestAction>::with_mode(
            "rec",
            CompletionMode::Discard,
        ));
        store.subscribe(&rec).unwrap();

        store.dispatch_action("other", TestAction::Bump).unwrap();
        store.dispatch_action("other", TestAction::Bump).unwrap();
        assert!(rec.wait_for_updates(2).await);

        let seen = rec.notifications();
        assert_not_notified!(seen, Notification::FinishUpdate { .. });
        assert_not_notified!(seen, Notification::FinishLoading { .. });
    }

    #[tokio::test]
    async fn test_wait_until_times_out() {
        let rec = RecordingSubscriber::<u32, TestAction>::new("idle");
        assert!(
            !rec.wait_until(Duration::from_millis(20), |seen| !seen.is_empty())
                .await
        );
    }

    #[test]
    fn test_drain_empties_record() {
        let rec = RecordingSubscriber::<u32, TestAction>::new("rec");
        rec.did_start_loading(true);
        assert_eq!(rec.drain().len(), 1);
        assert!(rec.notifications().is_empty());
    }
}
