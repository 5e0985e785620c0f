//! The subscribing contract
//!
//! A subscriber is a named participant that hears about state updates from a
//! store. The store only keeps a weak reference to it, so dropping the last
//! `Arc` is enough to stop deliveries.
//!
//! When a subscriber dispatches through [`SubscriberExt`], its
//! [`did_start_loading`](Subscriber::did_start_loading) runs right away, on
//! the calling thread, before the envelope is queued. Then, for every
//! envelope whose scope admits a subscriber, hooks fire in this order, one
//! envelope at a time:
//!
//! 1. [`state_did_update`](Subscriber::state_did_update) with a [`Completion`]
//! 2. once the completion is called:
//!    [`did_finish_state_update`](Subscriber::did_finish_state_update), then
//!    [`did_finish_loading`](Subscriber::did_finish_loading)
//!
//! # Example
//!
//! ```ignore
//! struct Sidebar { rows: Mutex<Vec<String>> }
//!
//! impl Subscriber<AppState, AppAction> for Sidebar {
//!     fn subscription_name(&self) -> &str {
//!         "sidebar"
//!     }
//!
//!     fn state_did_update(
//!         &self,
//!         _source: &ActionEnvelop<AppAction>,
//!         _old: &Arc<AppState>,
//!         new: &Arc<AppState>,
//!         completion: Completion,
//!     ) {
//!         *self.rows.lock() = new.items.clone();
//!         completion.complete();
//!     }
//! }
//!
//! let sidebar = Arc::new(Sidebar { rows: Mutex::default() });
//! store.subscribe(&sidebar)?;
//! sidebar.dispatch_to_store(AppAction::Refresh, &store)?;
//! ```

use std::fmt;
use std::sync::Arc;

use tokio::sync::oneshot;

use crate::envelop::{ActionEnvelop, DebugInfo, DestScope, Payload};
use crate::error::StoreError;
use crate::store::Store;
use crate::Action;

/// Signals that a subscriber finished reacting to a state update.
///
/// Call [`complete`](Completion::complete) when the work triggered by
/// `state_did_update` is done; it may be moved to another task first.
/// Dropping it without calling `complete` means the finish hooks for that
/// update never fire.
#[must_use = "finish hooks only fire after `complete()` is called"]
pub struct Completion {
    tx: oneshot::Sender<()>,
}

impl Completion {
    pub(crate) fn new() -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, rx)
    }

    pub fn complete(self) {
        // the mailbox may already be gone if the subscriber was unregistered
        let _ = self.tx.send(());
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

/// A named participant receiving state updates from a [`Store`].
///
/// `subscription_name` identifies the subscriber for scope filtering and
/// must stay the same for as long as it is registered.
pub trait Subscriber<S, A: Action>: Send + Sync + 'static {
    fn subscription_name(&self) -> &str;

    /// A committed state change in this subscriber's scope.
    ///
    /// `old` and `new` are shared snapshots; later dispatches never change
    /// them. The default completes immediately.
    fn state_did_update(
        &self,
        source: &ActionEnvelop<A>,
        old: &Arc<S>,
        new: &Arc<S>,
        completion: Completion,
    ) {
        let _ = (source, old, new);
        completion.complete();
    }

    fn did_finish_state_update(&self, _source: &ActionEnvelop<A>, _old: &Arc<S>, _new: &Arc<S>) {}

    /// Fired on the emitter by [`SubscriberExt`] dispatches, before the
    /// envelope is queued, so the store still holds the previous state.
    fn did_start_loading(&self, _silent: bool) {}

    fn did_finish_loading(&self, _state: &Arc<S>, _silent: bool) {}

    /// Silent flag used when this subscriber dispatches `action` itself and
    /// no explicit flag is given. Quiet unless overridden.
    fn is_action_silent(&self, _action: &A) -> bool {
        true
    }
}

/// Dispatch helpers that use the subscriber's own name as emitter.
pub trait SubscriberExt<S, A: Action>: Subscriber<S, A> {
    /// Dispatch `action` to every subscriber of `store`, emitted by `self`.
    ///
    /// The payload's silent flag comes from [`Subscriber::is_action_silent`].
    #[track_caller]
    fn dispatch_to_store(&self, action: A, store: &Store<S, A>) -> Result<(), StoreError>
    where
        S: PartialEq + Send + Sync + 'static,
    {
        self.dispatch_with(action, store, DestScope::All, None)
    }

    /// Like [`dispatch_to_store`](SubscriberExt::dispatch_to_store) with an
    /// explicit scope and payload. A silent flag in `payload` overrides
    /// `is_action_silent`.
    ///
    /// Calls `did_start_loading` with the resolved flag before queuing, and
    /// stamps the envelope with the caller's location.
    #[track_caller]
    fn dispatch_with(
        &self,
        action: A,
        store: &Store<S, A>,
        scope: DestScope,
        payload: Option<Payload>,
    ) -> Result<(), StoreError>
    where
        S: PartialEq + Send + Sync + 'static,
    {
        let origin = DebugInfo::caller();
        if store.is_closed() {
            return Err(StoreError::Closed);
        }
        let name = self.subscription_name();
        let identity = self as *const Self as *const ();
        if !store.owns_name_or_vacant(name, identity) {
            return Err(StoreError::DuplicateEmitter {
                name: name.to_string(),
            });
        }

        let mut payload = payload.unwrap_or_default();
        let silent = match payload.silent {
            Some(silent) => silent,
            None => self.is_action_silent(&action),
        };
        payload.silent = Some(silent);

        self.did_start_loading(silent);
        let envelop = ActionEnvelop::new(name, action)
            .with_scope(scope)
            .with_payload(payload)
            .with_debug_info(origin);
        store.dispatch(envelop)
    }
}

impl<S, A, T> SubscriberExt<S, A> for T
where
    A: Action,
    T: Subscriber<S, A> + ?Sized,
{
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_signals_receiver() {
        let (completion, mut rx) = Completion::new();
        assert!(rx.try_recv().is_err());
        completion.complete();
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn test_dropped_completion_closes_receiver() {
        let (completion, mut rx) = Completion::new();
        drop(completion);
        assert!(matches!(
            rx.try_recv(),
            Err(oneshot::error::TryRecvError::Closed)
        ));
    }

    #[test]
    fn test_complete_after_receiver_dropped_is_harmless() {
        let (completion, rx) = Completion::new();
        drop(rx);
        completion.complete();
    }
}
