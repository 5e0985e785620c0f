//! Per-subscriber delivery queue
//!
//! Each registration owns one mailbox task. The task delivers messages to its
//! subscriber strictly in the order they were posted, and waits for the
//! subscriber's [`Completion`] before moving past an update. A slow
//! subscriber therefore only delays its own mailbox, never the dispatch lane
//! or other subscribers.

use std::sync::{Arc, Weak};

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::envelop::ActionEnvelop;
use crate::subscriber::{Completion, Subscriber};
use crate::Action;

pub(crate) enum Delivery<S, A: Action> {
    Update {
        source: Arc<ActionEnvelop<A>>,
        old: Arc<S>,
        new: Arc<S>,
        silent: bool,
    },
}

/// Sending side of a mailbox, cloned into the lane for each dispatch.
pub(crate) struct MailboxSender<S, A: Action> {
    name: String,
    tx: mpsc::UnboundedSender<Delivery<S, A>>,
}

impl<S, A: Action> MailboxSender<S, A> {
    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn post(&self, delivery: Delivery<S, A>) {
        if self.tx.send(delivery).is_err() {
            trace!(subscriber = %self.name, "mailbox closed, delivery dropped");
        }
    }
}

/// Owning handle; closing or dropping it stops the task and drops anything
/// still queued.
pub(crate) struct Mailbox<S, A: Action> {
    sender: MailboxSender<S, A>,
    cancel: CancellationToken,
}

impl<S, A> Mailbox<S, A>
where
    S: Send + Sync + 'static,
    A: Action,
{
    pub(crate) fn spawn(
        runtime: &Handle,
        name: String,
        subscriber: Weak<dyn Subscriber<S, A>>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        runtime.spawn(run_mailbox(name.clone(), subscriber, rx, cancel.clone()));
        Self {
            sender: MailboxSender { name, tx },
            cancel,
        }
    }

    pub(crate) fn sender(&self) -> MailboxSender<S, A> {
        MailboxSender {
            name: self.sender.name.clone(),
            tx: self.sender.tx.clone(),
        }
    }

    pub(crate) fn close(&self) {
        self.cancel.cancel();
    }
}

impl<S, A: Action> Drop for Mailbox<S, A> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_mailbox<S, A>(
    name: String,
    subscriber: Weak<dyn Subscriber<S, A>>,
    mut rx: mpsc::UnboundedReceiver<Delivery<S, A>>,
    cancel: CancellationToken,
) where
    S: Send + Sync + 'static,
    A: Action,
{
    loop {
        let delivery = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            delivery = rx.recv() => match delivery {
                Some(delivery) => delivery,
                None => break,
            },
        };

        let Some(target) = subscriber.upgrade() else {
            trace!(subscriber = %name, "subscriber dropped, stopping mailbox");
            break;
        };

        match delivery {
            Delivery::Update {
                source,
                old,
                new,
                silent,
            } => {
                let (completion, done) = Completion::new();
                target.state_did_update(&source, &old, &new, completion);
                // do not keep the subscriber alive while it works
                drop(target);

                let completed = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    result = done => result.is_ok(),
                };
                if !completed {
                    debug!(
                        subscriber = %name,
                        action = %source.action().name(),
                        "completion dropped without being called"
                    );
                    continue;
                }

                let Some(target) = subscriber.upgrade() else {
                    break;
                };
                target.did_finish_state_update(&source, &old, &new);
                target.did_finish_loading(&new, silent);
            }
        }
    }
    trace!(subscriber = %name, "mailbox stopped");
}
