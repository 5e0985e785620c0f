//! Subscriber registry: name -> weak subscriber + mailbox

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use tokio::runtime::Handle;
use tracing::{debug, warn};

use crate::config::DuplicateNamePolicy;
use crate::envelop::ActionEnvelop;
use crate::error::StoreError;
use crate::mailbox::{Mailbox, MailboxSender};
use crate::subscriber::Subscriber;
use crate::Action;

struct Registration<S, A: Action> {
    subscriber: Weak<dyn Subscriber<S, A>>,
    mailbox: Mailbox<S, A>,
}

impl<S, A: Action> Registration<S, A> {
    fn is_live(&self) -> bool {
        self.subscriber.strong_count() > 0
    }

    fn is(&self, identity: *const ()) -> bool {
        std::ptr::eq(self.subscriber.as_ptr() as *const (), identity)
    }
}

/// Outcome of a successful [`SubscriberRegistry::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Registered {
    New,
    AlreadyRegistered,
    Replaced,
}

/// Active subscribers keyed by `subscription_name`.
///
/// Holds only weak references. Registrations whose subscriber has been
/// dropped are treated as absent and pruned lazily.
pub(crate) struct SubscriberRegistry<S, A: Action> {
    entries: HashMap<String, Registration<S, A>>,
    policy: DuplicateNamePolicy,
    /// Mailbox tasks run here, whichever thread subscribes.
    runtime: Handle,
}

impl<S, A> SubscriberRegistry<S, A>
where
    S: Send + Sync + 'static,
    A: Action,
{
    pub(crate) fn new(policy: DuplicateNamePolicy, runtime: Handle) -> Self {
        Self {
            entries: HashMap::new(),
            policy,
            runtime,
        }
    }

    pub(crate) fn register<T>(&mut self, subscriber: &Arc<T>) -> Result<Registered, StoreError>
    where
        T: Subscriber<S, A>,
    {
        let name = subscriber.subscription_name().to_string();
        let identity = Arc::as_ptr(subscriber) as *const ();

        let mut outcome = Registered::New;
        if let Some(existing) = self.entries.get(&name) {
            if existing.is(identity) && existing.is_live() {
                return Ok(Registered::AlreadyRegistered);
            }
            if existing.is_live() {
                match self.policy {
                    DuplicateNamePolicy::Reject => {
                        warn!(subscriber = %name, "rejected duplicate subscription name");
                        return Err(StoreError::DuplicateSubscriptionName { name });
                    }
                    DuplicateNamePolicy::Replace => {
                        debug!(subscriber = %name, "replacing live subscriber");
                        outcome = Registered::Replaced;
                    }
                }
            }
            if let Some(old) = self.entries.remove(&name) {
                old.mailbox.close();
            }
        }

        let weak = Arc::downgrade(subscriber) as Weak<dyn Subscriber<S, A>>;
        let mailbox = Mailbox::spawn(&self.runtime, name.clone(), weak.clone());
        self.entries.insert(
            name,
            Registration {
                subscriber: weak,
                mailbox,
            },
        );
        Ok(outcome)
    }

    /// Remove the registration held by this exact subscriber instance.
    ///
    /// Returns `false` when the name is absent or held by someone else.
    pub(crate) fn unregister(&mut self, name: &str, identity: *const ()) -> bool {
        let held = self
            .entries
            .get(name)
            .map(|entry| entry.is(identity))
            .unwrap_or(false);
        if held {
            if let Some(entry) = self.entries.remove(name) {
                entry.mailbox.close();
            }
        }
        held
    }

    /// Whether `name` is free or held by the instance at `identity`.
    pub(crate) fn owns_name_or_vacant(&self, name: &str, identity: *const ()) -> bool {
        match self.entries.get(name) {
            Some(entry) if entry.is_live() => entry.is(identity),
            _ => true,
        }
    }

    pub(crate) fn is_registered(&self, name: &str) -> bool {
        self.entries.get(name).is_some_and(Registration::is_live)
    }

    /// Names of live subscribers, sorted.
    pub(crate) fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_live())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Mailboxes of the live subscribers the envelope is addressed to.
    ///
    /// Prunes dead registrations as a side effect.
    pub(crate) fn targets(&mut self, envelop: &ActionEnvelop<A>) -> Vec<MailboxSender<S, A>> {
        self.entries.retain(|name, entry| {
            let live = entry.is_live();
            if !live {
                debug!(subscriber = %name, "pruning dropped subscriber");
            }
            live
        });

        let mut targets: Vec<MailboxSender<S, A>> = self
            .entries
            .iter()
            .filter(|(name, _)| envelop.is_addressed_to(name))
            .map(|(_, entry)| entry.mailbox.sender())
            .collect();
        targets.sort_by(|a, b| a.name().cmp(b.name()));
        targets
    }

    pub(crate) fn clear(&mut self) {
        for (_, entry) in self.entries.drain() {
            entry.mailbox.close();
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.values().filter(|entry| entry.is_live()).count()
    }
}
