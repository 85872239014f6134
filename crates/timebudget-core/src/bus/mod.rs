//! In-process publish/subscribe bus.
//!
//! Dispatch is synchronous: [`EventBus::publish`] runs every handler
//! registered for the envelope's topic on the calling thread, in
//! registration order, before returning. Handler errors and panics are
//! collected per subscription and reported as one aggregated error; they never
//! stop the remaining handlers. The envelope's context is checked before each
//! handler, and a cancelled or expired context skips the rest.
//!
//! The registry lock is held only long enough to copy a topic's handler list,
//! so handlers may subscribe, unsubscribe or publish themselves.

mod envelope;
mod error;

pub use envelope::{DispatchContext, Envelope, Topic};
pub use error::{BoxError, ContextError, HandlerFailure, HandlerFailureCause, PublishError};

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use tracing::{debug, warn};

/// Result returned by handlers.
pub type HandlerResult = Result<(), BoxError>;

type Handler = Arc<dyn Fn(&Envelope) -> HandlerResult + Send + Sync>;
type Registry = HashMap<Topic, Vec<Registration>>;

/// Identity of a registration, used for removal and error attribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone)]
struct Registration {
    id: SubscriptionId,
    handler: Handler,
    active: Arc<AtomicBool>,
}

/// Topic-keyed synchronous dispatcher.
pub struct EventBus {
    registry: Arc<RwLock<Registry>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(RwLock::new(HashMap::new())),
            next_id: AtomicU64::new(1),
        }
    }

    // The registry is never left half-updated, so a poisoned lock is safe to reuse.
    fn read(&self) -> RwLockReadGuard<'_, Registry> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Registry> {
        self.registry.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `handler` for `topic`.
    ///
    /// Handlers sharing a topic are dispatched in registration order. The
    /// returned [`Subscription`] removes exactly this registration.
    pub fn subscribe<F>(&self, topic: impl Into<Topic>, handler: F) -> Subscription
    where
        F: Fn(&Envelope) -> HandlerResult + Send + Sync + 'static,
    {
        let topic = topic.into();
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let active = Arc::new(AtomicBool::new(true));

        self.write()
            .entry(topic.clone())
            .or_default()
            .push(Registration {
                id,
                handler: Arc::new(handler),
                active: Arc::clone(&active),
            });
        debug!(topic = %topic, subscription = %id, "subscribed");

        Subscription {
            id,
            topic,
            active,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Register a handler that only sees payloads of type `T`.
    ///
    /// Envelopes without a payload, or with a payload of another type, are
    /// skipped without invoking `handler` and without reporting an error.
    pub fn subscribe_typed<T, F>(&self, topic: impl Into<Topic>, handler: F) -> Subscription
    where
        T: Any + Send + Sync,
        F: Fn(&DispatchContext, &T) -> HandlerResult + Send + Sync + 'static,
    {
        self.subscribe(topic, move |envelope: &Envelope| {
            match envelope.payload::<T>() {
                Some(payload) => handler(envelope.context(), payload),
                None => {
                    debug!(
                        topic = %envelope.topic(),
                        expected = std::any::type_name::<T>(),
                        has_payload = envelope.has_payload(),
                        "payload type mismatch, skipping typed handler"
                    );
                    Ok(())
                }
            }
        })
    }

    /// Dispatch `envelope` to every handler currently registered for its topic.
    ///
    /// # Errors
    /// Returns [`PublishError::Cancelled`] when the context is cancelled or
    /// past its deadline before a handler runs, and
    /// [`PublishError::HandlerFailures`] when any handler failed or panicked.
    pub fn publish(&self, envelope: &Envelope) -> Result<(), PublishError> {
        let topic = envelope.topic();
        let handlers: Vec<Registration> = self
            .read()
            .get(topic.as_str())
            .cloned()
            .unwrap_or_default();

        if handlers.is_empty() {
            debug!(topic = %topic, "no subscribers");
            return Ok(());
        }

        let total = handlers.len();
        let mut failures = Vec::new();
        for (index, registration) in handlers.into_iter().enumerate() {
            if let Err(reason) = envelope.context().check() {
                let skipped = total - index;
                warn!(
                    topic = %topic,
                    %reason,
                    skipped,
                    failed = failures.len(),
                    "dispatch aborted"
                );
                return Err(PublishError::Cancelled {
                    topic: topic.clone(),
                    reason,
                    skipped,
                    failures,
                });
            }

            // Unsubscribed after the list was copied.
            if !registration.active.load(Ordering::Acquire) {
                continue;
            }

            let outcome = catch_unwind(AssertUnwindSafe(|| (registration.handler)(envelope)));
            let cause = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(err)) => HandlerFailureCause::Returned(err),
                Err(panic) => HandlerFailureCause::Panicked(panic_message(panic.as_ref())),
            };
            warn!(
                topic = %topic,
                subscription = %registration.id,
                error = %cause,
                "handler failed"
            );
            failures.push(HandlerFailure {
                subscription_id: registration.id,
                topic: topic.clone(),
                cause,
            });
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(PublishError::HandlerFailures {
                topic: topic.clone(),
                failures,
            })
        }
    }

    /// Build an envelope from `payload` and `context` and publish it.
    pub fn publish_payload<T: Any + Send + Sync>(
        &self,
        topic: impl Into<Topic>,
        payload: T,
        context: DispatchContext,
    ) -> Result<(), PublishError> {
        let envelope = Envelope::new(topic)
            .with_payload(payload)
            .with_context(context);
        self.publish(&envelope)
    }

    /// Number of live registrations for `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.read().get(topic).map_or(0, Vec::len)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.read();
        let mut topics: Vec<(&str, usize)> =
            registry.iter().map(|(t, v)| (t.as_str(), v.len())).collect();
        topics.sort_unstable();
        f.debug_struct("EventBus").field("topics", &topics).finish()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Handle to one registration.
///
/// Dropping the handle keeps the registration; call
/// [`unsubscribe`](Self::unsubscribe) to remove it. Safe to call from inside a
/// handler, including one running in the same dispatch.
#[derive(Debug, Clone)]
pub struct Subscription {
    id: SubscriptionId,
    topic: Topic,
    active: Arc<AtomicBool>,
    registry: Weak<RwLock<Registry>>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Remove the registration. Returns `false` if it was already removed or
    /// the bus is gone.
    pub fn unsubscribe(&self) -> bool {
        if !self.active.swap(false, Ordering::AcqRel) {
            return false;
        }
        let Some(registry) = self.registry.upgrade() else {
            return false;
        };
        let mut registry = registry.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(list) = registry.get_mut(self.topic.as_str()) {
            list.retain(|r| r.id != self.id);
            if list.is_empty() {
                registry.remove(self.topic.as_str());
            }
        }
        debug!(topic = %self.topic, subscription = %self.id, "unsubscribed");
        true
    }
}
