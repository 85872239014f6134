//! Envelopes and the dispatch context they carry.

use std::any::Any;
use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use super::error::ContextError;
use crate::user::UserContext;

/// Opaque topic key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Topic(Arc<str>);

impl Topic {
    pub fn new(name: &str) -> Self {
        Self(Arc::from(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Topic {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Topic {
    fn from(name: String) -> Self {
        Self(Arc::from(name))
    }
}

impl Borrow<str> for Topic {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Cancellation, deadline and acting user inherited from the operation that
/// published an envelope.
///
/// Clones share the same cancellation token; [`child`](Self::child) derives a
/// token that is cancelled with its parent but can also be cancelled alone.
#[derive(Debug, Clone, Default)]
pub struct DispatchContext {
    token: CancellationToken,
    deadline: Option<Instant>,
    actor: Option<UserContext>,
}

impl DispatchContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh context acting for `actor`, bounded by `timeout` if given.
    pub fn for_actor(actor: UserContext, timeout: Option<Duration>) -> Self {
        let ctx = Self::new().with_actor(actor);
        match timeout {
            Some(timeout) => ctx.with_timeout(timeout),
            None => ctx,
        }
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_actor(mut self, actor: UserContext) -> Self {
        self.actor = Some(actor);
        self
    }

    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
            actor: self.actor.clone(),
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn actor(&self) -> Option<&UserContext> {
        self.actor.as_ref()
    }

    /// `Ok` while the context may still be used.
    pub fn check(&self) -> Result<(), ContextError> {
        if self.token.is_cancelled() {
            return Err(ContextError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(ContextError::DeadlineExceeded),
            _ => Ok(()),
        }
    }
}

/// A message on the bus: topic, optional payload of any type, creation time
/// and dispatch context.
#[derive(Clone)]
pub struct Envelope {
    topic: Topic,
    payload: Option<Arc<dyn Any + Send + Sync>>,
    created_at: DateTime<Utc>,
    context: DispatchContext,
}

impl Envelope {
    pub fn new(topic: impl Into<Topic>) -> Self {
        Self {
            topic: topic.into(),
            payload: None,
            created_at: Utc::now(),
            context: DispatchContext::default(),
        }
    }

    pub fn with_payload<T: Any + Send + Sync>(mut self, payload: T) -> Self {
        self.payload = Some(Arc::new(payload));
        self
    }

    pub fn with_context(mut self, context: DispatchContext) -> Self {
        self.context = context;
        self
    }

    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn context(&self) -> &DispatchContext {
        &self.context
    }

    pub fn has_payload(&self) -> bool {
        self.payload.is_some()
    }

    /// The payload as `T`, or `None` when absent or of another type.
    pub fn payload<T: Any>(&self) -> Option<&T> {
        self.payload.as_deref()?.downcast_ref::<T>()
    }
}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Envelope")
            .field("topic", &self.topic)
            .field("has_payload", &self.payload.is_some())
            .field("created_at", &self.created_at)
            .field("context", &self.context)
            .finish()
    }
}
