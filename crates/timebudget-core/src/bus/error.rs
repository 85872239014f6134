//! Bus-specific errors.

use thiserror::Error;

use super::{SubscriptionId, Topic};

/// Boxed error returned by bus handlers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Why a dispatch context stopped accepting work.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextError {
    #[error("context cancelled")]
    Cancelled,

    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

/// What went wrong inside a single handler.
#[derive(Error, Debug)]
pub enum HandlerFailureCause {
    #[error("{0}")]
    Returned(BoxError),

    #[error("panicked: {0}")]
    Panicked(String),
}

/// A failure of one subscription during one dispatch.
#[derive(Error, Debug)]
#[error("subscription {subscription_id} on '{topic}' failed: {cause}")]
pub struct HandlerFailure {
    pub subscription_id: SubscriptionId,
    pub topic: Topic,
    #[source]
    pub cause: HandlerFailureCause,
}

impl HandlerFailure {
    pub fn is_panic(&self) -> bool {
        matches!(self.cause, HandlerFailureCause::Panicked(_))
    }
}

/// Errors returned by [`EventBus::publish`](super::EventBus::publish).
#[derive(Error, Debug)]
pub enum PublishError {
    /// The envelope's context was cancelled or expired before a handler ran.
    #[error("dispatch on '{topic}' aborted: {reason} ({skipped} handler(s) skipped)")]
    Cancelled {
        topic: Topic,
        #[source]
        reason: ContextError,
        skipped: usize,
        /// Failures of handlers that ran before the abort.
        failures: Vec<HandlerFailure>,
    },

    /// One or more handlers returned an error or panicked.
    #[error("{} handler(s) failed on '{topic}'", .failures.len())]
    HandlerFailures {
        topic: Topic,
        failures: Vec<HandlerFailure>,
    },
}

impl PublishError {
    pub fn topic(&self) -> &Topic {
        match self {
            PublishError::Cancelled { topic, .. } | PublishError::HandlerFailures { topic, .. } => {
                topic
            }
        }
    }

    pub fn failures(&self) -> &[HandlerFailure] {
        match self {
            PublishError::Cancelled { failures, .. }
            | PublishError::HandlerFailures { failures, .. } => failures,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, PublishError::Cancelled { .. })
    }
}
