//! Domain event contract.

use async_trait::async_trait;
use ez_cqrs_store::BoxError;
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

/// Trait for domain events.
///
/// A domain event represents a business change in the state of the system.
/// Events are immutable and should be named in past tense, e.g.
/// `AccountOpened`, `EmailAddressChanged`.
///
/// Each event carries a `publish` side effect (updating views, pushing to a
/// message broker) that the orchestrator invokes only after the command's
/// state changes were committed.
#[async_trait]
pub trait DomainEvent: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Returns the event type name.
    fn event_type(&self) -> &'static str;

    /// Returns the version of `event_type`, used for upcasting.
    fn event_version(&self) -> &'static str {
        "1"
    }

    /// Publishes the event to downstream systems.
    ///
    /// Failures never affect the result of the command that produced the
    /// event; they are reported out of band.
    async fn publish(&self) -> Result<(), PublishError> {
        Ok(())
    }
}

/// Failure of a publish side effect.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The downstream system refused the event.
    #[error("Event rejected: {0}")]
    Rejected(String),

    /// The event could not be delivered.
    #[error("Delivery failed: {0}")]
    Delivery(#[source] BoxError),

    /// The publish task panicked.
    #[error("Publish panicked: {0}")]
    Panicked(String),
}

impl PublishError {
    pub fn delivery(err: impl Into<BoxError>) -> Self {
        Self::Delivery(err.into())
    }
}
