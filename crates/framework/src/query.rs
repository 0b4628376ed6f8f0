//! Read side: queries fed with committed events.

use async_trait::async_trait;
use ez_cqrs_store::EventEnvelope;

use crate::event::PublishError;

/// Receives the events committed by each aggregate command.
///
/// Queries run after the append succeeded; a failing query never undoes the
/// command. Typical implementations update a read model or forward events to
/// a broker.
#[async_trait]
pub trait Query: Send + Sync {
    /// Returns the query name, used in logs and metric labels.
    fn name(&self) -> &'static str;

    /// Handles the envelopes committed by one command, in sequence order.
    async fn dispatch(&self, aggregate_id: &str, events: &[EventEnvelope])
    -> Result<(), PublishError>;
}

/// A denormalized read model maintained from events.
pub trait View: Default + Send + Sync {
    /// Folds one event into the view.
    fn update(&mut self, event: &EventEnvelope);

    /// Folds a batch of events into the view.
    fn update_all<'a>(&mut self, events: impl IntoIterator<Item = &'a EventEnvelope>) {
        for event in events {
            self.update(event);
        }
    }
}
