//! Event-sourced aggregate contract.

use async_trait::async_trait;

use crate::event::DomainEvent;

/// Trait for aggregates in an event-sourced system.
///
/// An aggregate is a cluster of domain objects treated as a single unit of
/// consistency. In event sourcing, aggregates:
/// - Are rebuilt by replaying their events
/// - Turn commands into new events
/// - Apply events to update state (pure, deterministic)
#[async_trait]
pub trait Aggregate: Default + Send + Sync + Sized {
    /// Commands this aggregate accepts.
    type Command: Send + Sync;

    /// Events this aggregate produces and consumes.
    type Event: DomainEvent;

    /// Business-rule violations raised by `handle`.
    type Error: std::error::Error + Send + Sync + 'static;

    /// External collaborators `handle` may call, e.g. a pricing lookup.
    type Services: Send + Sync;

    /// Returns the aggregate type name used to partition the event store.
    fn aggregate_type() -> &'static str;

    /// Decides which events a command produces given the current state.
    ///
    /// Must not mutate the aggregate; state only changes through `apply`.
    async fn handle(
        &self,
        command: Self::Command,
        services: &Self::Services,
    ) -> Result<Vec<Self::Event>, Self::Error>;

    /// Applies an event to the aggregate.
    ///
    /// Must not fail: events are facts that already happened.
    fn apply(&mut self, event: Self::Event);

    /// Applies multiple events in sequence.
    fn apply_events(&mut self, events: impl IntoIterator<Item = Self::Event>) {
        for event in events {
            self.apply(event);
        }
    }
}
