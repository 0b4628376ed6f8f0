//! Event-sourced command processing for aggregates.

use std::collections::HashMap;

use ez_cqrs_store::{EventEnvelope, EventStore, EventStoreError, Sequence};
use thiserror::Error;

use crate::aggregate::Aggregate;
use crate::event::DomainEvent;
use crate::query::Query;

/// An aggregate rebuilt from its events.
#[derive(Debug)]
pub struct AggregateContext<A: Aggregate> {
    pub aggregate_id: String,
    pub aggregate: A,

    /// Sequence of the last applied event, `Sequence::initial()` if none.
    pub sequence: Sequence,
}

/// Failure of an aggregate command.
#[derive(Debug, Error)]
pub enum AggregateError<E> {
    /// The aggregate rejected the command.
    #[error("{0}")]
    Domain(E),

    #[error(transparent)]
    Store(#[from] EventStoreError),

    /// A stored payload no longer matches the event type.
    #[error("Failed to decode event payload: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl<E> AggregateError<E> {
    /// Returns true if another writer appended to the aggregate first.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            AggregateError::Store(EventStoreError::ConcurrencyConflict { .. })
        )
    }
}

/// Loads aggregates from an event store, runs their commands and feeds the
/// committed events to the registered queries.
///
/// Processing a command:
/// 1. Load and replay the aggregate's events
/// 2. Let the aggregate handle the command
/// 3. Append the new events, expecting the loaded sequence
/// 4. Dispatch the committed envelopes to every query
pub struct CqrsFramework<A: Aggregate, S: EventStore> {
    store: S,
    queries: Vec<Box<dyn Query>>,
    services: A::Services,
}

impl<A: Aggregate, S: EventStore> CqrsFramework<A, S> {
    pub fn new(store: S, services: A::Services) -> Self {
        Self {
            store,
            queries: Vec::new(),
            services,
        }
    }

    /// Registers a query receiving every committed batch.
    pub fn append_query(&mut self, query: Box<dyn Query>) {
        self.queries.push(query);
    }

    pub fn query_count(&self) -> usize {
        self.queries.len()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Rebuilds an aggregate by replaying its events.
    ///
    /// An aggregate without events comes back as `A::default()`.
    pub async fn load(
        &self,
        aggregate_id: &str,
    ) -> Result<AggregateContext<A>, AggregateError<A::Error>> {
        let envelopes = self
            .store
            .load_events(A::aggregate_type(), aggregate_id)
            .await?;

        let mut aggregate = A::default();
        let mut sequence = Sequence::initial();
        for envelope in envelopes {
            let event: A::Event = envelope.decode()?;
            aggregate.apply(event);
            sequence = envelope.sequence;
        }

        Ok(AggregateContext {
            aggregate_id: aggregate_id.to_string(),
            aggregate,
            sequence,
        })
    }

    /// Executes a command against an aggregate and persists the outcome.
    ///
    /// `metadata` is copied onto every produced envelope. Returns the
    /// committed envelopes; a command producing no events returns an empty
    /// list without touching the store.
    #[tracing::instrument(
        skip(self, command, metadata),
        fields(aggregate_type = A::aggregate_type())
    )]
    pub async fn execute(
        &self,
        aggregate_id: &str,
        command: A::Command,
        metadata: HashMap<String, String>,
    ) -> Result<Vec<EventEnvelope>, AggregateError<A::Error>> {
        metrics::counter!("ez_cqrs_aggregate_commands_total", "aggregate_type" => A::aggregate_type())
            .increment(1);

        let context = self.load(aggregate_id).await?;

        let events = context
            .aggregate
            .handle(command, &self.services)
            .await
            .map_err(|err| {
                tracing::warn!(error = %err, "aggregate rejected command");
                AggregateError::Domain(err)
            })?;

        if events.is_empty() {
            return Ok(Vec::new());
        }

        let envelopes = build_envelopes::<A>(aggregate_id, context.sequence, &events, &metadata)?;
        let new_sequence = self
            .store
            .append(envelopes.clone(), context.sequence)
            .await?;

        tracing::debug!(
            events = envelopes.len(),
            sequence = %new_sequence,
            "events committed"
        );

        self.dispatch(aggregate_id, &envelopes).await;
        Ok(envelopes)
    }

    async fn dispatch(&self, aggregate_id: &str, envelopes: &[EventEnvelope]) {
        for query in &self.queries {
            if let Err(error) = query.dispatch(aggregate_id, envelopes).await {
                metrics::counter!("ez_cqrs_query_failures_total", "query" => query.name())
                    .increment(1);
                tracing::error!(query = query.name(), %error, "query dispatch failed");
            }
        }
    }
}

fn build_envelopes<A: Aggregate>(
    aggregate_id: &str,
    current: Sequence,
    events: &[A::Event],
    metadata: &HashMap<String, String>,
) -> Result<Vec<EventEnvelope>, serde_json::Error> {
    let mut envelopes = Vec::with_capacity(events.len());
    let mut sequence = current;

    for event in events {
        sequence = sequence.next();
        let envelope = EventEnvelope::builder()
            .aggregate_type(A::aggregate_type())
            .aggregate_id(aggregate_id)
            .sequence(sequence)
            .event_type(event.event_type())
            .event_version(event.event_version())
            .metadata_map(metadata)
            .payload(event)?
            .build();
        envelopes.push(envelope);
    }

    Ok(envelopes)
}
