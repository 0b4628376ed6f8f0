use async_trait::async_trait;

use crate::{EventEnvelope, EventStoreError, Result, Sequence};

/// The central source for loading past events and committing new ones.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Appends events for a single aggregate instance.
    ///
    /// Events are appended atomically - either all succeed or none do. The
    /// call fails with `ConcurrencyConflict` if the instance is not currently
    /// at `expected`.
    ///
    /// Returns the sequence of the last appended event.
    async fn append(&self, events: Vec<EventEnvelope>, expected: Sequence) -> Result<Sequence>;

    /// Loads all events of an aggregate instance in sequence order.
    async fn load_events(
        &self,
        aggregate_type: &str,
        aggregate_id: &str,
    ) -> Result<Vec<EventEnvelope>>;

    /// Returns the sequence of the latest event of an aggregate instance.
    async fn current_sequence(&self, aggregate_type: &str, aggregate_id: &str)
    -> Result<Sequence>;
}

/// Checks that a batch targets one aggregate instance with consecutive sequences.
pub fn validate_events_for_append(events: &[EventEnvelope]) -> Result<()> {
    let Some(first) = events.first() else {
        return Err(EventStoreError::InvalidAppend(
            "Cannot append empty event list".to_string(),
        ));
    };

    let mut expected_sequence = first.sequence;
    for event in events.iter().skip(1) {
        if event.aggregate_id != first.aggregate_id
            || event.aggregate_type != first.aggregate_type
        {
            return Err(EventStoreError::InvalidAppend(
                "All events must be for the same aggregate".to_string(),
            ));
        }
        expected_sequence = expected_sequence.next();
        if event.sequence != expected_sequence {
            return Err(EventStoreError::InvalidAppend(format!(
                "Event sequences must be consecutive. Expected {}, got {}",
                expected_sequence, event.sequence
            )));
        }
    }

    Ok(())
}
