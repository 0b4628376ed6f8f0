use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    Acid, DatabaseError, EventEnvelope, EventStoreError, Result, Sequence, StateChanges,
    store::{EventStore, validate_events_for_append},
};

type StreamKey = (String, String);

/// In-memory event store implementation for testing.
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    streams: Arc<RwLock<HashMap<StreamKey, Vec<EventEnvelope>>>>,
}

impl InMemoryEventStore {
    /// Creates a new empty in-memory event store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of events stored.
    pub async fn event_count(&self) -> usize {
        self.streams.read().await.values().map(Vec::len).sum()
    }

    /// Clears all events.
    pub async fn clear(&self) {
        self.streams.write().await.clear();
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append(&self, events: Vec<EventEnvelope>, expected: Sequence) -> Result<Sequence> {
        validate_events_for_append(&events)?;

        let first = &events[0];
        let key = (first.aggregate_type.clone(), first.aggregate_id.clone());

        let mut streams = self.streams.write().await;
        let current = streams
            .get(&key)
            .and_then(|stream| stream.last())
            .map(|e| e.sequence)
            .unwrap_or(Sequence::initial());

        if current != expected {
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_type: first.aggregate_type.clone(),
                aggregate_id: first.aggregate_id.clone(),
                expected,
                actual: current,
            });
        }

        if first.sequence != current.next() {
            return Err(EventStoreError::InvalidAppend(format!(
                "First event must carry sequence {}, got {}",
                current.next(),
                first.sequence
            )));
        }

        let last = events.last().map(|e| e.sequence).unwrap_or(current);
        streams.entry(key).or_default().extend(events);

        Ok(last)
    }

    async fn load_events(
        &self,
        aggregate_type: &str,
        aggregate_id: &str,
    ) -> Result<Vec<EventEnvelope>> {
        let streams = self.streams.read().await;
        Ok(streams
            .get(&(aggregate_type.to_string(), aggregate_id.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn current_sequence(
        &self,
        aggregate_type: &str,
        aggregate_id: &str,
    ) -> Result<Sequence> {
        let streams = self.streams.read().await;
        Ok(streams
            .get(&(aggregate_type.to_string(), aggregate_id.to_string()))
            .and_then(|stream| stream.last())
            .map(|e| e.sequence)
            .unwrap_or(Sequence::initial()))
    }
}

#[derive(Debug)]
struct RepositoryState<T> {
    committed: Vec<T>,
    transactions: usize,
    attempts: Vec<Vec<T>>,
    fail_on_commit: bool,
}

impl<T> Default for RepositoryState<T> {
    fn default() -> Self {
        Self {
            committed: Vec::new(),
            transactions: 0,
            attempts: Vec::new(),
            fail_on_commit: false,
        }
    }
}

/// In-memory transactional repository for testing.
///
/// Committed operations are appended to a log. Every commit attempt records
/// the registry snapshot it was handed, so tests can inspect what a failed
/// transaction tried to write.
#[derive(Debug)]
pub struct InMemoryRepository<T> {
    state: Arc<RwLock<RepositoryState<T>>>,
}

impl<T> Clone for InMemoryRepository<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<T> Default for InMemoryRepository<T> {
    fn default() -> Self {
        Self {
            state: Arc::new(RwLock::new(RepositoryState::default())),
        }
    }
}

impl<T: Clone> InMemoryRepository<T> {
    /// Creates a new empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following commit fail until switched off again.
    pub async fn set_fail_on_commit(&self, fail: bool) {
        self.state.write().await.fail_on_commit = fail;
    }

    /// Returns every committed operation in commit order.
    pub async fn committed(&self) -> Vec<T> {
        self.state.read().await.committed.clone()
    }

    /// Returns the number of successful transactions.
    pub async fn transaction_count(&self) -> usize {
        self.state.read().await.transactions
    }

    /// Returns the registry snapshot seen by each commit attempt, failed ones included.
    pub async fn commit_attempts(&self) -> Vec<Vec<T>> {
        self.state.read().await.attempts.clone()
    }
}

#[async_trait]
impl<T> Acid<T> for InMemoryRepository<T>
where
    T: Clone + Send + Sync + 'static,
{
    async fn commit_as_transaction(
        &self,
        state_changes: &mut StateChanges<T>,
    ) -> std::result::Result<(), DatabaseError> {
        let mut state = self.state.write().await;
        let operations = state_changes.snapshot();
        state.attempts.push(operations.clone());

        if state.fail_on_commit {
            tracing::warn!(operations = operations.len(), "in-memory transaction aborted");
            return Err(DatabaseError::TransactionAborted {
                operations: operations.len(),
                reason: "commit failure injected".to_string(),
            });
        }

        tracing::debug!(operations = operations.len(), "in-memory transaction committed");
        state.committed.extend(operations);
        state.transactions += 1;
        state_changes.prune();

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_event(aggregate_id: &str, sequence: u64, event_type: &str) -> EventEnvelope {
        EventEnvelope::builder()
            .aggregate_type("TestAggregate")
            .aggregate_id(aggregate_id)
            .sequence(Sequence::new(sequence))
            .event_type(event_type)
            .payload_raw(serde_json::json!({"test": true}))
            .build()
    }

    #[tokio::test]
    async fn append_and_load_events() {
        let store = InMemoryEventStore::new();
        let events = vec![
            create_test_event("a", 1, "Event1"),
            create_test_event("a", 2, "Event2"),
        ];

        let last = store.append(events, Sequence::initial()).await.unwrap();
        assert_eq!(last, Sequence::new(2));

        let loaded = store.load_events("TestAggregate", "a").await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].event_type, "Event1");
        assert_eq!(loaded[1].event_type, "Event2");
        assert_eq!(store.event_count().await, 2);
    }

    #[tokio::test]
    async fn streams_are_isolated_per_aggregate() {
        let store = InMemoryEventStore::new();
        store
            .append(vec![create_test_event("a", 1, "E")], Sequence::initial())
            .await
            .unwrap();
        store
            .append(vec![create_test_event("b", 1, "E")], Sequence::initial())
            .await
            .unwrap();

        assert_eq!(
            store.current_sequence("TestAggregate", "a").await.unwrap(),
            Sequence::first()
        );
        assert_eq!(
            store.current_sequence("TestAggregate", "missing").await.unwrap(),
            Sequence::initial()
        );
        assert!(store.load_events("Other", "a").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn concurrency_conflict_on_stale_sequence() {
        let store = InMemoryEventStore::new();
        store
            .append(vec![create_test_event("a", 1, "E")], Sequence::initial())
            .await
            .unwrap();

        let result = store
            .append(vec![create_test_event("a", 2, "E")], Sequence::initial())
            .await;

        assert!(matches!(
            result,
            Err(EventStoreError::ConcurrencyConflict { .. })
        ));
        assert_eq!(store.event_count().await, 1);
    }

    #[tokio::test]
    async fn first_event_must_follow_current_sequence() {
        let store = InMemoryEventStore::new();
        let result = store
            .append(vec![create_test_event("a", 3, "E")], Sequence::initial())
            .await;

        assert!(matches!(result, Err(EventStoreError::InvalidAppend(_))));
    }

    #[tokio::test]
    async fn rejected_append_creates_no_stream() {
        let store = InMemoryEventStore::new();

        let conflict = store
            .append(vec![create_test_event("ghost", 5, "E")], Sequence::new(4))
            .await;
        let gap = store
            .append(vec![create_test_event("ghost", 2, "E")], Sequence::initial())
            .await;

        assert!(matches!(
            conflict,
            Err(EventStoreError::ConcurrencyConflict { .. })
        ));
        assert!(matches!(gap, Err(EventStoreError::InvalidAppend(_))));
        assert!(store.streams.read().await.is_empty());
    }

    #[tokio::test]
    async fn clear_removes_everything() {
        let store = InMemoryEventStore::new();
        store
            .append(vec![create_test_event("a", 1, "E")], Sequence::initial())
            .await
            .unwrap();
        store.clear().await;
        assert_eq!(store.event_count().await, 0);
    }

    #[tokio::test]
    async fn repository_commit_prunes_registry() {
        let repository = InMemoryRepository::new();
        let mut changes = StateChanges::new(2);
        changes.add("insert account");
        changes.add("update balance");

        repository
            .commit_as_transaction(&mut changes)
            .await
            .unwrap();

        assert!(changes.is_empty());
        assert_eq!(repository.transaction_count().await, 1);
        assert_eq!(
            repository.committed().await,
            vec!["insert account", "update balance"]
        );
    }

    #[tokio::test]
    async fn repository_failure_leaves_registry_untouched() {
        let repository = InMemoryRepository::new();
        repository.set_fail_on_commit(true).await;
        let mut changes = StateChanges::new(3);
        changes.add(42);

        let result = repository.commit_as_transaction(&mut changes).await;

        assert!(matches!(
            result,
            Err(DatabaseError::TransactionAborted { operations: 1, .. })
        ));
        assert_eq!(changes.snapshot(), vec![42]);
        assert!(repository.committed().await.is_empty());
        assert_eq!(repository.commit_attempts().await, vec![vec![42]]);
    }

    #[tokio::test]
    async fn repository_clones_share_state() {
        let repository = InMemoryRepository::new();
        let clone = repository.clone();
        let mut changes = StateChanges::new(1);
        changes.add('x');

        clone.commit_as_transaction(&mut changes).await.unwrap();

        assert_eq!(repository.committed().await, vec!['x']);
    }
}
