//! Persistence boundary for the ez-cqrs framework.
//!
//! This crate holds the contracts the command orchestrator talks to:
//! - [`StateChanges`], the bounded registry of pending transactional operations
//! - [`Acid`], the repository that commits a registry as one transaction
//! - [`EventEnvelope`] and [`EventStore`] for event-sourced aggregates
//!
//! The in-memory implementations are test doubles, not storage engines.

pub mod acid;
pub mod error;
pub mod event;
pub mod memory;
pub mod state_changes;
pub mod store;

pub use acid::Acid;
pub use error::{BoxError, DatabaseError, EventStoreError, Result};
pub use event::{EventEnvelope, EventEnvelopeBuilder, EventId, Sequence};
pub use memory::{InMemoryEventStore, InMemoryRepository};
pub use state_changes::{CapacityExceeded, StateChanges};
pub use store::EventStore;
