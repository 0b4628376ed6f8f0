use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a stored event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new random event ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for EventId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Position of an event within its aggregate instance.
///
/// Sequence 0 means "no events yet"; the first event carries sequence 1.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Sequence(u64);

impl Sequence {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Sequence of an aggregate without events.
    pub fn initial() -> Self {
        Self(0)
    }

    /// Sequence of the first event.
    pub fn first() -> Self {
        Self(1)
    }

    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Sequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Sequence {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// A committed event together with the context it was persisted with.
///
/// Within a system an event is unique by the compound key
/// `(aggregate_type, aggregate_id, sequence)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event_id: EventId,

    /// The type of aggregate (e.g., "BankAccount").
    pub aggregate_type: String,

    /// The aggregate instance this event belongs to.
    pub aggregate_id: String,

    pub sequence: Sequence,

    /// The name of the event (e.g., "MoneyDeposited").
    pub event_type: String,

    /// Version of `event_type`, used for upcasting.
    pub event_version: String,

    pub timestamp: DateTime<Utc>,

    /// The event payload as JSON.
    pub payload: serde_json::Value,

    pub metadata: HashMap<String, String>,
}

impl EventEnvelope {
    /// Creates a new event envelope builder.
    pub fn builder() -> EventEnvelopeBuilder {
        EventEnvelopeBuilder::default()
    }

    /// Deserializes the payload into a typed event.
    pub fn decode<E: DeserializeOwned>(&self) -> Result<E, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}

/// Builder for constructing event envelopes.
#[derive(Debug, Default)]
pub struct EventEnvelopeBuilder {
    event_id: Option<EventId>,
    aggregate_type: Option<String>,
    aggregate_id: Option<String>,
    sequence: Option<Sequence>,
    event_type: Option<String>,
    event_version: Option<String>,
    payload: Option<serde_json::Value>,
    metadata: HashMap<String, String>,
}

impl EventEnvelopeBuilder {
    /// Sets the event ID. If not set, a new ID will be generated.
    pub fn event_id(mut self, id: EventId) -> Self {
        self.event_id = Some(id);
        self
    }

    pub fn aggregate_type(mut self, aggregate_type: impl Into<String>) -> Self {
        self.aggregate_type = Some(aggregate_type.into());
        self
    }

    pub fn aggregate_id(mut self, aggregate_id: impl Into<String>) -> Self {
        self.aggregate_id = Some(aggregate_id.into());
        self
    }

    pub fn sequence(mut self, sequence: Sequence) -> Self {
        self.sequence = Some(sequence);
        self
    }

    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    /// Sets the event version. Defaults to `"1"`.
    pub fn event_version(mut self, event_version: impl Into<String>) -> Self {
        self.event_version = Some(event_version.into());
        self
    }

    /// Sets the payload from a serializable value.
    pub fn payload<T: Serialize>(mut self, payload: &T) -> Result<Self, serde_json::Error> {
        self.payload = Some(serde_json::to_value(payload)?);
        Ok(self)
    }

    /// Sets the payload from a raw JSON value.
    pub fn payload_raw(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Adds a metadata entry.
    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Merges a whole metadata map, overriding existing keys.
    pub fn metadata_map(mut self, metadata: &HashMap<String, String>) -> Self {
        self.metadata
            .extend(metadata.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    /// Builds the event envelope.
    ///
    /// # Panics
    ///
    /// Panics if aggregate_type, aggregate_id, sequence, event_type or payload
    /// is not set.
    pub fn build(self) -> EventEnvelope {
        EventEnvelope {
            event_id: self.event_id.unwrap_or_default(),
            aggregate_type: self.aggregate_type.expect("aggregate_type is required"),
            aggregate_id: self.aggregate_id.expect("aggregate_id is required"),
            sequence: self.sequence.expect("sequence is required"),
            event_type: self.event_type.expect("event_type is required"),
            event_version: self.event_version.unwrap_or_else(|| "1".to_string()),
            timestamp: Utc::now(),
            payload: self.payload.expect("payload is required"),
            metadata: self.metadata,
        }
    }

    /// Tries to build the event envelope, returning None if required fields are missing.
    pub fn try_build(self) -> Option<EventEnvelope> {
        Some(EventEnvelope {
            event_id: self.event_id.unwrap_or_default(),
            aggregate_type: self.aggregate_type?,
            aggregate_id: self.aggregate_id?,
            sequence: self.sequence?,
            event_type: self.event_type?,
            event_version: self.event_version.unwrap_or_else(|| "1".to_string()),
            timestamp: Utc::now(),
            payload: self.payload?,
            metadata: self.metadata,
        })
    }
}
