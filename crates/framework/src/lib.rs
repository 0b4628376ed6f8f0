//! Scaffolding for CQRS/event-sourcing applications.
//!
//! This crate provides:
//! - [`Command`] and [`CommandHandler`] for self-validating, self-executing commands
//! - [`EzCqrs`], the orchestrator that runs validate → execute → commit → publish
//! - [`DomainEvent`] with its post-commit publish side effect
//! - [`Aggregate`], [`Query`] and [`CqrsFramework`] for event-sourced aggregates

pub mod aggregate;
pub mod command;
pub mod config;
pub mod cqrs;
pub mod error;
pub mod event;
pub mod framework;
pub mod publish;
pub mod query;

pub use aggregate::Aggregate;
pub use command::{Command, CommandHandler};
pub use config::FrameworkConfig;
pub use cqrs::{AggregateContext, AggregateError, CqrsFramework};
pub use error::{
    ErrorKind, ExecutionError, FieldViolation, UnexpectedError, ValidationError,
    ValidationErrorBuilder,
};
pub use event::{DomainEvent, PublishError};
pub use framework::EzCqrs;
pub use publish::{EventPublisher, PublishFailure};
pub use query::{Query, View};

pub use ez_cqrs_store::{
    Acid, CapacityExceeded, DatabaseError, EventEnvelope, EventStore, EventStoreError,
    InMemoryEventStore, InMemoryRepository, Sequence, StateChanges,
};
