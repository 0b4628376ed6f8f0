//! Command contract and its handler.

use std::marker::PhantomData;

use async_trait::async_trait;
use ez_cqrs_store::StateChanges;
use serde::{Serialize, de::DeserializeOwned};

use crate::error::{ExecutionError, ValidationError};
use crate::event::DomainEvent;

/// A request to change the system.
///
/// Commands are packaged data: each one carries just what is needed to
/// perform one user intent, much like the body of an HTTP endpoint. They
/// validate themselves, then execute.
#[async_trait]
pub trait Command: Serialize + DeserializeOwned + Send + Sync {
    /// Events produced by a successful execution.
    type Event: DomainEvent;

    /// Value returned to the caller on success.
    type Response: Send;

    /// The application's business-rule violations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Operation recorded for the transactional commit.
    type Op: Send + Sync + 'static;

    /// Checks structural and business preconditions. Must be pure.
    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }

    /// Executes the command.
    ///
    /// Produced events are appended to `events`, database updates to
    /// `state_changes`; both are append-only. The orchestrator calls this at
    /// most once per run and never retries.
    ///
    /// _All business logic belongs in this method_.
    async fn execute(
        &self,
        events: &mut Vec<Self::Event>,
        state_changes: &mut StateChanges<Self::Op>,
    ) -> Result<Self::Response, ExecutionError<Self::Error>>;
}

/// Stateless adapter running the two steps of a command.
pub struct CommandHandler<C> {
    _phantom: PhantomData<fn() -> C>,
}

impl<C: Command> CommandHandler<C> {
    pub fn new() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }

    /// Validates command data.
    pub fn validate(&self, command: &C) -> Result<(), ValidationError> {
        command.validate()
    }

    /// Executes the command against the given registries.
    pub async fn handle(
        &self,
        command: &C,
        events: &mut Vec<C::Event>,
        state_changes: &mut StateChanges<C::Op>,
    ) -> Result<C::Response, ExecutionError<C::Error>> {
        command.execute(events, state_changes).await
    }
}

impl<C: Command> Default for CommandHandler<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> Clone for CommandHandler<C> {
    fn clone(&self) -> Self {
        Self {
            _phantom: PhantomData,
        }
    }
}

impl<C> std::fmt::Debug for CommandHandler<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandHandler")
            .field("command", &std::any::type_name::<C>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Renamed {
        name: String,
    }

    impl DomainEvent for Renamed {
        fn event_type(&self) -> &'static str {
            "Renamed"
        }
    }

    #[derive(Debug, thiserror::Error)]
    #[error("name already taken")]
    struct NameTaken;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Rename {
        name: String,
    }

    #[async_trait]
    impl Command for Rename {
        type Event = Renamed;
        type Response = usize;
        type Error = NameTaken;
        type Op = String;

        fn validate(&self) -> Result<(), ValidationError> {
            ValidationError::builder()
                .ensure(!self.name.is_empty(), "name", "must not be empty")
                .finish()
        }

        async fn execute(
            &self,
            events: &mut Vec<Renamed>,
            state_changes: &mut StateChanges<String>,
        ) -> Result<usize, ExecutionError<NameTaken>> {
            if self.name == "taken" {
                return Err(ExecutionError::domain(NameTaken));
            }
            state_changes.add(format!("UPDATE name = {}", self.name));
            events.push(Renamed {
                name: self.name.clone(),
            });
            Ok(self.name.len())
        }
    }

    #[test]
    fn handler_delegates_validation() {
        let handler = CommandHandler::<Rename>::new();

        assert!(handler.validate(&Rename { name: "a".into() }).is_ok());
        let err = handler
            .validate(&Rename {
                name: String::new(),
            })
            .unwrap_err();
        assert_eq!(err.violations()[0].field, "name");
    }

    #[tokio::test]
    async fn handler_delegates_execution() {
        let handler = CommandHandler::<Rename>::default();
        let mut events = Vec::new();
        let mut changes = StateChanges::new(1);

        let response = handler
            .handle(&Rename { name: "bob".into() }, &mut events, &mut changes)
            .await
            .unwrap();

        assert_eq!(response, 3);
        assert_eq!(events, vec![Renamed { name: "bob".into() }]);
        assert_eq!(changes.snapshot(), vec!["UPDATE name = bob".to_string()]);
    }

    #[tokio::test]
    async fn handler_passes_domain_errors_through() {
        let handler = CommandHandler::<Rename>::new();
        let mut events = Vec::new();
        let mut changes = StateChanges::new(1);

        let result = handler
            .handle(&Rename { name: "taken".into() }, &mut events, &mut changes)
            .await;

        assert!(matches!(result, Err(ExecutionError::Domain(NameTaken))));
        assert!(events.is_empty());
        assert!(changes.is_empty());
    }

    #[test]
    fn commands_round_trip_through_json() {
        let command: Rename = serde_json::from_value(serde_json::json!({"name": "x"})).unwrap();
        assert_eq!(command, Rename { name: "x".into() });
        assert_eq!(
            serde_json::to_value(&command).unwrap(),
            serde_json::json!({"name": "x"})
        );
    }
}
