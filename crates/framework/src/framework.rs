//! The command orchestrator.

use std::time::Instant;

use ez_cqrs_store::{Acid, DatabaseError, StateChanges};
use tokio::sync::mpsc;

use crate::command::{Command, CommandHandler};
use crate::config::FrameworkConfig;
use crate::error::ExecutionError;
use crate::publish::{EventPublisher, PublishFailure};

/// Runs one command end to end.
///
/// A run goes through, in order and stopping at the first failure:
/// 1. Validating the command
/// 2. Executing it against a fresh [`StateChanges`] registry
/// 3. Committing the recorded operations through the repository
/// 4. Publishing the produced events
///
/// A domain rejection from step 2 is held back until step 3 has committed
/// whatever the command recorded before rejecting; events are then dropped
/// unpublished. Database and unexpected failures abort immediately.
pub struct EzCqrs<C: Command> {
    handler: CommandHandler<C>,
    publisher: EventPublisher,
}

impl<C: Command> EzCqrs<C> {
    /// Creates an orchestrator that only logs publish failures.
    pub fn new() -> Self {
        Self {
            handler: CommandHandler::new(),
            publisher: EventPublisher::new(),
        }
    }

    /// Creates an orchestrator forwarding publish failures to a bounded channel.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0.
    pub fn with_publish_errors(capacity: usize) -> (Self, mpsc::Receiver<PublishFailure>) {
        let (publisher, rx) = EventPublisher::with_failure_channel(capacity);
        (
            Self {
                handler: CommandHandler::new(),
                publisher,
            },
            rx,
        )
    }

    /// Creates an orchestrator from configuration.
    ///
    /// The receiver is returned when the config enables publish-error reporting.
    /// The transaction bound stays a per-call argument: pass
    /// `config.max_transactions` to [`EzCqrs::run`].
    pub fn from_config(config: &FrameworkConfig) -> (Self, Option<mpsc::Receiver<PublishFailure>>) {
        if config.reports_publish_errors() {
            let (framework, rx) = Self::with_publish_errors(config.publish_error_capacity);
            (framework, Some(rx))
        } else {
            (Self::new(), None)
        }
    }

    /// Validates and executes a command, commits its state changes, then
    /// publishes its events.
    ///
    /// Returns the command response with every produced event, in append order.
    ///
    /// # Panics
    ///
    /// - if `max_transactions > 0` and no repository is given, before any work
    /// - if the repository reports success but leaves operations in the registry
    #[tracing::instrument(
        skip(self, command, repository),
        fields(command = std::any::type_name::<C>())
    )]
    pub async fn run(
        &self,
        command: C,
        max_transactions: usize,
        repository: Option<&dyn Acid<C::Op>>,
    ) -> Result<(C::Response, Vec<C::Event>), ExecutionError<C::Error>> {
        assert!(
            max_transactions == 0 || repository.is_some(),
            "max_transactions is {max_transactions} but no repository was set to commit transactions"
        );

        metrics::counter!("ez_cqrs_commands_total").increment(1);
        let started = Instant::now();

        let result = self.run_steps(command, max_transactions, repository).await;

        metrics::histogram!("ez_cqrs_run_duration_seconds").record(started.elapsed().as_secs_f64());
        if let Err(e) = &result {
            metrics::counter!("ez_cqrs_command_failures_total", "kind" => e.kind().as_str())
                .increment(1);
            if e.is_infrastructure() {
                tracing::error!(kind = %e.kind(), error = %e, "command failed");
            } else {
                tracing::warn!(kind = %e.kind(), error = %e, "command rejected");
            }
        }

        result
    }

    async fn run_steps(
        &self,
        command: C,
        max_transactions: usize,
        repository: Option<&dyn Acid<C::Op>>,
    ) -> Result<(C::Response, Vec<C::Event>), ExecutionError<C::Error>> {
        let mut state_changes = StateChanges::new(max_transactions);

        self.handler.validate(&command)?;
        tracing::debug!("command validated");

        let mut events = Vec::new();
        let outcome = match self
            .handler
            .handle(&command, &mut events, &mut state_changes)
            .await
        {
            Ok(response) => Ok(response),
            Err(ExecutionError::Domain(err)) => {
                tracing::debug!(
                    pending = state_changes.storage_length(),
                    "domain rejection deferred until commit"
                );
                Err(err)
            }
            Err(err) => return Err(err),
        };

        if let Some(repository) = repository
            && max_transactions > 0
        {
            self.commit(repository, &mut state_changes).await?;
        }

        let response = outcome.map_err(ExecutionError::Domain)?;

        let failed = self.publisher.publish_all(&events).await;
        tracing::debug!(events = events.len(), failed, "events published");

        Ok((response, events))
    }

    async fn commit(
        &self,
        repository: &dyn Acid<C::Op>,
        state_changes: &mut StateChanges<C::Op>,
    ) -> Result<(), DatabaseError> {
        if state_changes.is_empty() {
            return Ok(());
        }

        let operations = state_changes.storage_length();
        repository.commit_as_transaction(state_changes).await?;

        assert!(
            state_changes.is_empty(),
            "repository committed the transaction but left {} operation(s) in the registry",
            state_changes.storage_length()
        );

        metrics::counter!("ez_cqrs_commits_total").increment(1);
        tracing::debug!(operations, "state changes committed");
        Ok(())
    }
}

impl<C: Command> Default for EzCqrs<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Command> Clone for EzCqrs<C> {
    fn clone(&self) -> Self {
        Self {
            handler: self.handler.clone(),
            publisher: self.publisher.clone(),
        }
    }
}
