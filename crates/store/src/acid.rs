use async_trait::async_trait;

use crate::{DatabaseError, StateChanges};

/// Gives the command layer access to a transactional database.
///
/// A repository is used right before a command execution returns: every update
/// operation recorded in the [`StateChanges`] registry is committed before the
/// command's events are handed to other systems.
///
/// Implementations must:
/// - apply all recorded operations atomically, in registry order
/// - prune the registry once the transaction is committed
/// - leave the registry untouched and return a [`DatabaseError`] on failure
///
/// The repository is shared between concurrent command executions and must
/// provide its own locking discipline.
#[async_trait]
pub trait Acid<T: Send>: Send + Sync {
    /// Commits the pending operations as one transaction.
    async fn commit_as_transaction(
        &self,
        state_changes: &mut StateChanges<T>,
    ) -> Result<(), DatabaseError>;
}
