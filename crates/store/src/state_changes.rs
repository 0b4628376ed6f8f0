//! Bounded registry of operations awaiting a transactional commit.

use thiserror::Error;

/// Returned by [`StateChanges::try_add`] when the registry is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("State changes capacity of {capacity} exceeded")]
pub struct CapacityExceeded {
    pub capacity: usize,
}

/// Ephemeral record of the update operations produced while executing one
/// command.
///
/// Operations are committed against the application database as a single
/// ACID transaction before the command's events are published. Insertion
/// order is the commit order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateChanges<T> {
    capacity: usize,
    storage: Vec<T>,
}

impl<T> StateChanges<T> {
    /// Creates an empty registry holding at most `capacity` operations.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            storage: Vec::new(),
        }
    }

    /// Appends an operation.
    ///
    /// # Panics
    ///
    /// Panics if the registry already holds `capacity` operations. A command
    /// recording more operations than it was granted is a programming error.
    pub fn add(&mut self, value: T) {
        if let Err(e) = self.try_add(value) {
            panic!("{e}");
        }
    }

    /// Appends an operation, refusing it when the registry is full.
    pub fn try_add(&mut self, value: T) -> Result<(), CapacityExceeded> {
        if self.storage.len() >= self.capacity {
            return Err(CapacityExceeded {
                capacity: self.capacity,
            });
        }
        self.storage.push(value);
        Ok(())
    }

    /// Returns true if no operation is pending.
    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    /// Returns the number of pending operations.
    pub fn storage_length(&self) -> usize {
        self.storage.len()
    }

    /// Returns the maximum number of operations.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns how many more operations can be added.
    pub fn remaining(&self) -> usize {
        self.capacity - self.storage.len()
    }

    /// Iterates pending operations in commit order.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.storage.iter()
    }

    /// Drops every pending operation.
    ///
    /// Repositories call this once the transaction has been committed.
    pub fn prune(&mut self) {
        self.storage.clear();
    }
}

impl<T: Clone> StateChanges<T> {
    /// Returns a copy of the pending operations without touching the registry.
    pub fn snapshot(&self) -> Vec<T> {
        self.storage.clone()
    }
}

impl<'a, T> IntoIterator for &'a StateChanges<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
