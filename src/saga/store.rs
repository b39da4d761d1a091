use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use thiserror::Error;
use uuid::Uuid;

use super::{SagaInstance, SagaStatus};

#[derive(Debug, Error)]
pub enum SagaError {
    #[error("saga store lock poisoned")]
    LockPoisoned,
    #[error("saga `{id}` cannot move from {from} to {to}")]
    InvalidTransition {
        id: Uuid,
        from: SagaStatus,
        to: SagaStatus,
    },
}

struct Instances<D> {
    by_id: HashMap<Uuid, SagaInstance<D>>,
    next_sequence: u64,
}

/// In-memory saga instances, one per correlation id.
///
/// Every transition is a compare-and-advance under the write lock, so a
/// duplicate or late event finds the instance already moved on and does
/// nothing.
pub struct SagaStore<D> {
    inner: Arc<RwLock<Instances<D>>>,
}

impl<D> Clone for SagaStore<D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<D> Default for SagaStore<D> {
    fn default() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Instances {
                by_id: HashMap::new(),
                next_sequence: 0,
            })),
        }
    }
}

impl<D: Clone> SagaStore<D> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new `Pending` instance. Returns `false` if `id` already started.
    pub fn start(&self, id: Uuid, data: D) -> Result<bool, SagaError> {
        let mut instances = self.inner.write().map_err(|_| SagaError::LockPoisoned)?;
        if instances.by_id.contains_key(&id) {
            return Ok(false);
        }
        let sequence = instances.next_sequence;
        instances.next_sequence += 1;
        instances.by_id.insert(
            id,
            SagaInstance {
                correlation_id: id,
                status: SagaStatus::Pending,
                data,
                sequence,
            },
        );
        Ok(true)
    }

    pub fn get(&self, id: Uuid) -> Result<Option<SagaInstance<D>>, SagaError> {
        let instances = self.inner.read().map_err(|_| SagaError::LockPoisoned)?;
        Ok(instances.by_id.get(&id).cloned())
    }

    /// Current status, `None` while idle.
    pub fn status(&self, id: Uuid) -> Result<Option<SagaStatus>, SagaError> {
        let instances = self.inner.read().map_err(|_| SagaError::LockPoisoned)?;
        Ok(instances.by_id.get(&id).map(|instance| instance.status))
    }

    /// Move `id` from `from` to `to`, applying `update` to its data.
    ///
    /// Returns the advanced instance, or `None` when the instance does not
    /// exist or is not in `from`.
    pub fn transition(
        &self,
        id: Uuid,
        from: SagaStatus,
        to: SagaStatus,
        update: impl FnOnce(&mut D),
    ) -> Result<Option<SagaInstance<D>>, SagaError> {
        if !from.can_advance_to(to) {
            return Err(SagaError::InvalidTransition { id, from, to });
        }

        let mut instances = self.inner.write().map_err(|_| SagaError::LockPoisoned)?;
        match instances.by_id.get_mut(&id) {
            Some(instance) if instance.status == from => {
                instance.status = to;
                update(&mut instance.data);
                Ok(Some(instance.clone()))
            }
            _ => Ok(None),
        }
    }

    /// Put `previous` back if the instance is still in `from`.
    ///
    /// Undoes a transition whose follow-up command could not be issued, so a
    /// redelivered event finds the instance where it was and retries.
    pub fn revert(&self, previous: &SagaInstance<D>, from: SagaStatus) -> Result<bool, SagaError> {
        let mut instances = self.inner.write().map_err(|_| SagaError::LockPoisoned)?;
        match instances.by_id.get_mut(&previous.correlation_id) {
            Some(instance) if instance.status == from => {
                instance.status = previous.status;
                instance.data = previous.data.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Forget `id` if it is still in `status`. Undoes a `start`.
    pub fn discard(&self, id: Uuid, status: SagaStatus) -> Result<bool, SagaError> {
        let mut instances = self.inner.write().map_err(|_| SagaError::LockPoisoned)?;
        if instances.by_id.get(&id).is_some_and(|instance| instance.status == status) {
            instances.by_id.remove(&id);
            return Ok(true);
        }
        Ok(false)
    }

    /// Instances matching `predicate`, in start order.
    pub fn find(
        &self,
        predicate: impl Fn(&SagaInstance<D>) -> bool,
    ) -> Result<Vec<SagaInstance<D>>, SagaError> {
        let instances = self.inner.read().map_err(|_| SagaError::LockPoisoned)?;
        let mut found: Vec<_> = instances
            .by_id
            .values()
            .filter(|instance| predicate(instance))
            .cloned()
            .collect();
        found.sort_by_key(|instance| instance.sequence);
        Ok(found)
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|i| i.by_id.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
