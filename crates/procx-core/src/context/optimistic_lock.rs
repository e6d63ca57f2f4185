//! Listeners that may tolerate optimistic-lock failures during flush

use crate::persistence::{DbOperation, EntityType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimisticLockingResult {
    /// Drop the failed operation and continue flushing the rest
    Ignore,
    /// Abort the flush with an optimistic-lock error
    Throw,
}

/// Consulted when a flush operation fails its revision check
///
/// A listener scoped to an entity type only sees failures for that type;
/// `None` sees every failure. The first listener answering `Ignore` wins.
pub trait OptimisticLockingListener: Send {
    fn entity_type(&self) -> Option<EntityType>;

    fn failed_operation(&mut self, operation: &DbOperation) -> OptimisticLockingResult;
}

/// Ignore every conflict on one entity type
#[derive(Debug, Clone, Copy)]
pub struct IgnoreConflicts(pub EntityType);

impl OptimisticLockingListener for IgnoreConflicts {
    fn entity_type(&self) -> Option<EntityType> {
        Some(self.0)
    }

    fn failed_operation(&mut self, _operation: &DbOperation) -> OptimisticLockingResult {
        OptimisticLockingResult::Ignore
    }
}

/// Ask the listeners registered for the operation's entity type
pub fn resolve(
    listeners: &mut [Box<dyn OptimisticLockingListener>],
    operation: &DbOperation,
) -> OptimisticLockingResult {
    for listener in listeners.iter_mut() {
        let applies = listener
            .entity_type()
            .map_or(true, |ty| ty == operation.entity_type());
        if applies && listener.failed_operation(operation) == OptimisticLockingResult::Ignore {
            return OptimisticLockingResult::Ignore;
        }
    }
    OptimisticLockingResult::Throw
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delete(entity_type: EntityType) -> DbOperation {
        DbOperation::Delete {
            entity_type,
            id: "x".to_string(),
            expected_rev: 1,
        }
    }

    #[test]
    fn test_listener_only_applies_to_its_entity_type() {
        let mut listeners: Vec<Box<dyn OptimisticLockingListener>> =
            vec![Box::new(IgnoreConflicts(EntityType::Job))];

        assert_eq!(
            resolve(&mut listeners, &delete(EntityType::Job)),
            OptimisticLockingResult::Ignore
        );
        assert_eq!(
            resolve(&mut listeners, &delete(EntityType::Task)),
            OptimisticLockingResult::Throw
        );
    }

    #[test]
    fn test_no_listeners_means_throw() {
        assert_eq!(
            resolve(&mut [], &delete(EntityType::Job)),
            OptimisticLockingResult::Throw
        );
    }
}
