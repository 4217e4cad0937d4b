//! In-memory saga log.
//!
//! Holds the latest snapshot of every saga started by this process. Nothing
//! is persisted; the log starts empty after a restart.

use dashmap::DashMap;
use relaychat_types::saga::Saga;
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct SagaLog {
    sagas: DashMap<Uuid, Saga>,
}

impl SagaLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the current state of `saga`, replacing any earlier snapshot.
    pub fn record(&self, saga: &Saga) {
        self.sagas.insert(saga.id, saga.clone());
    }

    pub fn get(&self, id: &Uuid) -> Option<Saga> {
        self.sagas.get(id).map(|entry| entry.value().clone())
    }

    /// Every saga started for `message_id`, oldest first.
    pub fn for_message(&self, message_id: i64) -> Vec<Saga> {
        let mut sagas: Vec<Saga> = self
            .sagas
            .iter()
            .filter(|entry| entry.message_id == message_id)
            .map(|entry| entry.value().clone())
            .collect();
        sagas.sort_by_key(|saga| saga.id);
        sagas
    }

    pub fn len(&self) -> usize {
        self.sagas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sagas.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaychat_types::saga::SagaStatus;

    #[test]
    fn record_replaces_snapshot() {
        let log = SagaLog::new();
        let mut saga = Saga::pending(1, 1, 0);
        log.record(&saga);
        saga.complete();
        log.record(&saga);

        assert_eq!(log.len(), 1);
        assert_eq!(log.get(&saga.id).unwrap().status, SagaStatus::Completed);
    }

    #[test]
    fn lookup_by_message() {
        let log = SagaLog::new();
        let first = Saga::pending(5, 1, 0);
        let second = Saga::pending(5, 1, 0);
        log.record(&first);
        log.record(&second);
        log.record(&Saga::pending(6, 1, 0));

        let ids: Vec<Uuid> = log.for_message(5).iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![first.id, second.id]);
        assert!(log.get(&Uuid::now_v7()).is_none());
    }
}
