//! # Per-Subject Exclusive Sections
//!
//! One async mutex per subject id. Guards are owned, so the exclusive
//! section can move into a spawned task and outlive the caller's future.

use std::collections::HashMap;
use std::sync::Arc;

use kyc_core::UserId;
use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LockMap = Arc<Mutex<HashMap<UserId, Arc<AsyncMutex<()>>>>>;

/// Held while a mutation for `subject` is in flight. Dropping the last
/// guard with no waiters removes the subject's entry from the map.
#[derive(Debug)]
pub struct SubjectGuard {
    subject: UserId,
    guard: Option<OwnedMutexGuard<()>>,
    locks: LockMap,
}

impl SubjectGuard {
    pub fn subject(&self) -> &UserId {
        &self.subject
    }
}

impl Drop for SubjectGuard {
    fn drop(&mut self) {
        let mut locks = self.locks.lock();
        drop(self.guard.take());
        // Waiters clone the Arc under the map lock, so a count of one
        // means nobody holds or waits for this subject.
        if locks
            .get(&self.subject)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.subject);
        }
    }
}

/// Keyed mutex map. Only subjects with a holder or a waiter have an entry.
#[derive(Debug, Default)]
pub struct SubjectLocks {
    locks: LockMap,
}

impl SubjectLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `subject`.
    pub async fn acquire(&self, subject: UserId) -> SubjectGuard {
        let lock = self.locks.lock().entry(subject).or_default().clone();
        let guard = lock.lock_owned().await;
        SubjectGuard {
            subject,
            guard: Some(guard),
            locks: Arc::clone(&self.locks),
        }
    }

    /// Whether a mutation currently holds `subject`.
    pub fn is_locked(&self, subject: &UserId) -> bool {
        self.locks
            .lock()
            .get(subject)
            .is_some_and(|lock| lock.try_lock().is_err())
    }

    /// Subjects with a holder or a waiter.
    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_subject_is_exclusive() {
        let locks = Arc::new(SubjectLocks::new());
        let subject = UserId::new();
        let guard = locks.acquire(subject).await;
        assert!(locks.is_locked(&subject));

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move { locks.acquire(subject).await.subject().to_owned() })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());
        drop(guard);
        assert_eq!(waiter.await.unwrap(), subject);
    }

    #[tokio::test]
    async fn idle_subjects_are_forgotten() {
        let locks = Arc::new(SubjectLocks::new());
        let subject = UserId::new();
        let guard = locks.acquire(subject).await;
        assert_eq!(locks.len(), 1);

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _held = locks.acquire(subject).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(guard);
        waiter.await.unwrap();
        assert!(locks.is_empty());
        assert!(!locks.is_locked(&subject));

        for _ in 0..10 {
            drop(locks.acquire(UserId::new()).await);
        }
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn different_subjects_do_not_contend() {
        let locks = SubjectLocks::new();
        let _a = locks.acquire(UserId::new()).await;
        let _b = locks.acquire(UserId::new()).await;
    }
}
