//! In-memory per-user conversation state with scoped locking.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::conversation::state::ConversationState;
use crate::store::UserId;

/// Session table keyed by user id.
///
/// Each user's state sits behind its own mutex; holding the guard for the
/// whole handling of one event serialises that user's updates without
/// blocking anyone else.
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<UserId, Arc<Mutex<ConversationState>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock `user_id`'s state, creating an `Idle` entry on first contact.
    pub async fn lock(&self, user_id: UserId) -> OwnedMutexGuard<ConversationState> {
        let existing = self.sessions.read().await.get(&user_id).cloned();
        let slot = match existing {
            Some(slot) => slot,
            None => self
                .sessions
                .write()
                .await
                .entry(user_id)
                .or_default()
                .clone(),
        };
        slot.lock_owned().await
    }

    /// Snapshot of a user's state. `Idle` if unknown.
    pub async fn get(&self, user_id: UserId) -> ConversationState {
        let slot = self.sessions.read().await.get(&user_id).cloned();
        match slot {
            Some(slot) => slot.lock().await.clone(),
            None => ConversationState::Idle,
        }
    }

    /// Drop idle sessions nobody is currently using. Returns how many were
    /// removed.
    pub async fn prune_idle(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, slot| {
            if Arc::strong_count(slot) > 1 {
                return true;
            }
            match slot.try_lock() {
                Ok(state) => !state.is_idle(),
                Err(_) => true,
            }
        });
        before - sessions.len()
    }

    /// Number of tracked sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_lock_creates_idle_session() {
        let store = SessionStore::new();
        assert!(store.is_empty().await);
        {
            let guard = store.lock(1).await;
            assert!(guard.is_idle());
        }
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn state_persists_between_locks() {
        let store = SessionStore::new();
        *store.lock(1).await = ConversationState::start_search();
        assert_eq!(store.get(1).await, ConversationState::start_search());
        assert!(store.get(2).await.is_idle());
    }

    #[tokio::test]
    async fn prune_keeps_active_and_held_sessions() {
        let store = SessionStore::new();
        *store.lock(1).await = ConversationState::start_profile();
        drop(store.lock(2).await);
        drop(store.lock(3).await);

        let held = store.lock(3).await;
        let removed = store.prune_idle().await;
        assert_eq!(removed, 1, "only the unheld idle session goes");
        assert_eq!(store.len().await, 2);
        drop(held);

        assert_eq!(store.prune_idle().await, 1);
        assert_eq!(store.get(1).await, ConversationState::start_profile());
    }

    #[tokio::test]
    async fn same_user_is_serialised() {
        let store = Arc::new(SessionStore::new());
        let guard = store.lock(9).await;

        let contender = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                let mut state = store.lock(9).await;
                *state = ConversationState::start_search();
            })
        };

        tokio::task::yield_now().await;
        assert!(!contender.is_finished());
        drop(guard);
        contender.await.unwrap();
        assert_eq!(store.get(9).await, ConversationState::start_search());
    }
}
