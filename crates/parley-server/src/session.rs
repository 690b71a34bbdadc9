//! In-process conversation session repository.
//!
//! Sessions are process-lifetime state: they vanish on restart and are
//! removed only by a successful finalize. The repository is an explicit
//! value injected through `AppState` rather than ambient global state, so
//! handlers and tests share one instance without a static.
//!
//! Two creation paths coexist on purpose: `create` (the `/new_session`
//! endpoint) and lazy initialization on first use of an unseen id inside
//! the turn-taking flow. Explicit creation wins: `get_or_init` never
//! re-initializes an existing transcript.

use parley_types::Turn;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

/// Conversation session repository.
///
/// Uses `std::sync::RwLock` intentionally: all lock acquisitions are brief
/// map operations that never span `.await` points, making a synchronous
/// lock safe and more efficient than `tokio::sync::RwLock`.
#[derive(Clone, Debug)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<String, Vec<Turn>>>>,
    preamble: String,
    max_turns: usize,
}

impl SessionStore {
    /// `preamble` seeds every new transcript as its first `system` turn;
    /// `max_turns` bounds transcript growth (see [`SessionStore::append`]).
    pub fn new(preamble: impl Into<String>, max_turns: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            preamble: preamble.into(),
            max_turns: max_turns.max(1),
        }
    }

    fn seed(&self) -> Vec<Turn> {
        vec![Turn::system(self.preamble.clone())]
    }

    /// Allocates a fresh session and returns its id.
    pub fn create(&self) -> String {
        let id = Uuid::new_v4().to_string();
        self.write().insert(id.clone(), self.seed());
        id
    }

    /// Returns a snapshot of the transcript, initializing an unseen id with
    /// the preamble. A transcript that already exists is returned as-is.
    pub fn get_or_init(&self, id: &str) -> Vec<Turn> {
        let mut map = self.write();
        map.entry(id.to_string())
            .or_insert_with(|| self.seed())
            .clone()
    }

    /// Appends a turn to the transcript, initializing an unseen id first.
    ///
    /// Enforces the transcript budget: once the transcript exceeds
    /// `max_turns`, the oldest turns after the leading preamble are
    /// evicted. The preamble itself is never evicted.
    pub fn append(&self, id: &str, turn: Turn) {
        let mut map = self.write();
        let turns = map.entry(id.to_string()).or_insert_with(|| self.seed());
        turns.push(turn);
        while turns.len() > self.max_turns && turns.len() > 1 {
            turns.remove(1);
        }
    }

    /// Returns a snapshot of the transcript without initializing.
    pub fn snapshot(&self, id: &str) -> Option<Vec<Turn>> {
        self.read().get(id).cloned()
    }

    /// Atomically reads and deletes the session. `None` when unknown.
    pub fn finalize_and_remove(&self, id: &str) -> Option<Vec<Turn>> {
        self.write().remove(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.read().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Vec<Turn>>> {
        match self.inner.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!("session store lock poisoned, recovering with stale state");
                poisoned.into_inner()
            }
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Vec<Turn>>> {
        match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!("session store lock poisoned, recovering with stale state");
                poisoned.into_inner()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_types::Role;

    fn store() -> SessionStore {
        SessionStore::new("You are a helpful assistant.", 64)
    }

    #[test]
    fn create_seeds_transcript_with_system_preamble() {
        let store = store();
        let id = store.create();
        let transcript = store.snapshot(&id).unwrap();
        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript[0].role, Role::System);
        assert_eq!(transcript[0].content, "You are a helpful assistant.");
    }

    #[test]
    fn get_or_init_initializes_unseen_ids_only() {
        let store = store();
        let transcript = store.get_or_init("fresh-id");
        assert_eq!(transcript.len(), 1);

        store.append("fresh-id", Turn::user("hello"));
        // Existing transcripts are never re-initialized.
        let again = store.get_or_init("fresh-id");
        assert_eq!(again.len(), 2);
    }

    #[test]
    fn finalize_and_remove_is_destructive() {
        let store = store();
        let id = store.create();
        assert!(store.finalize_and_remove(&id).is_some());
        assert!(!store.contains(&id));
        assert!(store.finalize_and_remove(&id).is_none());
    }

    #[test]
    fn append_evicts_oldest_non_system_turns_past_budget() {
        let store = SessionStore::new("preamble", 3);
        let id = store.create();
        store.append(&id, Turn::user("one"));
        store.append(&id, Turn::assistant("two"));
        store.append(&id, Turn::user("three"));

        let transcript = store.snapshot(&id).unwrap();
        assert_eq!(transcript.len(), 3);
        // The preamble survives; the oldest exchange turn is gone.
        assert_eq!(transcript[0].role, Role::System);
        assert_eq!(transcript[1].content, "two");
        assert_eq!(transcript[2].content, "three");
    }

    #[test]
    fn append_tolerates_unseen_ids() {
        let store = store();
        store.append("lazy-id", Turn::user("hi"));
        let transcript = store.snapshot("lazy-id").unwrap();
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[0].role, Role::System);
    }
}
