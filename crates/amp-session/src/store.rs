//! # Session Store
//!
//! Sessions keyed by `SessionId`, each behind its own mutex. The flow
//! holds a session's lock for the whole of one operation, which is the
//! per-session serialization discipline: two concurrent requests against
//! the same session (say, "complete step-up" racing "cancel") cannot
//! interleave mid-transition, while operations on different sessions run
//! fully in parallel.
//!
//! The in-memory implementation serves the reference deployment; any
//! durable store satisfying the trait can replace it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use amp_core::{SessionId, Timestamp};

use crate::state::{Session, SessionState};

/// Keyed session storage handing out per-session locks.
pub trait SessionStore: Send + Sync {
    /// Store a fresh session.
    fn insert(&self, session: Session);

    /// The lock handle for a session, if it exists.
    fn session(&self, session_id: &SessionId) -> Option<Arc<Mutex<Session>>>;

    /// Remove a session outright; returns whether it was present.
    fn remove(&self, session_id: &SessionId) -> bool;

    /// Ids of all sessions currently in `state`.
    fn in_state(&self, state: SessionState) -> Vec<SessionId>;

    /// Remove terminal or idle sessions.
    ///
    /// A session is swept when it is terminal, or when it has not been
    /// touched for `idle_ttl_secs`. Returns how many were removed.
    fn sweep(&self, now: &Timestamp, idle_ttl_secs: i64) -> usize;
}

/// In-memory session store.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<SessionId, Arc<Mutex<Session>>>>,
}

impl InMemorySessionStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for InMemorySessionStore {
    fn insert(&self, session: Session) {
        self.sessions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(session.session_id.clone(), Arc::new(Mutex::new(session)));
    }

    fn session(&self, session_id: &SessionId) -> Option<Arc<Mutex<Session>>> {
        self.sessions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(session_id)
            .cloned()
    }

    fn remove(&self, session_id: &SessionId) -> bool {
        self.sessions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(session_id)
            .is_some()
    }

    fn in_state(&self, state: SessionState) -> Vec<SessionId> {
        self.sessions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|(_, handle)| {
                handle.lock().unwrap_or_else(|e| e.into_inner()).state == state
            })
            .map(|(id, _)| id.clone())
            .collect()
    }

    fn sweep(&self, now: &Timestamp, idle_ttl_secs: i64) -> usize {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        let before = sessions.len();
        sessions.retain(|_, handle| {
            let session = handle.lock().unwrap_or_else(|e| e.into_inner());
            !session.state.is_terminal() && session.idle_secs(now) <= idle_ttl_secs
        });
        before - sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use amp_core::UserId;

    #[test]
    fn insert_lookup_remove() {
        let store = InMemorySessionStore::new();
        let session = Session::new(UserId::new("user-1"));
        let id = session.session_id.clone();
        store.insert(session);

        let handle = store.session(&id).unwrap();
        assert_eq!(
            handle.lock().unwrap().state,
            SessionState::CollectingIntent
        );
        assert!(store.remove(&id));
        assert!(store.session(&id).is_none());
        assert!(!store.remove(&id));
    }

    #[test]
    fn in_state_filters() {
        let store = InMemorySessionStore::new();
        let a = Session::new(UserId::new("a"));
        let mut b = Session::new(UserId::new("b"));
        b.transition(SessionState::Cancelled, "test").unwrap();
        let a_id = a.session_id.clone();
        store.insert(a);
        store.insert(b);
        assert_eq!(store.in_state(SessionState::CollectingIntent), vec![a_id]);
    }

    #[test]
    fn sweep_removes_terminal_and_idle() {
        let store = InMemorySessionStore::new();
        let fresh = Session::new(UserId::new("fresh"));
        let fresh_id = fresh.session_id.clone();
        let mut done = Session::new(UserId::new("done"));
        done.transition(SessionState::Failed, "test").unwrap();
        store.insert(fresh);
        store.insert(done);

        // Terminal session goes; the fresh one stays.
        assert_eq!(store.sweep(&Timestamp::now(), 3600), 1);
        assert!(store.session(&fresh_id).is_some());

        // With a negative idle budget everything is stale.
        assert_eq!(store.sweep(&Timestamp::now().plus_secs(10), -1), 1);
    }
}
