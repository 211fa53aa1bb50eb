use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::backend::{AuthUser, Backend};
use crate::cart::CartStore;
use crate::orders::SubmissionSettings;

/// A signed-in customer: the auth user plus the backend access token used to
/// end the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user: AuthUser,
    pub access_token: String,
}

/// Session token -> (session, expires_at).
#[derive(Debug, Clone)]
pub struct SessionStore {
    inner: Arc<DashMap<String, (Session, Instant)>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn create(&self, session: Session) -> String {
        let token = uuid::Uuid::new_v4().to_string();
        let expires = Instant::now() + self.ttl;
        self.inner.insert(token.clone(), (session, expires));
        token
    }

    pub fn get(&self, token: &str) -> Option<Session> {
        let entry = self.inner.get(token)?;
        if entry.1 > Instant::now() {
            Some(entry.0.clone())
        } else {
            drop(entry);
            self.inner.remove(token);
            None
        }
    }

    pub fn remove(&self, token: &str) -> Option<Session> {
        self.inner.remove(token).map(|(_, (session, _))| session)
    }

    /// Drop expired sessions; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.inner.len();
        self.inner.retain(|_, (_, expires)| *expires > now);
        before.saturating_sub(self.inner.len())
    }
}

#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<dyn Backend>,
    pub sessions: SessionStore,
    pub carts: CartStore,
    /// Public URL prefix for product images.
    pub storage_base: Option<String>,
    pub submissions: SubmissionSettings,
    pub secure_cookies: bool,
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{Session, SessionStore};
    use crate::backend::AuthUser;

    fn session(id: &str) -> Session {
        Session {
            user: AuthUser {
                id: id.to_string(),
                email: Some(format!("{id}@example.com")),
            },
            access_token: format!("backend-{id}"),
        }
    }

    #[test]
    fn live_sessions_resolve_until_removed() {
        let store = SessionStore::new(Duration::from_secs(3600));
        let token = store.create(session("ana"));
        assert_eq!(store.get(&token).map(|s| s.user.id), Some(String::from("ana")));
        assert_eq!(store.purge_expired(), 0);
        assert_eq!(store.remove(&token), Some(session("ana")));
        assert_eq!(store.get(&token), None);
    }

    #[test]
    fn expired_sessions_are_rejected_and_purged() {
        let store = SessionStore::new(Duration::ZERO);
        let first = store.create(session("ana"));
        store.create(session("bia"));
        store.create(session("caio"));

        assert_eq!(store.get(&first), None);
        assert_eq!(store.purge_expired(), 2);
        assert_eq!(store.purge_expired(), 0);
    }
}
