//! Session lifecycle plug-point and the in-process default.
//!
//! The dispatcher only *looks up* sessions: a handler that declares a
//! `session()` parameter gets the session named by the request's
//! [`SESSION_COOKIE`], if the manager knows it. Creating and destroying
//! sessions is up to the application (see [`App::open_session`](crate::App::open_session)).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Cookie carrying the session token.
pub const SESSION_COOKIE: &str = "sessionToken";

/// Server-side state shared by the requests of one client.
#[derive(Debug)]
pub struct Session {
    token: String,
    created_at: Instant,
    login: RwLock<Option<String>>,
    attributes: RwLock<HashMap<String, serde_json::Value>>,
}

impl Session {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            created_at: Instant::now(),
            login: RwLock::new(None),
            attributes: RwLock::new(HashMap::new()),
        }
    }

    pub fn token(&self) -> &str { &self.token }
    pub fn created_at(&self) -> Instant { self.created_at }

    /// Name of the user logged in with this session, if any.
    pub fn login(&self) -> Option<String> {
        self.login.read().clone()
    }

    pub fn set_login(&self, login: Option<String>) {
        *self.login.write() = login;
    }

    /// Reads an attribute back as `T`. `None` if absent or of another shape.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let attributes = self.attributes.read();
        T::deserialize(attributes.get(key)?).ok()
    }

    pub fn set<T: Serialize>(&self, key: &str, value: T) -> Result<(), serde_json::Error> {
        let value = serde_json::to_value(value)?;
        self.attributes.write().insert(key.to_owned(), value);
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Option<serde_json::Value> {
        self.attributes.write().remove(key)
    }
}

/// Owns session lifecycle. Lookups run concurrently from many requests.
pub trait SessionManager: Send + Sync + 'static {
    /// Creates and stores a fresh session.
    fn create(&self) -> Arc<Session>;

    /// The live session for `token`, if any.
    fn find(&self, token: &str) -> Option<Arc<Session>>;

    /// Forgets the session. Returns whether it existed.
    fn destroy(&self, token: &str) -> bool;
}

/// Default manager: an in-memory map keyed by random v4 UUID tokens.
///
/// Sessions live until destroyed or the process exits.
#[derive(Debug, Default)]
pub struct InMemorySessionManager {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
}

impl InMemorySessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize { self.sessions.read().len() }
    pub fn is_empty(&self) -> bool { self.sessions.read().is_empty() }
}

impl SessionManager for InMemorySessionManager {
    fn create(&self) -> Arc<Session> {
        let session = Arc::new(Session::new(uuid::Uuid::new_v4().to_string()));
        self.sessions.write().insert(session.token().to_owned(), Arc::clone(&session));
        session
    }

    fn find(&self, token: &str) -> Option<Arc<Session>> {
        self.sessions.read().get(token).cloned()
    }

    fn destroy(&self, token: &str) -> bool {
        self.sessions.write().remove(token).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle() {
        let manager = InMemorySessionManager::new();
        let session = manager.create();
        assert_eq!(session.token().len(), 36);

        let found = manager.find(session.token());
        assert!(found.as_ref().is_some_and(|s| Arc::ptr_eq(s, &session)));

        assert!(manager.destroy(session.token()));
        assert!(!manager.destroy(session.token()));
        assert!(manager.find(session.token()).is_none());
        assert!(manager.is_empty());
    }

    #[test]
    fn tokens_are_unique() {
        let manager = InMemorySessionManager::new();
        let a = manager.create();
        let b = manager.create();
        assert_ne!(a.token(), b.token());
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn attributes_round_trip_through_json() {
        let session = Session::new("t");
        session.set("cart", vec![1, 2, 3]).ok();
        assert_eq!(session.get::<Vec<u32>>("cart"), Some(vec![1, 2, 3]));
        assert_eq!(session.get::<String>("cart"), None);
        assert!(session.remove("cart").is_some());

        session.set_login(Some("alice".into()));
        assert_eq!(session.login().as_deref(), Some("alice"));
    }
}
