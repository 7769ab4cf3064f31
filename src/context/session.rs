//! Session storage.
//!
//! # Responsibilities
//! - Keep session data between requests, keyed by session id
//! - Hand each request its own working copy ([`Session`])
//! - Persist the copy when the request completes
//!
//! # Design Decisions
//! - Concurrent map (dashmap) so blocking request threads never contend on
//!   one lock
//! - Clearing a session removes it from the store immediately, not at commit
//! - Empty sessions are not stored
//! - Sessions idle longer than the timeout are treated as absent and swept
//!   by [`SessionStore::purge_idle`]

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde_json::{Map, Value};
use uuid::Uuid;

/// Idle time after which a session expires, unless configured otherwise.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(24 * 60);

#[derive(Debug)]
struct StoredSession {
    data: Map<String, Value>,
    last_access: Instant,
}

/// Process-wide session store.
#[derive(Debug)]
pub struct SessionStore {
    sessions: DashMap<String, StoredSession>,
    idle_timeout: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_idle_timeout(DEFAULT_IDLE_TIMEOUT)
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_idle_timeout(idle_timeout: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            idle_timeout,
        }
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// Open the session named by `id`, or start a new one.
    ///
    /// Unknown and expired ids are not reused; a fresh id is issued instead.
    pub fn start(self: &Arc<Self>, id: Option<&str>) -> Session {
        self.start_at(id, Instant::now())
    }

    fn start_at(self: &Arc<Self>, id: Option<&str>, now: Instant) -> Session {
        if let Some(id) = id {
            if let Some(mut stored) = self.sessions.get_mut(id) {
                if !self.is_idle(&stored, now) {
                    stored.last_access = now;
                    return Session {
                        id: id.to_string(),
                        data: stored.data.clone(),
                        store: Some(Arc::clone(self)),
                        fresh: false,
                    };
                }
            }
            self.sessions.remove_if(id, |_, stored| self.is_idle(stored, now));
        }

        Session {
            id: Uuid::new_v4().simple().to_string(),
            data: Map::new(),
            store: Some(Arc::clone(self)),
            fresh: true,
        }
    }

    /// Persist a request's session. Empty sessions are dropped from the store.
    pub fn save(&self, session: &Session) {
        if session.data.is_empty() {
            self.sessions.remove(&session.id);
        } else {
            self.sessions.insert(
                session.id.clone(),
                StoredSession {
                    data: session.data.clone(),
                    last_access: Instant::now(),
                },
            );
        }
    }

    /// Drop every session idle past the timeout. Returns how many went.
    pub fn purge_idle(&self) -> usize {
        self.purge_idle_at(Instant::now())
    }

    fn purge_idle_at(&self, now: Instant) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, stored| !self.is_idle(stored, now));
        before.saturating_sub(self.sessions.len())
    }

    fn is_idle(&self, stored: &StoredSession, now: Instant) -> bool {
        now.saturating_duration_since(stored.last_access) > self.idle_timeout
    }

    pub fn remove(&self, id: &str) {
        self.sessions.remove(id);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sessions.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// A request's working copy of its session.
#[derive(Debug, Clone, Default)]
pub struct Session {
    id: String,
    data: Map<String, Value>,
    store: Option<Arc<SessionStore>>,
    fresh: bool,
}

impl Session {
    /// A session not backed by any store.
    pub fn detached() -> Self {
        Self::default()
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// True when the id was issued during this request.
    pub fn is_fresh(&self) -> bool {
        self.fresh
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.data.insert(key.into(), value.into());
    }

    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Empty the session here and in the backing store.
    pub fn clear(&mut self) {
        self.data.clear();
        if let Some(store) = &self.store {
            store.remove(&self.id);
        }
    }

    /// Write this session back to its store, if it has one.
    pub fn commit(&self) {
        if let Some(store) = &self.store {
            store.save(self);
        }
    }
}
