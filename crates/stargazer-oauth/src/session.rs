//! Per-client session state for the browser flow.
//!
//! Sessions are in-memory, bounded by an LRU capacity and an idle TTL, and
//! keyed by an opaque [`SessionId`]; the HTTP layer decides how that id
//! travels (a cookie in `stargazer-server`).

use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use lru::LruCache;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, trace};
use uuid::Uuid;

/// Opaque session identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Create a fresh random session id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a session id previously produced by [`SessionId::to_string`].
    pub fn parse(value: &str) -> Option<Self> {
        Uuid::parse_str(value.trim()).ok().map(Self)
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// State kept for one client across the redirect round-trip.
#[derive(Clone, Default)]
pub struct AuthorizationSession {
    /// CSRF state of the latest browser authorization attempt.
    pub csrf_state: Option<String>,
    /// Bearer token, once the code exchange succeeded.
    pub access_token: Option<String>,
}

impl fmt::Debug for AuthorizationSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizationSession")
            .field("csrf_state", &self.csrf_state.as_ref().map(|_| "[set]"))
            .field("access_token", &self.access_token.as_ref().map(|_| "[set]"))
            .finish()
    }
}

/// Default maximum number of live sessions before LRU eviction.
pub const DEFAULT_MAX_SESSIONS: usize = 10_000;

/// Default idle time after which a session expires.
pub const DEFAULT_SESSION_TTL: Option<Duration> = Some(Duration::from_secs(3600));

struct SessionEntry {
    session: AuthorizationSession,
    last_access: Instant,
}

impl SessionEntry {
    fn new() -> Self {
        Self {
            session: AuthorizationSession::default(),
            last_access: Instant::now(),
        }
    }
}

struct SessionsInner {
    lru: LruCache<SessionId, SessionEntry>,
    ttl: Option<Duration>,
}

impl SessionsInner {
    fn is_expired(&self, entry: &SessionEntry) -> bool {
        self.ttl.is_some_and(|ttl| entry.last_access.elapsed() > ttl)
    }

    /// Live session for `id`, with its access time refreshed.
    ///
    /// An expired entry is dropped on the way.
    fn touch(&mut self, id: SessionId) -> Option<&mut AuthorizationSession> {
        let expired = self.is_expired(self.lru.peek(&id)?);
        if expired {
            self.lru.pop(&id);
            debug!(session = %id, "Dropped expired session");
            return None;
        }
        let entry = self.lru.get_mut(&id)?;
        entry.last_access = Instant::now();
        Some(&mut entry.session)
    }

    fn upsert(&mut self, id: SessionId, update: impl FnOnce(&mut AuthorizationSession)) {
        if let Some(session) = self.touch(id) {
            update(session);
            return;
        }

        let mut entry = SessionEntry::new();
        update(&mut entry.session);
        if let Some((evicted, _)) = self.lru.push(id, entry)
            && evicted != id
        {
            debug!(session = %evicted, "Evicting LRU session to make room");
        }
        trace!(session = %id, sessions = self.lru.len(), "Session created");
    }
}

/// In-memory session store shared across handlers.
///
/// Bounded: the least recently used session is evicted once
/// `max_sessions` is reached, and sessions idle longer than the TTL expire.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<RwLock<SessionsInner>>,
    max_sessions: usize,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_config(DEFAULT_MAX_SESSIONS, DEFAULT_SESSION_TTL)
    }
}

impl fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStore")
            .field("max_sessions", &self.max_sessions)
            .finish_non_exhaustive()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store with a custom capacity and the default TTL.
    pub fn with_capacity(max_sessions: usize) -> Self {
        Self::with_config(max_sessions, DEFAULT_SESSION_TTL)
    }

    /// Store with a custom capacity and TTL (`None` disables expiry).
    pub fn with_config(max_sessions: usize, ttl: Option<Duration>) -> Self {
        let cap = NonZeroUsize::new(max_sessions).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Arc::new(RwLock::new(SessionsInner {
                lru: LruCache::new(cap),
                ttl,
            })),
            max_sessions: cap.get(),
        }
    }

    pub fn max_sessions(&self) -> usize {
        self.max_sessions
    }

    /// Store the CSRF state for a new authorization attempt.
    ///
    /// Replaces any previous state, the session's token is kept.
    pub async fn set_csrf_state(&self, id: SessionId, state: String) {
        let mut inner = self.inner.write().await;
        inner.upsert(id, |session| session.csrf_state = Some(state));
    }

    pub async fn csrf_state(&self, id: SessionId) -> Option<String> {
        let mut inner = self.inner.write().await;
        inner.touch(id).and_then(|s| s.csrf_state.clone())
    }

    pub async fn set_access_token(&self, id: SessionId, token: String) {
        let mut inner = self.inner.write().await;
        inner.upsert(id, |session| session.access_token = Some(token));
    }

    pub async fn access_token(&self, id: SessionId) -> Option<String> {
        let mut inner = self.inner.write().await;
        inner
            .touch(id)
            .and_then(|s| s.access_token.clone())
            .filter(|t| !t.is_empty())
    }

    /// Snapshot of a session.
    pub async fn get(&self, id: SessionId) -> Option<AuthorizationSession> {
        let mut inner = self.inner.write().await;
        inner.touch(id).cloned()
    }

    /// Drop a session. Returns `true` if it existed.
    pub async fn remove(&self, id: SessionId) -> bool {
        self.inner.write().await.lru.pop(&id).is_some()
    }

    /// Whether a live (unexpired) session exists, without refreshing it.
    pub async fn contains(&self, id: SessionId) -> bool {
        let inner = self.inner.read().await;
        inner.lru.peek(&id).is_some_and(|e| !inner.is_expired(e))
    }

    /// Remove every expired session. Returns how many were dropped.
    pub async fn cleanup_expired(&self) -> usize {
        let mut inner = self.inner.write().await;
        let expired: Vec<SessionId> = inner
            .lru
            .iter()
            .filter(|(_, entry)| inner.is_expired(entry))
            .map(|(id, _)| *id)
            .collect();

        for id in &expired {
            inner.lru.pop(id);
        }
        if !expired.is_empty() {
            debug!(count = expired.len(), "Cleaned up expired sessions");
        }
        expired.len()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.lru.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.lru.is_empty()
    }
}
