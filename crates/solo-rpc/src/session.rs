//! Cookie-keyed, in-memory session store.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{DateTime, Utc};
use solo_core::{HolderToken, TransportConfig};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

/// What the server remembers about one browser session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionRecord {
    /// Token handed out by the last successful `/get_access`.
    pub granted: Option<HolderToken>,
    /// Login name after a successful `/login`.
    pub authenticated: Option<String>,
    pub last_visit: Option<DateTime<Utc>>,
}

/// Session records keyed by the id in the session cookie.
///
/// Records idle for longer than the TTL are dropped whenever a new session
/// is recorded, so abandoned cookies do not pile up.
#[derive(Debug)]
pub struct SessionStore {
    records: RwLock<HashMap<Uuid, Entry>>,
    secure_cookies: bool,
    idle_ttl: Duration,
}

#[derive(Debug)]
struct Entry {
    record: SessionRecord,
    last_seen: Instant,
}

impl SessionStore {
    pub fn new(secure_cookies: bool, idle_ttl: Duration) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            secure_cookies,
            idle_ttl,
        }
    }

    /// Session id carried by `jar`, if the cookie holds a valid one.
    pub fn session_id(jar: &CookieJar) -> Option<Uuid> {
        jar.get(TransportConfig::SESSION_COOKIE)
            .and_then(|cookie| Uuid::parse_str(cookie.value()).ok())
    }

    /// Return the session id from `jar`, minting one (and its cookie) if absent.
    pub fn resolve(&self, jar: CookieJar) -> (CookieJar, Uuid) {
        if let Some(id) = Self::session_id(&jar) {
            return (jar, id);
        }
        let id = Uuid::new_v4();
        let cookie = Cookie::build((TransportConfig::SESSION_COOKIE, id.to_string()))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure_cookies);
        (jar.add(cookie), id)
    }

    /// Record a visit now and return the previous one.
    pub async fn visit(&self, id: Uuid) -> Option<DateTime<Utc>> {
        self.touch(id, |record| record.last_visit.replace(Utc::now()))
            .await
    }

    pub async fn set_granted(&self, id: Uuid, token: HolderToken) {
        self.touch(id, |record| record.granted = Some(token)).await;
    }

    pub async fn granted(&self, id: Uuid) -> Option<HolderToken> {
        self.records.read().await.get(&id).and_then(|e| e.record.granted)
    }

    pub async fn set_authenticated(&self, id: Uuid, login: impl Into<String>) {
        let login = login.into();
        self.touch(id, |record| record.authenticated = Some(login))
            .await;
    }

    pub async fn authenticated(&self, id: Uuid) -> Option<String> {
        self.records
            .read()
            .await
            .get(&id)
            .and_then(|e| e.record.authenticated.clone())
    }

    pub async fn get(&self, id: Uuid) -> Option<SessionRecord> {
        self.records.read().await.get(&id).map(|e| e.record.clone())
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Drop every record idle for longer than the TTL. Returns how many went.
    pub async fn prune(&self) -> usize {
        let mut records = self.records.write().await;
        self.prune_locked(&mut records)
    }

    fn prune_locked(&self, records: &mut HashMap<Uuid, Entry>) -> usize {
        let now = Instant::now();
        let before = records.len();
        records.retain(|_, entry| now.duration_since(entry.last_seen) < self.idle_ttl);
        let dropped = before - records.len();
        if dropped > 0 {
            debug!("Dropped {} idle sessions", dropped);
        }
        dropped
    }

    /// Apply `update` to the record for `id`, creating it if needed, and mark
    /// it as seen now.
    async fn touch<T>(&self, id: Uuid, update: impl FnOnce(&mut SessionRecord) -> T) -> T {
        let mut records = self.records.write().await;
        if !records.contains_key(&id) {
            self.prune_locked(&mut records);
        }
        let entry = records.entry(id).or_insert_with(|| Entry {
            record: SessionRecord::default(),
            last_seen: Instant::now(),
        });
        entry.last_seen = Instant::now();
        update(&mut entry.record)
    }
}
