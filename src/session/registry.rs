//! In-memory registry of live cart sessions with idle eviction.
//!
//! Each session id owns a directory under the storage root, so evicting a
//! session only frees memory; the next request for it re-hydrates from disk.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use parking_lot::Mutex;
use uuid::Uuid;
use crate::session::{CartSession, DEFAULT_STORAGE_KEY};
use crate::storage::FileStore;
use crate::{CartError, Result};

const DEFAULT_TTL_SECS: u64 = 30 * 60;

#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub storage_dir: PathBuf,
    pub storage_key: String,
    pub ttl: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            storage_dir: PathBuf::from("./data/carts"),
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            ttl: Duration::from_secs(DEFAULT_TTL_SECS),
        }
    }
}

type SharedSession = Arc<Mutex<CartSession<FileStore>>>;

struct SessionEntry {
    session: SharedSession,
    last_accessed: Instant,
}

impl SessionEntry {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.last_accessed.elapsed() > ttl
    }

    /// A handle outside the map means a request is still working on it.
    fn in_use(&self) -> bool {
        Arc::strong_count(&self.session) > 1
    }
}

/// The map lock only guards lookups. Hydration, commands and their file I/O
/// run under the per-session lock, so one slow cart never stalls the others.
pub struct SessionRegistry {
    sessions: Mutex<HashMap<Uuid, SessionEntry>>,
    config: RegistryConfig,
}

impl SessionRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        Self { sessions: Mutex::new(HashMap::new()), config }
    }

    pub fn config(&self) -> &RegistryConfig { &self.config }

    pub fn create_session(&self) -> Uuid {
        let id = Uuid::now_v7();
        self.with_session(id, |_| ());
        tracing::info!(session_id = %id, "cart session created");
        id
    }

    fn session(&self, id: Uuid) -> SharedSession {
        let mut sessions = self.sessions.lock();
        let entry = sessions.entry(id).or_insert_with(|| {
            let store = FileStore::new(self.config.storage_dir.join(id.to_string()));
            SessionEntry {
                session: Arc::new(Mutex::new(CartSession::new(store, self.config.storage_key.clone()))),
                last_accessed: Instant::now(),
            }
        });
        entry.last_accessed = Instant::now();
        Arc::clone(&entry.session)
    }

    /// Run `f` against the session, hydrating it from storage first if that
    /// has not happened yet. Blocks on file I/O.
    pub fn with_session<T>(&self, id: Uuid, f: impl FnOnce(&mut CartSession<FileStore>) -> T) -> T {
        let session = self.session(id);
        let mut session = session.lock();
        if !session.is_hydrated() {
            session.hydrate();
        }
        f(&mut *session)
    }

    /// [`with_session`](Self::with_session) on the blocking pool, for async
    /// callers.
    pub async fn run<T, F>(self: &Arc<Self>, id: Uuid, f: F) -> Result<T>
    where
        F: FnOnce(&mut CartSession<FileStore>) -> T + Send + 'static,
        T: Send + 'static,
    {
        let registry = Arc::clone(self);
        Ok(tokio::task::spawn_blocking(move || registry.with_session(id, f)).await?)
    }

    pub fn parse_id(raw: &str) -> Result<Uuid> {
        Uuid::parse_str(raw).map_err(|_| CartError::SessionNotFound(raw.to_string()))
    }

    pub fn len(&self) -> usize { self.sessions.lock().len() }

    pub fn is_empty(&self) -> bool { self.sessions.lock().is_empty() }

    pub fn evict_expired(&self) -> usize {
        let mut sessions = self.sessions.lock();
        let before = sessions.len();
        sessions.retain(|id, entry| {
            let keep = entry.in_use() || !entry.is_expired(self.config.ttl);
            if !keep {
                tracing::debug!(session_id = %id, "evicted idle cart session");
            }
            keep
        });
        before - sessions.len()
    }

    pub fn start_eviction_task(self: Arc<Self>, every: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                self.evict_expired();
            }
        })
    }
}
