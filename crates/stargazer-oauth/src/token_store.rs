//! Token persistence.
//!
//! A bearer token lives either in the requesting client's session (browser
//! flow) or in one shared file on disk (device flow). [`TokenStore`] resolves
//! session first, then file.
//!
//! The file has no locking: the last writer wins and a reader racing a writer
//! may see partial or stale content. That is acceptable for a single-user
//! deployment; multiple users would need the store keyed by user identity.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::error::{OAuthError, Result};
use crate::session::{SessionId, SessionStore};

// ============================================================================
// DurableTokenStore Trait
// ============================================================================

/// Storage that outlives a session.
#[async_trait]
pub trait DurableTokenStore: Send + Sync + std::fmt::Debug {
    /// Overwrite the stored token.
    async fn save(&self, token: &str) -> Result<()>;

    /// Load the stored token, `None` if nothing is stored.
    async fn load(&self) -> Result<Option<String>>;

    /// Delete the stored token. Deleting nothing is not an error.
    async fn delete(&self) -> Result<()>;

    /// Check if a token is stored.
    fn exists(&self) -> bool;
}

/// Shared durable store for use across async contexts.
pub type SharedDurableStore = Arc<dyn DurableTokenStore>;

// ============================================================================
// FileTokenStore
// ============================================================================

/// Raw token in a single file, readable and writable only by its owner.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    token_path: PathBuf,
}

impl FileTokenStore {
    pub fn new(token_path: impl Into<PathBuf>) -> Self {
        Self {
            token_path: token_path.into(),
        }
    }

    pub fn token_path(&self) -> &Path {
        &self.token_path
    }
}

#[async_trait]
impl DurableTokenStore for FileTokenStore {
    async fn save(&self, token: &str) -> Result<()> {
        if let Some(parent) = self.token_path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                OAuthError::Persistence(format!("Failed to create token directory: {e}"))
            })?;
        }

        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o600);

        let mut file = options
            .open(&self.token_path)
            .await
            .map_err(|e| OAuthError::Persistence(format!("Failed to open token file: {e}")))?;
        file.write_all(token.as_bytes())
            .await
            .map_err(|e| OAuthError::Persistence(format!("Failed to write token file: {e}")))?;
        file.flush()
            .await
            .map_err(|e| OAuthError::Persistence(format!("Failed to write token file: {e}")))?;

        // `mode` only applies on creation; tighten a pre-existing file too.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&self.token_path, std::fs::Permissions::from_mode(0o600))
                .await
                .map_err(|e| {
                    OAuthError::Persistence(format!("Failed to restrict token file: {e}"))
                })?;
        }

        tracing::info!(path = %self.token_path.display(), "Token saved");
        Ok(())
    }

    async fn load(&self) -> Result<Option<String>> {
        let raw = match tokio::fs::read_to_string(&self.token_path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(OAuthError::Persistence(format!(
                    "Failed to read token file: {e}"
                )));
            }
        };

        let token = raw.trim();
        if token.is_empty() {
            return Ok(None);
        }
        Ok(Some(token.to_string()))
    }

    async fn delete(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.token_path).await {
            Ok(()) => {
                tracing::info!(path = %self.token_path.display(), "Token file removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(OAuthError::Persistence(format!(
                "Failed to delete token file: {e}"
            ))),
        }
    }

    fn exists(&self) -> bool {
        self.token_path.is_file()
    }
}

// ============================================================================
// InMemoryTokenStore (for testing)
// ============================================================================

/// In-memory durable store for testing.
#[derive(Debug, Default)]
pub struct InMemoryTokenStore {
    token: RwLock<Option<String>>,
    save_count: std::sync::atomic::AtomicU32,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(Some(token.into())),
            save_count: std::sync::atomic::AtomicU32::new(0),
        }
    }

    /// Number of `save` calls so far.
    pub fn save_count(&self) -> u32 {
        self.save_count.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[async_trait]
impl DurableTokenStore for InMemoryTokenStore {
    async fn save(&self, token: &str) -> Result<()> {
        *self.token.write().await = Some(token.to_string());
        self.save_count
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }

    async fn load(&self) -> Result<Option<String>> {
        Ok(self.token.read().await.clone())
    }

    async fn delete(&self) -> Result<()> {
        *self.token.write().await = None;
        Ok(())
    }

    fn exists(&self) -> bool {
        self.token
            .try_read()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }
}

// ============================================================================
// TokenStore
// ============================================================================

/// Where a resolved token came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    Session,
    Durable,
}

/// A token ready to be presented as a bearer credential.
#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedToken {
    pub token: String,
    pub source: TokenSource,
}

impl std::fmt::Debug for ResolvedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedToken")
            .field("token", &"[redacted]")
            .field("source", &self.source)
            .finish()
    }
}

/// Convergence point of both authorization flows.
#[derive(Debug, Clone)]
pub struct TokenStore {
    sessions: SessionStore,
    durable: SharedDurableStore,
}

impl TokenStore {
    pub fn new(sessions: SessionStore, durable: SharedDurableStore) -> Self {
        Self { sessions, durable }
    }

    /// Store backed by a fresh session store and the given file.
    pub fn with_file(path: impl Into<PathBuf>) -> Self {
        Self::new(SessionStore::new(), Arc::new(FileTokenStore::new(path)))
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn durable(&self) -> &SharedDurableStore {
        &self.durable
    }

    /// Session-scoped write.
    pub async fn put(&self, token: String, session: SessionId) {
        self.sessions.set_access_token(session, token).await;
    }

    /// Durable write, overwriting whatever was there.
    pub async fn put_durable(&self, token: &str) -> Result<()> {
        self.durable.save(token).await
    }

    /// Resolve a token: session first, then the durable store.
    pub async fn resolve(&self, session: Option<SessionId>) -> Result<ResolvedToken> {
        if let Some(id) = session
            && let Some(token) = self.sessions.access_token(id).await
        {
            return Ok(ResolvedToken {
                token,
                source: TokenSource::Session,
            });
        }

        match self.durable.load().await? {
            Some(token) => Ok(ResolvedToken {
                token,
                source: TokenSource::Durable,
            }),
            None => Err(OAuthError::NotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_file_store_missing_file() {
        let temp = tempdir().unwrap();
        let store = FileTokenStore::new(temp.path().join(".token"));
        assert!(!store.exists());
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_save_and_load() {
        let temp = tempdir().unwrap();
        let store = FileTokenStore::new(temp.path().join(".token"));

        store.save("gho_first").await.unwrap();
        store.save("gho_second").await.unwrap();
        assert!(store.exists());

        let raw = std::fs::read_to_string(store.token_path()).unwrap();
        assert_eq!(raw, "gho_second");
        assert_eq!(store.load().await.unwrap().as_deref(), Some("gho_second"));
    }

    #[tokio::test]
    async fn test_file_load_trims_and_ignores_empty() {
        let temp = tempdir().unwrap();
        let path = temp.path().join(".token");
        let store = FileTokenStore::new(&path);

        std::fs::write(&path, "gho_abc\n").unwrap();
        assert_eq!(store.load().await.unwrap().as_deref(), Some("gho_abc"));

        std::fs::write(&path, "  \n").unwrap();
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_save_creates_parent_dirs() {
        let temp = tempdir().unwrap();
        let store = FileTokenStore::new(temp.path().join("nested").join("dir").join(".token"));
        store.save("tok").await.unwrap();
        assert!(store.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_file_save_owner_only_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempdir().unwrap();
        let path = temp.path().join(".token");
        std::fs::write(&path, "old").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        let store = FileTokenStore::new(&path);
        store.save("gho_new").await.unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[tokio::test]
    async fn test_file_delete() {
        let temp = tempdir().unwrap();
        let store = FileTokenStore::new(temp.path().join(".token"));

        store.save("tok").await.unwrap();
        store.delete().await.unwrap();
        assert!(!store.exists());
        // Second delete is a no-op.
        store.delete().await.unwrap();
    }

    #[tokio::test]
    async fn test_resolve_prefers_session() {
        let durable = Arc::new(InMemoryTokenStore::with_token("durable-token"));
        let store = TokenStore::new(SessionStore::new(), durable);
        let id = SessionId::new();

        store.put("session-token".to_string(), id).await;

        let resolved = store.resolve(Some(id)).await.unwrap();
        assert_eq!(resolved.token, "session-token");
        assert_eq!(resolved.source, TokenSource::Session);
    }

    #[tokio::test]
    async fn test_resolve_falls_back_to_durable() {
        let durable = Arc::new(InMemoryTokenStore::with_token("durable-token"));
        let store = TokenStore::new(SessionStore::new(), durable);

        let resolved = store.resolve(Some(SessionId::new())).await.unwrap();
        assert_eq!(resolved.token, "durable-token");
        assert_eq!(resolved.source, TokenSource::Durable);

        let resolved = store.resolve(None).await.unwrap();
        assert_eq!(resolved.source, TokenSource::Durable);
    }

    #[tokio::test]
    async fn test_resolve_not_found() {
        let store = TokenStore::new(SessionStore::new(), Arc::new(InMemoryTokenStore::new()));
        let result = store.resolve(Some(SessionId::new())).await;
        assert!(matches!(result, Err(OAuthError::NotFound)));
    }

    #[tokio::test]
    async fn test_put_durable_round_trip() {
        let temp = tempdir().unwrap();
        let store = TokenStore::with_file(temp.path().join(".token"));

        store.put_durable("gho_roundtrip").await.unwrap();

        let resolved = store.resolve(None).await.unwrap();
        assert_eq!(resolved.token, "gho_roundtrip");
        assert_eq!(resolved.source, TokenSource::Durable);
    }

    #[test]
    fn test_resolved_token_debug_redacts() {
        let resolved = ResolvedToken {
            token: "gho_secret".to_string(),
            source: TokenSource::Durable,
        };
        assert!(!format!("{resolved:?}").contains("gho_secret"));
    }
}
