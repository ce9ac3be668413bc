//! Persistent storage for auth tokens, keyed by username.
//!
//! Tokens live in a single JSON object file under the per-user
//! preferences directory, so a user who has logged in once can be
//! logged in again by name alone.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

/// Token file name
const TOKEN_FILE: &str = "tokens.json";

/// Username -> token mapping bound to the file that persists it.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
    tokens: BTreeMap<String, String>,
}

impl TokenStore {
    /// Open the store backed by `path`, merging in whatever the file
    /// already holds. The file does not have to exist.
    pub fn open(path: PathBuf) -> Self {
        let mut store = Self {
            path,
            tokens: BTreeMap::new(),
        };
        store.load();
        store
    }

    /// Open the store at the fixed per-user location.
    pub fn open_default() -> Result<Self> {
        Ok(Self::open(crate::config::prefs_dir()?.join(TOKEN_FILE)))
    }

    /// Merge the entries currently in the file into memory (last write
    /// wins). A missing or unreadable file means no stored tokens;
    /// malformed content is skipped the same way. Never an error.
    pub fn load(&mut self) {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(_) => return,
        };
        match serde_json::from_str::<BTreeMap<String, String>>(&contents) {
            Ok(parsed) => {
                debug!(count = parsed.len(), "Loaded stored tokens");
                self.tokens.extend(parsed);
            }
            Err(err) => {
                debug!(error = %err, path = %self.path.display(), "Ignoring malformed token file");
            }
        }
    }

    /// Write the full mapping back to the file, creating the containing
    /// directory if needed.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create token directory {}", parent.display())
            })?;
        }
        let contents = serde_json::to_string_pretty(&self.tokens)?;
        std::fs::write(&self.path, contents)
            .with_context(|| format!("Failed to write token file {}", self.path.display()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored token for `username`, if any.
    pub fn get(&self, username: &str) -> Option<&str> {
        self.tokens.get(username).map(String::as_str)
    }

    pub fn contains(&self, username: &str) -> bool {
        self.tokens.contains_key(username)
    }

    /// Record a token for `username`, returning the replaced one if the
    /// user already had an entry.
    pub fn insert(&mut self, username: String, token: String) -> Option<String> {
        self.tokens.insert(username, token)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Usernames with a stored token, in sorted order.
    pub fn usernames(&self) -> impl Iterator<Item = &str> {
        self.tokens.keys().map(String::as_str)
    }

    /// All stored entries, in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.tokens
            .iter()
            .map(|(username, token)| (username.as_str(), token.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> TokenStore {
        TokenStore::open(dir.path().join(TOKEN_FILE))
    }

    #[test]
    fn test_save_then_open_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);
        store.insert("jsmith".to_string(), "tok-abc".to_string());
        store.insert("adoe".to_string(), "tok-def".to_string());
        store.save().unwrap();

        let reopened = store_in(&dir);
        assert_eq!(reopened.len(), 2);
        assert_eq!(reopened.get("jsmith"), Some("tok-abc"));
        assert_eq!(reopened.get("adoe"), Some("tok-def"));
    }

    #[test]
    fn test_missing_file_means_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::open(dir.path().join("never-written.json"));
        assert!(store.is_empty());
    }

    #[test]
    fn test_malformed_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(TOKEN_FILE);
        std::fs::write(&path, "not json at all {{{").unwrap();

        let store = TokenStore::open(path);
        assert!(store.is_empty());
    }

    #[test]
    fn test_load_is_idempotent_and_merges() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(TOKEN_FILE);
        std::fs::write(&path, r#"{"jsmith": "tok-abc"}"#).unwrap();

        let mut store = TokenStore::open(path);
        store.insert("adoe".to_string(), "tok-def".to_string());
        // Reloading the same file must not drop in-memory entries.
        store.load();
        store.load();

        assert_eq!(store.len(), 2);
        assert_eq!(store.get("jsmith"), Some("tok-abc"));
        assert_eq!(store.get("adoe"), Some("tok-def"));
    }

    #[test]
    fn test_file_wins_over_memory_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(TOKEN_FILE);
        std::fs::write(&path, r#"{"jsmith": "tok-new"}"#).unwrap();

        let mut store = TokenStore {
            path,
            tokens: BTreeMap::from([("jsmith".to_string(), "tok-old".to_string())]),
        };
        store.load();
        assert_eq!(store.get("jsmith"), Some("tok-new"));
    }

    #[test]
    fn test_save_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join(TOKEN_FILE);

        let mut store = TokenStore::open(path.clone());
        store.insert("jsmith".to_string(), "tok-abc".to_string());
        store.save().unwrap();

        assert!(path.exists());
        let reopened = TokenStore::open(path);
        assert_eq!(reopened.get("jsmith"), Some("tok-abc"));
    }

    #[test]
    fn test_insert_returns_replaced_token() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);
        assert_eq!(store.insert("jsmith".into(), "tok-1".into()), None);
        assert_eq!(
            store.insert("jsmith".into(), "tok-2".into()),
            Some("tok-1".to_string())
        );
        assert_eq!(store.get("jsmith"), Some("tok-2"));
        assert_eq!(store.usernames().collect::<Vec<_>>(), vec!["jsmith"]);
    }
}
