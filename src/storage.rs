use std::path::Path;

use sled::Db;

use crate::error::StoreError;

const SESSION_TREE: &str = "session";
pub const ACCESS_TOKEN_KEY: &str = "access_token";
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

/// The two raw token strings as persisted. No validation is applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub access: Option<String>,
    pub refresh: Option<String>,
}

impl Session {
    pub fn is_empty(&self) -> bool {
        self.access.is_none() && self.refresh.is_none()
    }
}

/// Durable key-value area for the session tokens.
///
/// Values are stored unencrypted, as plain UTF-8 under `access_token` and
/// `refresh_token`. Every mutation is flushed so a restart sees it.
#[derive(Clone)] // sled handles are cheap to clone and share one database
pub struct SessionStore {
    db: Db,
    tree: sled::Tree,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore").finish_non_exhaustive()
    }
}

impl SessionStore {
    /// Open or create the session database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// A throwaway store that is removed when dropped.
    pub fn temporary() -> Result<Self, StoreError> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> Result<Self, StoreError> {
        let tree = db.open_tree(SESSION_TREE)?;
        Ok(Self { db, tree })
    }

    pub fn set(&self, access: &str, refresh: &str) -> Result<(), StoreError> {
        self.tree.insert(ACCESS_TOKEN_KEY, access.as_bytes())?;
        self.tree.insert(REFRESH_TOKEN_KEY, refresh.as_bytes())?;
        self.flush()
    }

    /// Replace only the access token (after a successful refresh).
    pub fn set_access(&self, access: &str) -> Result<(), StoreError> {
        self.tree.insert(ACCESS_TOKEN_KEY, access.as_bytes())?;
        self.flush()
    }

    pub fn get(&self) -> Result<Session, StoreError> {
        Ok(Session {
            access: self.read(ACCESS_TOKEN_KEY)?,
            refresh: self.read(REFRESH_TOKEN_KEY)?,
        })
    }

    pub fn access_token(&self) -> Result<Option<String>, StoreError> {
        self.read(ACCESS_TOKEN_KEY)
    }

    pub fn refresh_token(&self) -> Result<Option<String>, StoreError> {
        self.read(REFRESH_TOKEN_KEY)
    }

    pub fn clear(&self) -> Result<(), StoreError> {
        self.tree.remove(ACCESS_TOKEN_KEY)?;
        self.tree.remove(REFRESH_TOKEN_KEY)?;
        self.flush()
    }

    fn read(&self, key: &'static str) -> Result<Option<String>, StoreError> {
        match self.tree.get(key)? {
            Some(bytes) => String::from_utf8(bytes.to_vec())
                .map(Some)
                .map_err(|_| StoreError::Encoding { key }),
            None => Ok(None),
        }
    }

    fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }
}
