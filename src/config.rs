//! Client configuration.
//!
//! Values come from the process environment (after loading a `.env` file if
//! one exists). CLI flags may override the backend URL and session path.
//!
//! | Env Var               | Default                  |
//! |-----------------------|--------------------------|
//! | `BLOG_BACKEND_URL`    | `http://127.0.0.1:8000`  |
//! | `BLOG_SESSION_PATH`   | `.blog_session`          |
//! | `BLOG_DEFAULT_AVATAR` | `/default_profile.png`   |
//! | `BLOG_LOG_DIR`        | unset (stderr only)      |
//! | `BLOG_LOG_JSON`       | `false`                  |

use std::path::PathBuf;

use reqwest::Url;

use crate::error::{ClientError, ClientResult};

pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_SESSION_PATH: &str = ".blog_session";
pub const DEFAULT_AVATAR: &str = "/default_profile.png";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Origin of the REST backend; also prefixes relative media paths.
    pub backend_url: Url,
    /// Directory of the sled database holding the session tokens.
    pub session_path: PathBuf,
    /// Avatar shown for comment authors without a profile picture.
    pub default_avatar: String,
    pub log_dir: Option<PathBuf>,
    pub log_json: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            backend_url: Url::parse(DEFAULT_BACKEND_URL).expect("default backend url is valid"),
            session_path: PathBuf::from(DEFAULT_SESSION_PATH),
            default_avatar: DEFAULT_AVATAR.to_string(),
            log_dir: None,
            log_json: false,
        }
    }
}

impl ClientConfig {
    /// Load configuration from `.env` and the environment.
    pub fn from_env() -> ClientResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; `from_env` passes `std::env::var`.
    pub fn from_lookup<F>(lookup: F) -> ClientResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(url) = lookup("BLOG_BACKEND_URL").filter(|v| !v.trim().is_empty()) {
            config = config.with_backend_url(&url)?;
        }
        if let Some(path) = lookup("BLOG_SESSION_PATH").filter(|v| !v.trim().is_empty()) {
            config.session_path = PathBuf::from(path);
        }
        if let Some(avatar) = lookup("BLOG_DEFAULT_AVATAR").filter(|v| !v.trim().is_empty()) {
            config.default_avatar = avatar;
        }
        config.log_dir = lookup("BLOG_LOG_DIR")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);
        config.log_json = lookup("BLOG_LOG_JSON")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);
        Ok(config)
    }

    pub fn with_backend_url(mut self, url: &str) -> ClientResult<Self> {
        let parsed = Url::parse(url)
            .map_err(|e| ClientError::Config(format!("invalid backend url {url:?}: {e}")))?;
        if parsed.cannot_be_a_base() {
            return Err(ClientError::Config(format!(
                "backend url {url:?} cannot be used as a base"
            )));
        }
        self.backend_url = parsed;
        Ok(self)
    }

    pub fn with_session_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.session_path = path.into();
        self
    }

    /// Backend origin without a trailing slash, e.g. `http://127.0.0.1:8000`.
    pub fn origin(&self) -> String {
        self.backend_url.as_str().trim_end_matches('/').to_string()
    }

    /// Resolve a server path (`/api/articles/`) or an absolute URL (a
    /// pagination cursor) against the backend.
    pub fn endpoint(&self, path_or_url: &str) -> ClientResult<Url> {
        if let Ok(absolute) = Url::parse(path_or_url) {
            return Ok(absolute);
        }
        self.backend_url
            .join(path_or_url)
            .map_err(|e| ClientError::Config(format!("cannot build url for {path_or_url:?}: {e}")))
    }
}
