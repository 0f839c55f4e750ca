//! Maps user names to durable session files and loads/saves sessions.
//!
//! One file per user name. Saves serialize the whole session pretty-printed,
//! write it to a sibling temp file, and rename over the previous snapshot so
//! an interrupted save cannot corrupt it. Nothing locks the file: one writer
//! per user name is assumed, not enforced.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use ollachat_core::Message;

use crate::error::SessionStoreError;

/// The full persisted conversation state for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub username: String,
    pub messages: Vec<Message>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl Session {
    pub fn new(username: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            username: username.into(),
            messages: Vec::new(),
            created: now,
            updated: now,
        }
    }

    /// Appends a message and bumps the `updated` timestamp.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
        self.updated = Utc::now();
    }
}

/// Replaces every filesystem-unsafe character with an underscore.
///
/// Total and idempotent; anything outside the unsafe set (including
/// non-ASCII scripts) passes through unchanged.
pub fn sanitize_user_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            ' ' | '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            _ => c,
        })
        .collect()
}

/// Resolves user names to files under one context directory.
pub struct SessionStore {
    ctx_dir: PathBuf,
    extension: String,
}

impl SessionStore {
    pub fn new(ctx_dir: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            ctx_dir: ctx_dir.into(),
            extension: extension.into(),
        }
    }

    /// Deterministic path for a user name: `<ctx_dir>/<sanitized><extension>`.
    pub fn resolve_path(&self, user_name: &str) -> PathBuf {
        self.ctx_dir
            .join(format!("{}{}", sanitize_user_name(user_name), self.extension))
    }

    /// Loads the session for `user_name`, or returns a fresh empty one when
    /// no file exists yet. Creates the context directory first; failure there
    /// is fatal to session creation.
    pub fn load_or_create(&self, user_name: &str) -> Result<Session, SessionStoreError> {
        fs::create_dir_all(&self.ctx_dir).map_err(|source| {
            SessionStoreError::io("creating context directory", &self.ctx_dir, source)
        })?;

        let path = self.resolve_path(user_name);
        if !path.exists() {
            debug!(user = user_name, "no session file, starting fresh");
            return Ok(Session::new(user_name));
        }

        let data = fs::read_to_string(&path)
            .map_err(|source| SessionStoreError::io("reading session file", &path, source))?;
        let session: Session =
            serde_json::from_str(&data).map_err(|source| SessionStoreError::Parse {
                path: path.clone(),
                source,
            })?;

        debug!(
            user = user_name,
            messages = session.messages.len(),
            "loaded session"
        );
        Ok(session)
    }

    /// Persists the session, replacing any previous file atomically.
    pub fn save(&self, session: &Session) -> Result<(), SessionStoreError> {
        let path = self.resolve_path(&session.username);
        let data =
            serde_json::to_string_pretty(session).map_err(|source| {
                SessionStoreError::Serialize {
                    path: path.clone(),
                    source,
                }
            })?;

        let tmp_path = tmp_sibling(&path);
        fs::write(&tmp_path, data)
            .map_err(|source| SessionStoreError::io("writing session file", &tmp_path, source))?;
        fs::rename(&tmp_path, &path)
            .map_err(|source| SessionStoreError::io("committing session file", &path, source))?;

        debug!(user = %session.username, messages = session.messages.len(), "saved session");
        Ok(())
    }

    /// Lists saved session user names, sorted. Missing directory is an empty
    /// list, not an error.
    pub fn list(&self) -> Result<Vec<String>, SessionStoreError> {
        if !self.ctx_dir.exists() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&self.ctx_dir).map_err(|source| {
            SessionStoreError::io("listing context directory", &self.ctx_dir, source)
        })?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| {
                SessionStoreError::io("listing context directory", &self.ctx_dir, source)
            })?;
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if let Some(name) = file_name.strip_suffix(&self.extension) {
                if !name.is_empty() {
                    names.push(name.to_string());
                }
            }
        }

        names.sort();
        Ok(names)
    }
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let mut os_string = path.as_os_str().to_os_string();
    os_string.push(".tmp");
    PathBuf::from(os_string)
}
