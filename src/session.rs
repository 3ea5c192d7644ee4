//! Session context handed to the gateway.
//!
//! The bearer token and user type are persisted as JSON under the user's config
//! directory so a token set once with `--token` survives restarts.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// Panel users of this type get a read-only view.
pub const RESTRICTED_USER_TYPE: i64 = 4;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub user_type: Option<i64>,
}

/// Shared, explicitly-passed credential store.
#[derive(Debug, Clone, Default)]
pub struct Session {
    inner: Arc<RwLock<SessionData>>,
}

impl Session {
    pub fn new(data: SessionData) -> Self {
        Self {
            inner: Arc::new(RwLock::new(data)),
        }
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self::new(SessionData {
            token: Some(token.into()),
            user_type: None,
        })
    }

    /// Current bearer token. Blank tokens count as absent.
    pub fn credential(&self) -> Option<String> {
        self.read()
            .token
            .filter(|t| !t.trim().is_empty())
    }

    pub fn user_type(&self) -> Option<i64> {
        self.read().user_type
    }

    pub fn is_restricted(&self) -> bool {
        self.user_type() == Some(RESTRICTED_USER_TYPE)
    }

    pub fn snapshot(&self) -> SessionData {
        self.read()
    }

    pub fn update(&self, f: impl FnOnce(&mut SessionData)) {
        let mut guard = match self.inner.write() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard);
    }

    fn read(&self) -> SessionData {
        match self.inner.read() {
            Ok(g) => g.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

pub fn default_session_path() -> Result<PathBuf> {
    let dir = dirs::config_dir().context("no config directory for this platform")?;
    Ok(dir.join("fair-console").join("session.json"))
}

/// Load a session file. A missing file is an empty session, not an error.
pub fn load(path: &Path) -> Result<SessionData> {
    match std::fs::read(path) {
        Ok(bytes) => serde_json::from_slice(&bytes)
            .with_context(|| format!("parse session file {}", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(SessionData::default()),
        Err(e) => Err(e).with_context(|| format!("read session file {}", path.display())),
    }
}

pub fn save(path: &Path, data: &SessionData) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create {}", parent.display()))?;
    }
    let json = serde_json::to_vec_pretty(data)?;
    std::fs::write(path, json).with_context(|| format!("write session file {}", path.display()))?;
    Ok(())
}
